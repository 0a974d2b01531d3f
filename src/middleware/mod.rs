//! HTTP middleware components.
//!
//! Middleware run before route handlers and may short-circuit the request
//! (for example, rejecting an unknown API key).

/// API key authentication middleware
pub mod auth;
