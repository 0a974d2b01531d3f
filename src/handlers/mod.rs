//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Hands the work to a service
//! 3. Wraps the result in the `ApiResponse` envelope
pub mod admin;
pub mod banks;
pub mod bookings;
pub mod events;
pub mod health;
pub mod payments;
pub mod refunds;
pub mod settlements;
pub mod webhooks;
pub mod withdrawals;
