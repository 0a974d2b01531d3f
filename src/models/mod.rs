//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request bodies that create them.

/// API key authentication model
pub mod api_key;
/// Booking ledger
pub mod booking;
/// Events and their collection balance
pub mod event;
/// Checkout payments
pub mod payment;
/// Refund requests
pub mod refund;
/// Inbound gateway notifications
pub mod webhook;
/// Withdrawal requests and fee policy
pub mod withdrawal;
