//! Business logic services.
//!
//! Services contain the settlement logic separated from HTTP handlers.
//! They own the database transactions, the row locks and every call out to
//! the payment gateway.

pub mod event_service;
#[cfg(test)]
pub mod fixtures;
pub mod ledger_service;
pub mod payout;
pub mod refund_service;
pub mod stats_service;
pub mod webhook_service;
pub mod withdrawal_service;
