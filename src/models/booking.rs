//! Booking ledger.
//!
//! A booking tracks what is owed for reserved spaces. Its three amount
//! fields always satisfy `amount_paid + amount_due == total_amount`, and
//! `payment_status` is derived from them, never set independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How much of a booking has been paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// `paid` iff nothing is due, else `partial` if anything was paid, else `unpaid`.
    pub fn derive(amount_paid_minor: i64, amount_due_minor: i64) -> Self {
        if amount_due_minor <= 0 {
            PaymentStatus::Paid
        } else if amount_paid_minor > 0 {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }
}

/// Represents a booking record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub total_amount_minor: i64,
    pub amount_paid_minor: i64,
    pub amount_due_minor: i64,
    pub payment_status: PaymentStatus,

    /// Set when a payment arrived for more than was due.
    pub needs_reconciliation: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New ledger position after a payment is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub amount_paid_minor: i64,
    pub amount_due_minor: i64,
    pub payment_status: PaymentStatus,

    /// Part of the payment that did not fit under `total_amount`.
    pub overpaid_minor: i64,
}

impl LedgerUpdate {
    pub fn needs_reconciliation(&self) -> bool {
        self.overpaid_minor > 0
    }
}

/// Apply a payment of `amount_minor` to a ledger at (`total`, `paid`).
///
/// `amount_paid` is clamped at `total`; whatever does not fit is reported
/// in `overpaid_minor` instead of breaking the ledger identity.
pub fn apply_payment(total_minor: i64, paid_minor: i64, amount_minor: i64) -> LedgerUpdate {
    let uncapped = paid_minor.saturating_add(amount_minor);
    let amount_paid_minor = uncapped.min(total_minor);
    let amount_due_minor = total_minor - amount_paid_minor;

    LedgerUpdate {
        amount_paid_minor,
        amount_due_minor,
        payment_status: PaymentStatus::derive(amount_paid_minor, amount_due_minor),
        overpaid_minor: uncapped - amount_paid_minor,
    }
}

impl Booking {
    pub fn apply_payment(&self, amount_minor: i64) -> LedgerUpdate {
        apply_payment(
            self.total_amount_minor,
            self.amount_paid_minor,
            amount_minor,
        )
    }
}

/// Request body for booking spaces on an event.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(total: i64) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            quantity: 2,
            total_amount_minor: total,
            amount_paid_minor: 0,
            amount_due_minor: total,
            payment_status: PaymentStatus::derive(0, total),
            needs_reconciliation: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn commit(booking: &mut Booking, update: LedgerUpdate) {
        booking.amount_paid_minor = update.amount_paid_minor;
        booking.amount_due_minor = update.amount_due_minor;
        booking.payment_status = update.payment_status;
        booking.needs_reconciliation |= update.needs_reconciliation();
    }

    #[test]
    fn first_partial_payment_then_settlement() {
        let mut booking = booking(30_000);
        assert_eq!(booking.payment_status, PaymentStatus::Unpaid);

        let update = booking.apply_payment(10_000);
        assert_eq!(update.amount_paid_minor, 10_000);
        assert_eq!(update.amount_due_minor, 20_000);
        assert_eq!(update.payment_status, PaymentStatus::Partial);
        commit(&mut booking, update);

        let update = booking.apply_payment(20_000);
        assert_eq!(update.amount_paid_minor, 30_000);
        assert_eq!(update.amount_due_minor, 0);
        assert_eq!(update.payment_status, PaymentStatus::Paid);
        assert!(!update.needs_reconciliation());
    }

    #[test]
    fn overpayment_is_clamped_and_flagged() {
        let update = apply_payment(30_000, 25_000, 10_000);
        assert_eq!(update.amount_paid_minor, 30_000);
        assert_eq!(update.amount_due_minor, 0);
        assert_eq!(update.payment_status, PaymentStatus::Paid);
        assert_eq!(update.overpaid_minor, 5_000);
        assert!(update.needs_reconciliation());
    }

    #[test]
    fn ledger_identity_holds_for_any_payment_sequence() {
        let total = 12_345;
        let mut booking = booking(total);
        for amount in [1, 999, 5_000, 0, 4_000, 10_000, 7] {
            let update = booking.apply_payment(amount);
            assert_eq!(update.amount_paid_minor + update.amount_due_minor, total);
            assert_eq!(
                update.payment_status,
                PaymentStatus::derive(update.amount_paid_minor, update.amount_due_minor)
            );
            commit(&mut booking, update);
        }
        assert_eq!(booking.payment_status, PaymentStatus::Paid);
        assert!(booking.needs_reconciliation);
    }

    #[test]
    fn free_booking_is_paid_on_creation() {
        assert_eq!(PaymentStatus::derive(0, 0), PaymentStatus::Paid);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Partial).unwrap(),
            "\"partial\""
        );
    }
}
