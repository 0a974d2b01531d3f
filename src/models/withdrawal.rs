//! Withdrawal requests and the platform fee policy.
//!
//! A withdrawal moves part of an event's collection balance to the
//! organizer's bank account, minus the platform fee:
//!
//! ```text
//! platform_fee = max(round(amount * rate_bps / 10_000), minimum_fee)
//! net_amount   = amount - platform_fee
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{error::AppError, models::event::AccountDetails};

/// Lifecycle of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "withdrawal_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    /// Filed, funds held, nothing sent to the gateway yet.
    Pending,
    /// Transfer handed to the gateway, outcome not known yet.
    Processing,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    /// Whether funds for this request are still held against the balance.
    pub fn holds_funds(self) -> bool {
        matches!(self, WithdrawalStatus::Pending | WithdrawalStatus::Processing)
    }
}

/// Fee charged on every withdrawal. One policy for the whole platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeePolicy {
    /// Proportional rate in basis points (50 = 0.5%).
    pub rate_bps: u32,
    /// Floor applied when the proportional fee is smaller.
    pub minimum_fee_minor: i64,
}

/// Fee breakdown for a withdrawal amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WithdrawalQuote {
    pub amount_minor: i64,
    pub platform_fee_minor: i64,
    pub net_amount_minor: i64,
}

impl FeePolicy {
    /// Fee for `amount_minor`, rounded half up, never below the floor.
    pub fn fee_for(&self, amount_minor: i64) -> i64 {
        let proportional =
            (i128::from(amount_minor) * i128::from(self.rate_bps) + 5_000) / 10_000;
        // amount <= i64::MAX and rate <= 10_000 bps keeps this in range
        let proportional = i64::try_from(proportional).unwrap_or(i64::MAX);
        proportional.max(self.minimum_fee_minor)
    }

    /// Quote a withdrawal. The organizer must receive something.
    pub fn quote(&self, amount_minor: i64) -> Result<WithdrawalQuote, AppError> {
        crate::money::require_positive("amount_minor", amount_minor)?;

        let platform_fee_minor = self.fee_for(amount_minor);
        if platform_fee_minor >= amount_minor {
            return Err(AppError::InvalidRequest(format!(
                "Withdrawal amount must exceed the platform fee of {}",
                platform_fee_minor
            )));
        }

        Ok(WithdrawalQuote {
            amount_minor,
            platform_fee_minor,
            net_amount_minor: amount_minor - platform_fee_minor,
        })
    }
}

/// Represents a withdrawal record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub event_id: Uuid,
    pub amount_minor: i64,
    pub platform_fee_minor: i64,

    /// Always `amount_minor - platform_fee_minor` (CHECK constraint).
    pub net_amount_minor: i64,

    pub status: WithdrawalStatus,

    /// Payout destination as it was when the request was filed.
    pub account_details: Json<AccountDetails>,

    /// Transfer reference sent to the gateway.
    pub reference: String,

    pub recipient_code: Option<String>,
    pub transfer_code: Option<String>,
    pub failure_reason: Option<String>,

    /// The gateway paid this out but the ledger could not absorb it
    /// cleanly; an operator has to look at it.
    pub needs_reconciliation: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request body for filing a withdrawal.
///
/// ```json
/// { "event_id": "550e8400-e29b-41d4-a716-446655440000", "amount_minor": 100000 }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub event_id: Uuid,
    pub amount_minor: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: FeePolicy = FeePolicy {
        rate_bps: 50,
        minimum_fee_minor: 10,
    };

    #[test]
    fn minimum_fee_applies_to_small_withdrawals() {
        let quote = POLICY.quote(1000).unwrap();
        assert_eq!(quote.platform_fee_minor, 10);
        assert_eq!(quote.net_amount_minor, 990);
    }

    #[test]
    fn proportional_fee_applies_above_the_floor() {
        let quote = POLICY.quote(1_000_000).unwrap();
        assert_eq!(quote.platform_fee_minor, 5_000);
        assert_eq!(quote.net_amount_minor, 995_000);
    }

    #[test]
    fn fee_rounds_half_up() {
        let policy = FeePolicy {
            rate_bps: 50,
            minimum_fee_minor: 0,
        };
        // 0.5% of 2100 = 10.5
        assert_eq!(policy.fee_for(2100), 11);
        // 0.5% of 2099 = 10.495
        assert_eq!(policy.fee_for(2099), 10);
    }

    #[test]
    fn flat_rate_policy_is_just_configuration() {
        let policy = FeePolicy {
            rate_bps: 600,
            minimum_fee_minor: 0,
        };
        let quote = policy.quote(10_000).unwrap();
        assert_eq!(quote.platform_fee_minor, 600);
        assert_eq!(quote.net_amount_minor, 9_400);
    }

    #[test]
    fn quote_identity_holds() {
        for amount in [11, 500, 2_001, 99_999, 1_234_567] {
            let quote = POLICY.quote(amount).unwrap();
            assert_eq!(
                quote.net_amount_minor,
                quote.amount_minor - quote.platform_fee_minor
            );
            assert_eq!(
                quote.platform_fee_minor,
                ((amount * 50 + 5_000) / 10_000).max(10)
            );
        }
    }

    #[test]
    fn rejects_amounts_swallowed_by_the_fee() {
        assert!(POLICY.quote(10).is_err());
        assert!(POLICY.quote(0).is_err());
        assert!(POLICY.quote(-100).is_err());
    }

    #[test]
    fn only_open_requests_hold_funds() {
        assert!(WithdrawalStatus::Pending.holds_funds());
        assert!(WithdrawalStatus::Processing.holds_funds());
        assert!(!WithdrawalStatus::Completed.holds_funds());
        assert!(!WithdrawalStatus::Failed.holds_funds());
    }
}
