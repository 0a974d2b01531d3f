//! Event data models and API request/response types.
//!
//! An event owns its `collection_balance_minor`: money collected from
//! completed payments and not yet paid out to the organizer or refunded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::AppError;

/// Who moves money collected for an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_management", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentManagement {
    /// The platform collects and the organizer withdraws through us.
    #[default]
    Platform,
    /// The organizer collects directly; no withdrawals here.
    Direct,
}

/// Bank account payouts are sent to.
///
/// Snapshotted into each withdrawal when it is requested, so later edits do
/// not redirect an in-flight payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDetails {
    pub bank_code: String,
    pub account_number: String,
    #[serde(default)]
    pub account_name: Option<String>,
}

impl AccountDetails {
    /// Shape checks done before the gateway is asked anything.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.bank_code.trim().is_empty() {
            return Err(AppError::InvalidRequest("bank_code is required".to_string()));
        }

        let number = self.account_number.trim();
        if number.is_empty() {
            return Err(AppError::InvalidRequest(
                "account_number is required".to_string(),
            ));
        }
        if !number.chars().all(|c| c.is_ascii_digit()) || !(6..=20).contains(&number.len()) {
            return Err(AppError::InvalidRequest(
                "account_number must be 6 to 20 digits".to_string(),
            ));
        }

        Ok(())
    }
}

/// Represents an event record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,

    /// Price of one space, in minor units.
    pub price_minor: i64,

    pub total_spaces: i32,

    /// Never above `total_spaces` (CHECK constraint).
    pub available_spaces: i32,

    /// Funds available for withdrawal. Never negative (CHECK constraint).
    pub collection_balance_minor: i64,

    pub account_details: Option<Json<AccountDetails>>,
    pub payment_management: PaymentManagement,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn account_details(&self) -> Option<&AccountDetails> {
        self.account_details.as_ref().map(|json| &json.0)
    }
}

/// Request body for creating an event.
///
/// ```json
/// {
///   "title": "Lake Naivasha Weekend",
///   "price_minor": 1500000,
///   "total_spaces": 40,
///   "payment_management": "platform"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub price_minor: i64,
    pub total_spaces: i32,
    #[serde(default)]
    pub payment_management: PaymentManagement,
    #[serde(default)]
    pub account_details: Option<AccountDetails>,
}

impl CreateEventRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::InvalidRequest("title is required".to_string()));
        }
        if self.price_minor < 0 {
            return Err(AppError::InvalidRequest(
                "price_minor must not be negative".to_string(),
            ));
        }
        if self.total_spaces <= 0 {
            return Err(AppError::InvalidRequest(
                "total_spaces must be positive".to_string(),
            ));
        }
        if let Some(details) = &self.account_details {
            details.validate()?;
        }
        Ok(())
    }
}

/// Funds position of an event as seen by a withdrawal or refund.
///
/// `held_minor` is the sum of withdrawals and refunds still `pending` or
/// `processing`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EventBalance {
    pub event_id: Uuid,
    pub collection_balance_minor: i64,
    pub held_minor: i64,
    pub available_minor: i64,
}

impl EventBalance {
    pub fn new(event_id: Uuid, collection_balance_minor: i64, held_minor: i64) -> Self {
        Self {
            event_id,
            collection_balance_minor,
            held_minor,
            available_minor: (collection_balance_minor - held_minor).max(0),
        }
    }

    /// A withdrawal or refund of `amount_minor` must fit in what is not
    /// already held.
    pub fn ensure_covers(&self, amount_minor: i64) -> Result<(), AppError> {
        if amount_minor > self.available_minor {
            return Err(AppError::InsufficientBalance);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(number: &str) -> AccountDetails {
        AccountDetails {
            bank_code: "68".to_string(),
            account_number: number.to_string(),
            account_name: None,
        }
    }

    #[test]
    fn account_number_must_be_digits() {
        assert!(details("0123456789").validate().is_ok());
        assert!(details("01234x6789").validate().is_err());
        assert!(details("123").validate().is_err());
        assert!(details("").validate().is_err());
    }

    #[test]
    fn create_event_rejects_empty_capacity() {
        let request = CreateEventRequest {
            title: "Safari".to_string(),
            price_minor: 100,
            total_spaces: 0,
            payment_management: PaymentManagement::Platform,
            account_details: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn payment_management_defaults_to_platform() {
        let request: CreateEventRequest =
            serde_json::from_str(r#"{"title":"Hike","price_minor":500,"total_spaces":10}"#)
                .unwrap();
        assert_eq!(request.payment_management, PaymentManagement::Platform);
    }

    #[test]
    fn available_balance_subtracts_held_funds() {
        let id = Uuid::new_v4();
        assert_eq!(EventBalance::new(id, 3000, 1000).available_minor, 2000);
        assert_eq!(EventBalance::new(id, 3000, 5000).available_minor, 0);
    }

    #[test]
    fn withdrawal_above_balance_is_rejected() {
        let balance = EventBalance::new(Uuid::new_v4(), 3000, 0);
        assert!(matches!(
            balance.ensure_covers(5000),
            Err(AppError::InsufficientBalance)
        ));
        assert!(balance.ensure_covers(3000).is_ok());
    }

    #[test]
    fn held_funds_block_a_second_withdrawal() {
        // two requests of 2000 against 3000: the second sees 1000 available
        let balance = EventBalance::new(Uuid::new_v4(), 3000, 2000);
        assert!(balance.ensure_covers(2000).is_err());
        assert!(balance.ensure_covers(1000).is_ok());
    }
}
