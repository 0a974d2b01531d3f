//! Payment records: one per checkout opened at the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Lifecycle of a payment record.
///
/// `pending → completed` or `pending → failed`. A completed payment is
/// never modified again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_record_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Pending,
    Completed,
    Failed,
}

/// Represents a payment record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub event_id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Uuid,

    /// Amount asked for at checkout; replaced by the gateway's charged
    /// amount when the payment completes.
    pub amount_minor: i64,

    pub status: PaymentRecordStatus,

    /// Our reference, echoed back by the gateway on every notification.
    pub reference: String,

    pub authorization_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request body for opening a checkout against a booking.
///
/// ```json
/// { "amount_minor": 1000000, "email": "guest@example.com" }
/// ```
#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub amount_minor: i64,
    pub email: String,
}

impl InitiatePaymentRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        crate::money::require_positive("amount_minor", self.amount_minor)?;

        let email = self.email.trim();
        let valid = email
            .split_once('@')
            .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
        if !valid {
            return Err(AppError::InvalidRequest(
                "A valid email is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Response for an opened checkout.
#[derive(Debug, Serialize)]
pub struct PaymentCheckout {
    pub payment: Payment,
    pub authorization_url: String,
    pub access_code: String,
}

/// Fresh gateway-safe reference: `<prefix>_<32 hex chars>`.
pub fn generate_reference(prefix: &str) -> String {
    let bytes: [u8; 16] = rand::random();
    format!("{}_{}", prefix, hex::encode(bytes))
}

/// References end up in gateway URL paths; only allow a safe alphabet.
pub fn validate_reference(reference: &str) -> Result<(), AppError> {
    let ok = !reference.is_empty()
        && reference.len() <= 100
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '='));
    if !ok {
        return Err(AppError::InvalidRequest(
            "Invalid payment reference".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_references_are_unique_and_valid() {
        let a = generate_reference("pay");
        let b = generate_reference("pay");
        assert_ne!(a, b);
        assert!(a.starts_with("pay_"));
        assert_eq!(a.len(), 4 + 32);
        assert!(validate_reference(&a).is_ok());
    }

    #[test]
    fn rejects_path_like_references() {
        assert!(validate_reference("../balance").is_err());
        assert!(validate_reference("abc/def").is_err());
        assert!(validate_reference("").is_err());
        assert!(validate_reference("T1234-abc_9").is_ok());
    }

    #[test]
    fn checkout_request_requires_email_and_amount() {
        let ok = InitiatePaymentRequest {
            amount_minor: 500,
            email: "guest@example.com".to_string(),
        };
        assert!(ok.validate().is_ok());

        let no_amount = InitiatePaymentRequest {
            amount_minor: 0,
            ..ok
        };
        assert!(no_amount.validate().is_err());

        let bad_email = InitiatePaymentRequest {
            amount_minor: 500,
            email: "guest".to_string(),
        };
        assert!(bad_email.validate().is_err());
    }
}
