//! Refund requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Lifecycle of a refund request.
///
/// `pending → processing` on approval; the gateway later reports
/// `completed` or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "refund_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Represents a refund record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct RefundRequest {
    pub id: Uuid,
    pub event_id: Uuid,
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub requested_by: Uuid,
    pub amount_minor: i64,
    pub status: RefundStatus,

    /// Reference of the original payment, which the gateway refunds against.
    pub reference: String,

    pub reason: Option<String>,
    pub gateway_refund_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Request body for filing a refund.
#[derive(Debug, Deserialize)]
pub struct CreateRefundRequest {
    pub payment_id: Uuid,
    pub amount_minor: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Check a refund against what the payment can still give back.
///
/// `already_refunded_minor` counts every earlier refund of the payment
/// that has not failed.
pub fn check_refundable(
    payment_amount_minor: i64,
    already_refunded_minor: i64,
    requested_minor: i64,
) -> Result<(), AppError> {
    crate::money::require_positive("amount_minor", requested_minor)?;

    let remaining = payment_amount_minor - already_refunded_minor;
    if requested_minor > remaining {
        return Err(AppError::InvalidRequest(format!(
            "Refund amount exceeds the refundable amount of {}",
            remaining.max(0)
        )));
    }
    Ok(())
}
