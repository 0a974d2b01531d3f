//! Inbound gateway webhook models.
//!
//! The gateway POSTs a signed JSON body for every asynchronous outcome:
//!
//! ```json
//! {
//!   "event": "transfer.success",
//!   "data": {
//!     "reference": "wdr_...",
//!     "transfer_code": "TRF_...",
//!     "amount": 99000,
//!     "status": "success"
//!   }
//! }
//! ```
//!
//! Every accepted notification is logged to `gateway_events`, keyed so a
//! redelivery of the same notification is recognised and skipped.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// Logged webhook delivery.
#[derive(Debug, Clone, FromRow)]
pub struct GatewayEvent {
    pub id: Uuid,
    pub event_key: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Raw webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookNotification {
    pub event: String,
    pub data: NotificationData,
}

/// Union of the `data` fields the handled events carry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationData {
    /// Gateway id of the charge, transfer or refund (number or string).
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub reference: Option<String>,
    /// Refund events reference the refunded charge here.
    #[serde(default)]
    pub transaction_reference: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    /// ISO currency of a charge.
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// What a notification means for the settlement flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayNotification {
    ChargeSucceeded {
        reference: String,
        amount_minor: i64,
        currency: Option<String>,
    },
    TransferSucceeded {
        reference: String,
    },
    TransferFailed {
        reference: String,
        reason: String,
    },
    RefundSettled {
        reference: String,
        refund_id: Option<String>,
        completed: bool,
        reason: Option<String>,
    },
    /// Events this service does not act on.
    Ignored(String),
}

impl NotificationData {
    fn id_string(&self) -> Option<String> {
        match &self.id {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl WebhookNotification {
    /// Stable key identifying this notification across redeliveries.
    pub fn event_key(&self) -> String {
        let subject = self
            .data
            .id_string()
            .or_else(|| self.data.reference.clone())
            .or_else(|| self.data.transaction_reference.clone())
            .unwrap_or_default();
        let status = self.data.status.as_deref().unwrap_or_default();
        format!("{}:{}:{}", self.event, subject, status)
    }

    /// Interpret the notification, rejecting bodies missing required fields.
    pub fn classify(&self) -> Result<GatewayNotification, AppError> {
        let reference = || {
            self.data.reference.clone().ok_or_else(|| {
                AppError::InvalidRequest(format!("{} notification has no reference", self.event))
            })
        };

        let notification = match self.event.as_str() {
            "charge.success" => GatewayNotification::ChargeSucceeded {
                reference: reference()?,
                amount_minor: self.data.amount.filter(|a| *a > 0).ok_or_else(|| {
                    AppError::InvalidRequest("charge.success notification has no amount".into())
                })?,
                currency: self.data.currency.clone(),
            },
            "transfer.success" => GatewayNotification::TransferSucceeded {
                reference: reference()?,
            },
            "transfer.failed" | "transfer.reversed" => GatewayNotification::TransferFailed {
                reference: reference()?,
                reason: self
                    .data
                    .reason
                    .clone()
                    .or_else(|| self.data.gateway_response.clone())
                    .unwrap_or_else(|| self.event.clone()),
            },
            "refund.processed" | "refund.failed" => GatewayNotification::RefundSettled {
                reference: self
                    .data
                    .transaction_reference
                    .clone()
                    .or_else(|| self.data.reference.clone())
                    .ok_or_else(|| {
                        AppError::InvalidRequest(
                            "refund notification has no transaction reference".into(),
                        )
                    })?,
                refund_id: self.data.id_string(),
                completed: self.event == "refund.processed",
                reason: self.data.reason.clone(),
            },
            other => GatewayNotification::Ignored(other.to_string()),
        };

        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> WebhookNotification {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn classifies_successful_charge() {
        let n = parse(
            r#"{"event":"charge.success",
                "data":{"id":302961,"reference":"pay_abc","amount":10000,"currency":"KES",
                        "status":"success"}}"#,
        );
        assert_eq!(
            n.classify().unwrap(),
            GatewayNotification::ChargeSucceeded {
                reference: "pay_abc".to_string(),
                amount_minor: 10_000,
                currency: Some("KES".to_string()),
            }
        );
        assert_eq!(n.event_key(), "charge.success:302961:success");
    }

    #[test]
    fn charge_without_currency_still_classifies() {
        let n = parse(r#"{"event":"charge.success","data":{"reference":"pay_abc","amount":500}}"#);
        assert!(matches!(
            n.classify().unwrap(),
            GatewayNotification::ChargeSucceeded { currency: None, .. }
        ));
    }

    #[test]
    fn charge_without_amount_is_rejected() {
        let n = parse(r#"{"event":"charge.success","data":{"reference":"pay_abc"}}"#);
        assert!(n.classify().is_err());
    }

    #[test]
    fn reversed_transfer_counts_as_failure() {
        let n = parse(
            r#"{"event":"transfer.reversed","data":{"reference":"wdr_1","status":"reversed"}}"#,
        );
        assert_eq!(
            n.classify().unwrap(),
            GatewayNotification::TransferFailed {
                reference: "wdr_1".to_string(),
                reason: "transfer.reversed".to_string()
            }
        );
    }

    #[test]
    fn refund_uses_transaction_reference() {
        let n = parse(
            r#"{"event":"refund.processed",
                "data":{"id":"rf_9","transaction_reference":"pay_abc","amount":500,
                        "status":"processed"}}"#,
        );
        assert_eq!(
            n.classify().unwrap(),
            GatewayNotification::RefundSettled {
                reference: "pay_abc".to_string(),
                refund_id: Some("rf_9".to_string()),
                completed: true,
                reason: None,
            }
        );
    }

    #[test]
    fn unknown_events_are_ignored() {
        let n = parse(r#"{"event":"subscription.create","data":{}}"#);
        assert_eq!(
            n.classify().unwrap(),
            GatewayNotification::Ignored("subscription.create".to_string())
        );
    }
}
