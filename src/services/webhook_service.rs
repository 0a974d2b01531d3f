//! Inbound gateway webhooks: signature check, delivery log, dispatch.
//!
//! The gateway signs every notification with HMAC-SHA512 over the raw body,
//! keyed with the account's secret key, and sends the hex digest in the
//! `x-paystack-signature` header.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha512;

use crate::{
    db::DbPool,
    error::AppError,
    feed::SettlementFeed,
    models::webhook::{GatewayEvent, GatewayNotification, WebhookNotification},
    services::{ledger_service, refund_service, withdrawal_service},
};

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the hex HMAC of the body.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// What became of a delivered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    Processed,
    /// Same `event_key` seen before.
    Duplicate,
    /// Not an event this service acts on, or nothing left to change.
    Ignored,
}

/// Check `signature` (hex) against HMAC-SHA512(`secret`, `body`).
///
/// The comparison is constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), AppError> {
    let expected = hex::decode(signature.trim()).map_err(|_| AppError::InvalidSignature)?;

    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| AppError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::InvalidSignature)
}

/// Verify, log and apply one webhook delivery.
///
/// Domain refusals (unknown reference, a status that already moved on) are
/// logged and acknowledged so the gateway stops redelivering. Storage and
/// gateway outages drop the delivery log entry and surface as errors so the
/// gateway retries later. A charge in another currency than `currency` is
/// acknowledged and never credited.
pub async fn handle_webhook(
    pool: &DbPool,
    feed: &SettlementFeed,
    secret: &str,
    currency: &str,
    signature: Option<&str>,
    body: &[u8],
) -> Result<WebhookOutcome, AppError> {
    verify_signature(secret, body, signature.ok_or(AppError::InvalidSignature)?)?;

    let notification: WebhookNotification = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed webhook body: {}", e)))?;
    let payload: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed webhook body: {}", e)))?;

    let action = notification.classify()?;
    if let GatewayNotification::Ignored(event_type) = &action {
        tracing::debug!(event_type, "gateway notification ignored");
        return Ok(WebhookOutcome::Ignored);
    }
    if let GatewayNotification::ChargeSucceeded {
        reference,
        currency: charged,
        ..
    } = &action
    {
        if ledger_service::ensure_currency(reference, charged.as_deref(), currency).is_err() {
            return Ok(WebhookOutcome::Ignored);
        }
    }

    let event_key = notification.event_key();
    let logged = sqlx::query_as::<_, GatewayEvent>(
        r#"
        INSERT INTO gateway_events (event_key, event_type, payload)
        VALUES ($1, $2, $3)
        ON CONFLICT (event_key) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(&event_key)
    .bind(&notification.event)
    .bind(&payload)
    .fetch_optional(pool)
    .await?;

    let Some(logged) = logged else {
        tracing::info!(event_key, "duplicate gateway notification skipped");
        return Ok(WebhookOutcome::Duplicate);
    };

    match dispatch(pool, feed, action).await {
        Ok(outcome) => Ok(outcome),
        Err(
            err @ (AppError::NotFound(_) | AppError::InvalidState(_) | AppError::InvalidRequest(_)),
        ) => {
            tracing::warn!(
                event_key,
                event_type = %notification.event,
                error = %err,
                "gateway notification not applied"
            );
            Ok(WebhookOutcome::Ignored)
        }
        Err(err) => {
            sqlx::query("DELETE FROM gateway_events WHERE id = $1")
                .bind(logged.id)
                .execute(pool)
                .await?;
            Err(err)
        }
    }
}

async fn dispatch(
    pool: &DbPool,
    feed: &SettlementFeed,
    action: GatewayNotification,
) -> Result<WebhookOutcome, AppError> {
    match action {
        GatewayNotification::ChargeSucceeded {
            reference,
            amount_minor,
            ..
        } => {
            let recorded =
                ledger_service::record_payment(pool, feed, &reference, amount_minor).await?;
            if recorded.already_recorded {
                return Ok(WebhookOutcome::Ignored);
            }
        }
        GatewayNotification::TransferSucceeded { reference } => {
            withdrawal_service::complete_withdrawal(pool, feed, &reference).await?;
        }
        GatewayNotification::TransferFailed { reference, reason } => {
            withdrawal_service::fail_withdrawal(pool, feed, &reference, &reason).await?;
        }
        GatewayNotification::RefundSettled {
            reference,
            refund_id,
            completed,
            reason,
        } => {
            let settled = refund_service::settle_refund(
                pool,
                feed,
                &reference,
                refund_id.as_deref(),
                completed,
                reason.as_deref(),
            )
            .await?;
            if settled.is_none() {
                return Ok(WebhookOutcome::Ignored);
            }
        }
        GatewayNotification::Ignored(_) => return Ok(WebhookOutcome::Ignored),
    }

    Ok(WebhookOutcome::Processed)
}

/// Hex HMAC-SHA512 of `body`, as the gateway would send it.
#[cfg(test)]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        gateway::fake::FakeGateway,
        models::{
            refund::CreateRefundRequest,
            withdrawal::{CreateWithdrawalRequest, FeePolicy, WithdrawalStatus},
        },
        services::fixtures,
    };

    const SECRET: &str = "sk_test_webhook";
    const BODY: &[u8] = br#"{"event":"charge.success","data":{"reference":"pay_1","amount":500}}"#;

    #[test]
    fn accepts_matching_signature() {
        let signature = sign(SECRET, BODY);
        assert!(verify_signature(SECRET, BODY, &signature).is_ok());
    }

    #[test]
    fn rejects_signature_from_another_key() {
        let signature = sign("sk_test_other", BODY);
        assert!(matches!(
            verify_signature(SECRET, BODY, &signature),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_tampered_body() {
        let signature = sign(SECRET, BODY);
        let tampered = br#"{"event":"charge.success","data":{"reference":"pay_1","amount":900}}"#;
        assert!(verify_signature(SECRET, tampered, &signature).is_err());
    }

    #[test]
    fn rejects_non_hex_signature() {
        assert!(verify_signature(SECRET, BODY, "not-hex").is_err());
    }

    #[tokio::test]
    async fn missing_signature_is_rejected_before_storage() {
        let pool = db::lazy_pool();
        let feed = SettlementFeed::new();

        let err = handle_webhook(&pool, &feed, SECRET, "KES", None, BODY)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));
    }

    #[tokio::test]
    async fn unhandled_events_are_acknowledged_without_storage() {
        let pool = db::lazy_pool();
        let feed = SettlementFeed::new();
        let body = br#"{"event":"subscription.create","data":{}}"#;
        let signature = sign(SECRET, body);

        let outcome = handle_webhook(&pool, &feed, SECRET, "KES", Some(&signature), body)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn charge_in_another_currency_is_acknowledged_without_storage() {
        // The lazy pool fails any query, so Ignored means nothing was stored
        let pool = db::lazy_pool();
        let feed = SettlementFeed::new();
        let body = br#"{"event":"charge.success",
            "data":{"reference":"pay_1","amount":500,"currency":"NGN","status":"success"}}"#;
        let signature = sign(SECRET, body);

        let outcome = handle_webhook(&pool, &feed, SECRET, "KES", Some(&signature), body)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    async fn deliver(pool: &DbPool, body: &str) -> WebhookOutcome {
        let signature = sign(SECRET, body.as_bytes());
        handle_webhook(
            pool,
            &SettlementFeed::new(),
            SECRET,
            "KES",
            Some(&signature),
            body.as_bytes(),
        )
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn foreign_currency_charge_leaves_the_ledger_alone(pool: DbPool) {
        let guest = fixtures::customer();
        let event = fixtures::insert_event(&pool, uuid::Uuid::new_v4(), 0).await;
        let booking = fixtures::insert_booking(&pool, &event, guest.user_id, 500).await;
        fixtures::insert_payment(&pool, &booking, 500, "pending", "pay_ngn").await;

        let body = r#"{"event":"charge.success",
            "data":{"id":1,"reference":"pay_ngn","amount":500,"currency":"NGN",
                    "status":"success"}}"#;
        assert_eq!(deliver(&pool, body).await, WebhookOutcome::Ignored);

        assert_eq!(fixtures::event_balance(&pool, event.id).await, 0);
        assert_eq!(fixtures::count_rows(&pool, "gateway_events").await, 0);
    }

    #[sqlx::test]
    async fn redelivered_charge_is_applied_once(pool: DbPool) {
        let guest = fixtures::customer();
        let event = fixtures::insert_event(&pool, uuid::Uuid::new_v4(), 0).await;
        let booking = fixtures::insert_booking(&pool, &event, guest.user_id, 500).await;
        fixtures::insert_payment(&pool, &booking, 500, "pending", "pay_kes").await;

        let body = r#"{"event":"charge.success",
            "data":{"id":2,"reference":"pay_kes","amount":500,"currency":"KES",
                    "status":"success"}}"#;
        assert_eq!(deliver(&pool, body).await, WebhookOutcome::Processed);
        assert_eq!(deliver(&pool, body).await, WebhookOutcome::Duplicate);

        assert_eq!(fixtures::event_balance(&pool, event.id).await, 500);
    }

    #[sqlx::test]
    async fn transfer_success_completes_a_withdrawal_once_refunds_are_held(pool: DbPool) {
        let organizer = fixtures::organizer();
        let event = fixtures::insert_event(&pool, organizer.user_id, 10_000).await;
        let booking = fixtures::insert_booking(&pool, &event, uuid::Uuid::new_v4(), 10_000).await;
        let payment =
            fixtures::insert_payment(&pool, &booking, 10_000, "completed", "pay_full").await;
        let feed = SettlementFeed::new();
        let fees = FeePolicy {
            rate_bps: 50,
            minimum_fee_minor: 100,
        };

        let withdrawal = withdrawal_service::create_withdrawal_request(
            &pool,
            &fees,
            &feed,
            &organizer,
            CreateWithdrawalRequest {
                event_id: event.id,
                amount_minor: 9_000,
            },
        )
        .await
        .unwrap();

        // The withdrawal holds 9000 of the 10000, so a full refund cannot be filed
        let err = refund_service::create_refund_request(
            &pool,
            &feed,
            &organizer,
            CreateRefundRequest {
                payment_id: payment.id,
                amount_minor: 10_000,
                reason: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(fixtures::count_rows(&pool, "refunds").await, 0);

        let gateway = FakeGateway::default();
        withdrawal_service::process_withdrawal(
            &pool,
            &gateway,
            "KES",
            &feed,
            &fixtures::admin(),
            withdrawal.id,
        )
        .await
        .unwrap();

        let body = format!(
            r#"{{"event":"transfer.success",
                "data":{{"id":7,"reference":"{}","status":"success"}}}}"#,
            withdrawal.reference
        );
        assert_eq!(deliver(&pool, &body).await, WebhookOutcome::Processed);

        let status: WithdrawalStatus =
            sqlx::query_scalar("SELECT status FROM withdrawals WHERE id = $1")
                .bind(withdrawal.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, WithdrawalStatus::Completed);
        assert_eq!(fixtures::event_balance(&pool, event.id).await, 1_000);
    }
}
