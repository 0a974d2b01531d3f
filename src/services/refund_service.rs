//! Refund service - organizer-approved refunds of completed payments.
//!
//! A refund is filed `pending`, approved by an organizer or admin (which
//! forwards it to the gateway and moves it to `processing`), and settled
//! `completed`/`failed` by the gateway's refund notification.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    feed::{SettlementFeed, SettlementKind, SettlementUpdate},
    gateway::{GatewayError, PaymentGateway, RefundInstruction},
    middleware::auth::AuthContext,
    models::{
        event::EventBalance,
        payment::{Payment, PaymentRecordStatus},
        refund::{CreateRefundRequest, RefundRequest, RefundStatus, check_refundable},
    },
    services::event_service,
};

fn publish(feed: &SettlementFeed, organizer_id: Uuid, refund: &RefundRequest) {
    let status = match refund.status {
        RefundStatus::Pending => "pending",
        RefundStatus::Processing => "processing",
        RefundStatus::Completed => "completed",
        RefundStatus::Failed => "failed",
    };
    feed.publish(SettlementUpdate {
        organizer_id,
        event_id: refund.event_id,
        kind: SettlementKind::Refund,
        id: refund.id,
        status: status.to_string(),
        amount_minor: refund.amount_minor,
    });
}

/// File a refund against a completed payment.
///
/// The payment row and then the event row are locked while the amount is
/// checked, so two requests against one payment cannot together refund
/// more than it was for, and a refund cannot claim money a withdrawal
/// already holds. All validation happens before the gateway is involved.
pub async fn create_refund_request(
    pool: &DbPool,
    feed: &SettlementFeed,
    auth: &AuthContext,
    request: CreateRefundRequest,
) -> Result<RefundRequest, AppError> {
    auth.require_organizer()?;
    crate::money::require_positive("amount_minor", request.amount_minor)?;

    let mut tx = pool.begin().await?;

    let payment =
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(request.payment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Payment"))?;

    let event = event_service::lock_event(&mut tx, payment.event_id).await?;
    auth.require_manager_of(event.organizer_id)?;

    if payment.status != PaymentRecordStatus::Completed {
        return Err(AppError::InvalidState(
            "Only completed payments can be refunded".to_string(),
        ));
    }

    let already_refunded: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount_minor), 0)::BIGINT
        FROM refunds
        WHERE payment_id = $1 AND status <> 'failed'
        "#,
    )
    .bind(payment.id)
    .fetch_one(&mut *tx)
    .await?;

    check_refundable(payment.amount_minor, already_refunded, request.amount_minor)?;

    let held = event_service::held_funds(&mut tx, event.id).await?;
    let balance = EventBalance::new(event.id, event.collection_balance_minor, held);
    if balance.ensure_covers(request.amount_minor).is_err() {
        tx.rollback().await?;
        tracing::warn!(
            event_id = %event.id,
            requested_minor = request.amount_minor,
            available_minor = balance.available_minor,
            "refund exceeds available balance"
        );
        return Err(AppError::InvalidState(
            "Refund amount exceeds the event's available balance".to_string(),
        ));
    }

    let reason = request
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let refund = sqlx::query_as::<_, RefundRequest>(
        r#"
        INSERT INTO refunds (
            event_id,
            booking_id,
            payment_id,
            requested_by,
            amount_minor,
            reference,
            reason
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(payment.event_id)
    .bind(payment.booking_id)
    .bind(payment.id)
    .bind(auth.user_id)
    .bind(request.amount_minor)
    .bind(&payment.reference)
    .bind(reason)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        refund_id = %refund.id,
        payment_id = %payment.id,
        amount_minor = refund.amount_minor,
        "refund requested"
    );
    publish(feed, event.organizer_id, &refund);

    Ok(refund)
}

/// Approve a pending refund and forward it to the gateway.
///
/// The refund row stays locked across the gateway call so a second approval
/// waits and then sees `processing`. If the gateway rejects the refund the
/// transaction rolls back and the request is left `pending`, untouched.
/// If the call fails in transport the gateway may have created the refund
/// anyway: the request moves to `processing` without a gateway id, the
/// error is returned, and the `refund.*` notification settles it.
pub async fn approve_refund(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    feed: &SettlementFeed,
    auth: &AuthContext,
    refund_id: Uuid,
) -> Result<RefundRequest, AppError> {
    auth.require_organizer()?;

    let mut tx = pool.begin().await?;

    let refund =
        sqlx::query_as::<_, RefundRequest>("SELECT * FROM refunds WHERE id = $1 FOR UPDATE")
            .bind(refund_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Refund"))?;

    let event = event_service::fetch_event(&mut *tx, refund.event_id).await?;
    auth.require_manager_of(event.organizer_id)?;

    if refund.status != RefundStatus::Pending {
        return Err(AppError::InvalidState(
            "Only pending refunds can be approved".to_string(),
        ));
    }

    let result = gateway
        .create_refund(&RefundInstruction {
            transaction: refund.reference.clone(),
            amount_minor: refund.amount_minor,
        })
        .await;

    let (gateway_refund_id, unknown_outcome) = match result {
        Ok(gateway_refund) => (Some(gateway_refund.id.to_string()), None),
        Err(GatewayError::Rejected(message)) => {
            tx.rollback().await?;
            tracing::warn!(
                refund_id = %refund.id,
                gateway_message = %message,
                "gateway refused refund"
            );
            return Err(AppError::Gateway(message));
        }
        Err(err @ GatewayError::Transport(_)) => (None, Some(AppError::from(err))),
    };

    let refund = sqlx::query_as::<_, RefundRequest>(
        r#"
        UPDATE refunds
        SET status = 'processing',
            processed_at = NOW(),
            gateway_refund_id = $2
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(refund.id)
    .bind(gateway_refund_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    publish(feed, event.organizer_id, &refund);

    if let Some(err) = unknown_outcome {
        tracing::warn!(
            refund_id = %refund.id,
            error = %err,
            "refund outcome unknown; awaiting gateway notification"
        );
        return Err(err);
    }

    tracing::info!(
        refund_id = %refund.id,
        gateway_refund_id = refund.gateway_refund_id.as_deref().unwrap_or_default(),
        "refund approved"
    );

    Ok(refund)
}

/// Apply the gateway's final word on a refund of the charge `reference`.
///
/// Picks the processing refund whose gateway id matches `refund_id`, falling
/// back to the oldest processing refund of that charge. A completed refund
/// takes its amount out of the event's collection balance (not below zero).
/// Returns `None` when every refund of the charge is already settled.
pub async fn settle_refund(
    pool: &DbPool,
    feed: &SettlementFeed,
    reference: &str,
    refund_id: Option<&str>,
    completed: bool,
    reason: Option<&str>,
) -> Result<Option<RefundRequest>, AppError> {
    let mut tx = pool.begin().await?;

    let refund = sqlx::query_as::<_, RefundRequest>(
        r#"
        SELECT * FROM refunds
        WHERE reference = $1 AND status = 'processing'
        ORDER BY (gateway_refund_id = $2) DESC NULLS LAST, processed_at ASC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(reference)
    .bind(refund_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(refund) = refund else {
        let known: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM refunds WHERE reference = $1)")
                .bind(reference)
                .fetch_one(&mut *tx)
                .await?;
        tx.rollback().await?;
        if known {
            tracing::debug!(reference, "refund notification for settled refunds ignored");
            return Ok(None);
        }
        return Err(AppError::NotFound("Refund"));
    };

    if completed {
        sqlx::query(
            r#"
            UPDATE events
            SET collection_balance_minor = GREATEST(collection_balance_minor - $1, 0),
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(refund.amount_minor)
        .bind(refund.event_id)
        .execute(&mut *tx)
        .await?;
    }

    let status = if completed {
        RefundStatus::Completed
    } else {
        RefundStatus::Failed
    };

    let refund = sqlx::query_as::<_, RefundRequest>(
        r#"
        UPDATE refunds
        SET status = $2,
            settled_at = NOW(),
            failure_reason = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(refund.id)
    .bind(status)
    .bind(if completed { None } else { reason })
    .fetch_one(&mut *tx)
    .await?;

    let organizer_id = event_service::fetch_event(&mut *tx, refund.event_id)
        .await?
        .organizer_id;

    tx.commit().await?;

    tracing::info!(refund_id = %refund.id, reference, completed, "refund settled");
    publish(feed, organizer_id, &refund);

    Ok(Some(refund))
}

/// Refunds filed for an event, newest first.
pub async fn list_refunds(
    pool: &DbPool,
    auth: &AuthContext,
    event_id: Uuid,
) -> Result<Vec<RefundRequest>, AppError> {
    let event = event_service::fetch_event(pool, event_id).await?;
    auth.require_manager_of(event.organizer_id)?;

    let refunds = sqlx::query_as::<_, RefundRequest>(
        "SELECT * FROM refunds WHERE event_id = $1 ORDER BY created_at DESC",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    Ok(refunds)
}
