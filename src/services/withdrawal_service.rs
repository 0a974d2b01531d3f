//! Withdrawal service - organizer payouts from event collection balances.
//!
//! # Balance Guarantees
//!
//! Filing a withdrawal locks the event row (`FOR UPDATE`) and counts every
//! `pending`/`processing` withdrawal and refund as held, so concurrent
//! requests against one event are serialized and can never jointly exceed
//! its balance. The balance itself is debited only when the transfer
//! completes; a transfer the balance cannot cover is still recorded and
//! flagged for reconciliation.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    feed::{SettlementFeed, SettlementKind, SettlementUpdate},
    gateway::PaymentGateway,
    middleware::auth::AuthContext,
    models::{
        event::{EventBalance, PaymentManagement},
        payment::generate_reference,
        withdrawal::{CreateWithdrawalRequest, FeePolicy, WithdrawalRequest, WithdrawalStatus},
    },
    services::{event_service, payout},
};

fn publish(feed: &SettlementFeed, withdrawal: &WithdrawalRequest) {
    feed.publish(SettlementUpdate {
        organizer_id: withdrawal.organizer_id,
        event_id: withdrawal.event_id,
        kind: SettlementKind::Withdrawal,
        id: withdrawal.id,
        status: status_name(withdrawal.status).to_string(),
        amount_minor: withdrawal.amount_minor,
    });
}

fn status_name(status: WithdrawalStatus) -> &'static str {
    match status {
        WithdrawalStatus::Pending => "pending",
        WithdrawalStatus::Processing => "processing",
        WithdrawalStatus::Completed => "completed",
        WithdrawalStatus::Failed => "failed",
    }
}

async fn fetch_by_reference<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    reference: &str,
) -> Result<Option<WithdrawalRequest>, AppError> {
    Ok(
        sqlx::query_as::<_, WithdrawalRequest>("SELECT * FROM withdrawals WHERE reference = $1")
            .bind(reference)
            .fetch_optional(executor)
            .await?,
    )
}

/// File a withdrawal against an event's collection balance.
///
/// # Process
///
/// 1. Quote the fee (rejects amounts the fee would swallow)
/// 2. Lock the event; check ownership, payout mode and account details
/// 3. Reject if `amount > collection_balance - held` (nothing written)
/// 4. Insert a `pending` request with the account details snapshotted
pub async fn create_withdrawal_request(
    pool: &DbPool,
    fees: &FeePolicy,
    feed: &SettlementFeed,
    auth: &AuthContext,
    request: CreateWithdrawalRequest,
) -> Result<WithdrawalRequest, AppError> {
    auth.require_organizer()?;
    let quote = fees.quote(request.amount_minor)?;

    let mut tx = pool.begin().await?;

    let event = event_service::lock_event(&mut tx, request.event_id).await?;
    auth.require_manager_of(event.organizer_id)?;

    if event.payment_management != PaymentManagement::Platform {
        return Err(AppError::InvalidState(
            "Withdrawals are not available for events that collect payments directly"
                .to_string(),
        ));
    }

    let account = event.account_details().cloned().ok_or_else(|| {
        AppError::InvalidRequest(
            "Add payout account details before requesting a withdrawal".to_string(),
        )
    })?;

    let held = event_service::held_funds(&mut tx, event.id).await?;
    let balance = EventBalance::new(event.id, event.collection_balance_minor, held);
    if let Err(err) = balance.ensure_covers(quote.amount_minor) {
        tx.rollback().await?;
        tracing::warn!(
            event_id = %event.id,
            requested_minor = quote.amount_minor,
            available_minor = balance.available_minor,
            "withdrawal exceeds available balance"
        );
        return Err(err);
    }

    let withdrawal = sqlx::query_as::<_, WithdrawalRequest>(
        r#"
        INSERT INTO withdrawals (
            organizer_id,
            event_id,
            amount_minor,
            platform_fee_minor,
            net_amount_minor,
            account_details,
            reference
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(event.organizer_id)
    .bind(event.id)
    .bind(quote.amount_minor)
    .bind(quote.platform_fee_minor)
    .bind(quote.net_amount_minor)
    .bind(sqlx::types::Json(account))
    .bind(generate_reference("wdr"))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        withdrawal_id = %withdrawal.id,
        event_id = %withdrawal.event_id,
        amount_minor = withdrawal.amount_minor,
        platform_fee_minor = withdrawal.platform_fee_minor,
        net_amount_minor = withdrawal.net_amount_minor,
        "withdrawal requested"
    );
    publish(feed, &withdrawal);

    Ok(withdrawal)
}

/// Execute a pending withdrawal: validate account, create recipient, transfer.
///
/// The request is claimed (`pending → processing`) before the gateway is
/// called, so two operators cannot pay it out twice. A definite gateway
/// failure marks it `failed`; a transfer whose outcome is unknown stays
/// `processing` until the gateway's transfer notification settles it.
pub async fn process_withdrawal(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    currency: &str,
    feed: &SettlementFeed,
    auth: &AuthContext,
    withdrawal_id: Uuid,
) -> Result<WithdrawalRequest, AppError> {
    auth.require_admin()?;

    let claimed = sqlx::query_as::<_, WithdrawalRequest>(
        r#"
        UPDATE withdrawals
        SET status = 'processing', updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(withdrawal_id)
    .fetch_optional(pool)
    .await?;

    let withdrawal = match claimed {
        Some(withdrawal) => withdrawal,
        None => {
            let status: Option<WithdrawalStatus> =
                sqlx::query_scalar("SELECT status FROM withdrawals WHERE id = $1")
                    .bind(withdrawal_id)
                    .fetch_optional(pool)
                    .await?;
            return Err(match status {
                Some(status) => AppError::InvalidState(format!(
                    "Withdrawal is already {}",
                    status_name(status)
                )),
                None => AppError::NotFound("Withdrawal"),
            });
        }
    };
    publish(feed, &withdrawal);

    let outcome = payout::execute_payout(
        gateway,
        &withdrawal.account_details.0,
        withdrawal.net_amount_minor,
        &withdrawal.reference,
        currency,
    )
    .await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(failure) if failure.is_indeterminate() => {
            tracing::warn!(
                withdrawal_id = %withdrawal.id,
                error = %failure.error,
                "transfer outcome unknown; awaiting gateway notification"
            );
            return Err(failure.error);
        }
        Err(failure) => {
            fail_withdrawal(pool, feed, &withdrawal.reference, &failure.error.to_string())
                .await?;
            return Err(failure.error);
        }
    };

    let withdrawal = sqlx::query_as::<_, WithdrawalRequest>(
        r#"
        UPDATE withdrawals
        SET recipient_code = $1,
            transfer_code = $2,
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(&outcome.recipient_code)
    .bind(&outcome.transfer.transfer_code)
    .bind(withdrawal.id)
    .fetch_one(pool)
    .await?;

    if outcome.transfer.is_successful() {
        return complete_withdrawal(pool, feed, &withdrawal.reference).await;
    }

    Ok(withdrawal)
}

/// Mark a withdrawal completed and debit the event's collection balance.
///
/// The gateway has already moved the money, so the transfer is always
/// recorded. If the balance cannot cover it the balance is emptied, the
/// withdrawal is flagged `needs_reconciliation` and an error is logged.
/// A success reported for a withdrawal already marked `failed` is flagged
/// the same way and refused. Completing a completed withdrawal is a no-op.
pub async fn complete_withdrawal(
    pool: &DbPool,
    feed: &SettlementFeed,
    reference: &str,
) -> Result<WithdrawalRequest, AppError> {
    let mut tx = pool.begin().await?;

    let withdrawal = sqlx::query_as::<_, WithdrawalRequest>(
        "SELECT * FROM withdrawals WHERE reference = $1 FOR UPDATE",
    )
    .bind(reference)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Withdrawal"))?;

    match withdrawal.status {
        WithdrawalStatus::Completed => {
            tx.rollback().await?;
            return Ok(withdrawal);
        }
        WithdrawalStatus::Failed => {
            sqlx::query(
                r#"
                UPDATE withdrawals
                SET needs_reconciliation = TRUE,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(withdrawal.id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            tracing::error!(
                reference,
                withdrawal_id = %withdrawal.id,
                "transfer success reported for a failed withdrawal; flagged for reconciliation"
            );
            return Err(AppError::InvalidState(
                "Withdrawal was already marked failed".to_string(),
            ));
        }
        WithdrawalStatus::Pending | WithdrawalStatus::Processing => {}
    }

    let event = event_service::lock_event(&mut tx, withdrawal.event_id).await?;
    let shortfall = (withdrawal.amount_minor - event.collection_balance_minor).max(0);
    if shortfall > 0 {
        tracing::error!(
            reference,
            event_id = %event.id,
            amount_minor = withdrawal.amount_minor,
            shortfall_minor = shortfall,
            "event balance below completed withdrawal; flagged for reconciliation"
        );
    }

    sqlx::query(
        r#"
        UPDATE events
        SET collection_balance_minor = collection_balance_minor - $1,
            updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(withdrawal.amount_minor - shortfall)
    .bind(event.id)
    .execute(&mut *tx)
    .await?;

    let withdrawal = sqlx::query_as::<_, WithdrawalRequest>(
        r#"
        UPDATE withdrawals
        SET status = 'completed',
            needs_reconciliation = needs_reconciliation OR $2,
            completed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(withdrawal.id)
    .bind(shortfall > 0)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        withdrawal_id = %withdrawal.id,
        reference,
        amount_minor = withdrawal.amount_minor,
        "withdrawal completed"
    );
    publish(feed, &withdrawal);

    Ok(withdrawal)
}

/// Mark a pending or processing withdrawal failed, releasing its held funds.
///
/// Failing an already failed withdrawal is a no-op.
pub async fn fail_withdrawal(
    pool: &DbPool,
    feed: &SettlementFeed,
    reference: &str,
    reason: &str,
) -> Result<WithdrawalRequest, AppError> {
    let failed = sqlx::query_as::<_, WithdrawalRequest>(
        r#"
        UPDATE withdrawals
        SET status = 'failed',
            failure_reason = $2,
            updated_at = NOW()
        WHERE reference = $1 AND status IN ('pending', 'processing')
        RETURNING *
        "#,
    )
    .bind(reference)
    .bind(reason)
    .fetch_optional(pool)
    .await?;

    if let Some(withdrawal) = failed {
        tracing::info!(
            withdrawal_id = %withdrawal.id,
            reference,
            reason,
            "withdrawal failed"
        );
        publish(feed, &withdrawal);
        return Ok(withdrawal);
    }

    match fetch_by_reference(pool, reference).await? {
        Some(existing) if existing.status == WithdrawalStatus::Failed => Ok(existing),
        Some(existing) => {
            tracing::warn!(
                reference,
                reason,
                "failure reported for a completed withdrawal; manual reconciliation required"
            );
            Err(AppError::InvalidState(format!(
                "Withdrawal is already {}",
                status_name(existing.status)
            )))
        }
        None => Err(AppError::NotFound("Withdrawal")),
    }
}

/// Withdrawals filed for the caller's events (all of them for admins).
pub async fn list_withdrawals(
    pool: &DbPool,
    auth: &AuthContext,
) -> Result<Vec<WithdrawalRequest>, AppError> {
    auth.require_organizer()?;

    let withdrawals = sqlx::query_as::<_, WithdrawalRequest>(
        r#"
        SELECT * FROM withdrawals
        WHERE organizer_id = $1 OR $2
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth.user_id)
    .bind(auth.is_admin())
    .fetch_all(pool)
    .await?;

    Ok(withdrawals)
}
