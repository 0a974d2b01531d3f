//! Events: creation, payout account, collection balance.

use sqlx::{PgConnection, PgExecutor, types::Json};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    gateway::PaymentGateway,
    middleware::auth::AuthContext,
    models::event::{AccountDetails, CreateEventRequest, Event, EventBalance},
    services::payout,
};

/// Fetch an event by id.
pub async fn fetch_event<'e>(
    executor: impl PgExecutor<'e>,
    event_id: Uuid,
) -> Result<Event, AppError> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Event"))
}

/// An event as the caller may see it.
///
/// Anyone authenticated can look an event up to book it; the payout
/// account is only shown to whoever manages the event.
pub async fn get_event(
    pool: &DbPool,
    auth: &AuthContext,
    event_id: Uuid,
) -> Result<Event, AppError> {
    let mut event = fetch_event(pool, event_id).await?;
    if !auth.can_manage(event.organizer_id) {
        event.account_details = None;
    }
    Ok(event)
}

/// Fetch and lock an event row for the rest of the transaction.
pub async fn lock_event(conn: &mut PgConnection, event_id: Uuid) -> Result<Event, AppError> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
        .bind(event_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Event"))
}

/// Funds already promised out of the event's balance.
///
/// Both withdrawals and refunds that are still `pending` or `processing`
/// will take money out of `collection_balance_minor` when they settle.
pub async fn held_funds(conn: &mut PgConnection, event_id: Uuid) -> Result<i64, AppError> {
    let held: i64 = sqlx::query_scalar(
        r#"
        SELECT (
            (SELECT COALESCE(SUM(amount_minor), 0)
             FROM withdrawals
             WHERE event_id = $1 AND status IN ('pending', 'processing'))
            +
            (SELECT COALESCE(SUM(amount_minor), 0)
             FROM refunds
             WHERE event_id = $1 AND status IN ('pending', 'processing'))
        )::BIGINT
        "#,
    )
    .bind(event_id)
    .fetch_one(conn)
    .await?;

    Ok(held)
}

/// Create an event owned by the caller.
///
/// If payout account details are supplied they are validated with the
/// gateway first, and the resolved account name is stored.
pub async fn create_event(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    auth: &AuthContext,
    request: CreateEventRequest,
) -> Result<Event, AppError> {
    auth.require_organizer()?;
    request.validate()?;

    let account_details = match request.account_details {
        Some(details) => Some(resolve_details(gateway, details).await?),
        None => None,
    };

    let event = sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events (
            organizer_id,
            title,
            price_minor,
            total_spaces,
            available_spaces,
            account_details,
            payment_management
        )
        VALUES ($1, $2, $3, $4, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(auth.user_id)
    .bind(request.title.trim())
    .bind(request.price_minor)
    .bind(request.total_spaces)
    .bind(account_details.map(Json))
    .bind(request.payment_management)
    .fetch_one(pool)
    .await?;

    tracing::info!(event_id = %event.id, organizer_id = %event.organizer_id, "event created");
    Ok(event)
}

/// Replace the payout account of an event after validating it.
///
/// Withdrawals already filed keep the account they were filed with.
pub async fn set_account_details(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    auth: &AuthContext,
    event_id: Uuid,
    details: AccountDetails,
) -> Result<Event, AppError> {
    let event = fetch_event(pool, event_id).await?;
    auth.require_manager_of(event.organizer_id)?;

    let details = resolve_details(gateway, details).await?;

    let event = sqlx::query_as::<_, Event>(
        "UPDATE events SET account_details = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(Json(details))
    .bind(event_id)
    .fetch_one(pool)
    .await?;

    tracing::info!(event_id = %event.id, "payout account updated");
    Ok(event)
}

async fn resolve_details(
    gateway: &dyn PaymentGateway,
    details: AccountDetails,
) -> Result<AccountDetails, AppError> {
    let resolved = payout::validate_account(gateway, &details).await?;
    Ok(AccountDetails {
        bank_code: details.bank_code.trim().to_string(),
        account_number: details.account_number.trim().to_string(),
        account_name: Some(resolved.account_name)
            .filter(|name| !name.trim().is_empty())
            .or(details.account_name),
    })
}

/// Collection balance, held funds and what is left to withdraw.
pub async fn event_balance(
    pool: &DbPool,
    auth: &AuthContext,
    event_id: Uuid,
) -> Result<EventBalance, AppError> {
    let event = fetch_event(pool, event_id).await?;
    auth.require_manager_of(event.organizer_id)?;

    let mut conn = pool.acquire().await?;
    let held = held_funds(&mut conn, event_id).await?;

    Ok(EventBalance::new(
        event.id,
        event.collection_balance_minor,
        held,
    ))
}
