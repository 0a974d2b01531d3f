//! Rows and callers for service tests that run against a real database.

use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    db::DbPool,
    middleware::auth::AuthContext,
    models::{
        api_key::UserRole,
        booking::Booking,
        event::{AccountDetails, Event},
        payment::Payment,
    },
};

fn caller(role: UserRole) -> AuthContext {
    AuthContext {
        api_key_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        role,
    }
}

pub fn organizer() -> AuthContext {
    caller(UserRole::Organizer)
}

pub fn admin() -> AuthContext {
    caller(UserRole::Admin)
}

pub fn customer() -> AuthContext {
    caller(UserRole::User)
}

/// A platform-managed event with a payout account and `balance_minor` collected.
pub async fn insert_event(pool: &DbPool, organizer_id: Uuid, balance_minor: i64) -> Event {
    sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events (
            organizer_id,
            title,
            price_minor,
            total_spaces,
            available_spaces,
            collection_balance_minor,
            account_details
        )
        VALUES ($1, 'Lake Naivasha Weekend', 10000, 40, 40, $2, $3)
        RETURNING *
        "#,
    )
    .bind(organizer_id)
    .bind(balance_minor)
    .bind(Json(AccountDetails {
        bank_code: "68".to_string(),
        account_number: "0123456789".to_string(),
        account_name: Some("JANE ORGANIZER".to_string()),
    }))
    .fetch_one(pool)
    .await
    .unwrap()
}

/// An unpaid booking of one space owing `total_minor`.
pub async fn insert_booking(
    pool: &DbPool,
    event: &Event,
    user_id: Uuid,
    total_minor: i64,
) -> Booking {
    sqlx::query_as::<_, Booking>(
        r#"
        INSERT INTO bookings (event_id, user_id, quantity, total_amount_minor, amount_due_minor)
        VALUES ($1, $2, 1, $3, $3)
        RETURNING *
        "#,
    )
    .bind(event.id)
    .bind(user_id)
    .bind(total_minor)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// A payment row against `booking` with the given status name.
pub async fn insert_payment(
    pool: &DbPool,
    booking: &Booking,
    amount_minor: i64,
    status: &str,
    reference: &str,
) -> Payment {
    sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (event_id, booking_id, user_id, amount_minor, status, reference)
        VALUES ($1, $2, $3, $4, $5::payment_record_status, $6)
        RETURNING *
        "#,
    )
    .bind(booking.event_id)
    .bind(booking.id)
    .bind(booking.user_id)
    .bind(amount_minor)
    .bind(status)
    .bind(reference)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn event_balance(pool: &DbPool, event_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT collection_balance_minor FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn count_rows(pool: &DbPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}
