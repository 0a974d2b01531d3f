//! Ledger service - bookings and the payments that settle them.
//!
//! This service handles:
//! - Reserving spaces and opening a booking ledger
//! - Opening gateway checkouts against a booking
//! - Recording completed payments into the booking and event balance
//!
//! # Atomicity Guarantees
//!
//! Recording a payment locks the payment row, then the booking row, then
//! updates the event in the same PostgreSQL transaction. A payment is
//! applied to the ledger at most once, however often the gateway reports it.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    feed::{SettlementFeed, SettlementKind, SettlementUpdate},
    gateway::{CheckoutRequest, PaymentGateway, TransactionVerification},
    middleware::auth::AuthContext,
    models::{
        booking::{Booking, PaymentStatus},
        payment::{
            InitiatePaymentRequest, Payment, PaymentCheckout, PaymentRecordStatus,
            generate_reference,
        },
    },
    services::event_service,
};

/// Result of applying a gateway payment to the ledger.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RecordedPayment {
    pub payment: Payment,
    pub booking: Booking,
    /// Part of the payment above what was due; flagged for reconciliation.
    pub overpaid_minor: i64,
    /// The payment had already been recorded; nothing changed.
    pub already_recorded: bool,
}

/// Outcome of confirming a payment with the gateway.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentConfirmation {
    pub payment: Payment,
    pub booking: Option<Booking>,
    pub gateway_status: String,
}

async fn fetch_booking<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    booking_id: Uuid,
) -> Result<Booking, AppError> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(booking_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Booking"))
}

/// Reserve `quantity` spaces on an event and open the booking ledger.
///
/// Spaces are taken with a conditional update, so concurrent bookings can
/// never push `available_spaces` below zero.
pub async fn create_booking(
    pool: &DbPool,
    auth: &AuthContext,
    event_id: Uuid,
    quantity: i32,
) -> Result<Booking, AppError> {
    if quantity <= 0 {
        return Err(AppError::InvalidRequest(
            "quantity must be positive".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let price_minor: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE events
        SET available_spaces = available_spaces - $1,
            updated_at = NOW()
        WHERE id = $2 AND available_spaces >= $1
        RETURNING price_minor
        "#,
    )
    .bind(quantity)
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(price_minor) = price_minor else {
        // Distinguish a missing event from a full one
        event_service::fetch_event(&mut *tx, event_id).await?;
        tx.rollback().await?;
        return Err(AppError::InvalidState(
            "Not enough spaces available".to_string(),
        ));
    };

    let total_minor = price_minor
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| AppError::InvalidRequest("Booking total is too large".to_string()))?;

    let booking = sqlx::query_as::<_, Booking>(
        r#"
        INSERT INTO bookings (
            event_id,
            user_id,
            quantity,
            total_amount_minor,
            amount_paid_minor,
            amount_due_minor,
            payment_status
        )
        VALUES ($1, $2, $3, $4, 0, $4, $5)
        RETURNING *
        "#,
    )
    .bind(event_id)
    .bind(auth.user_id)
    .bind(quantity)
    .bind(total_minor)
    .bind(PaymentStatus::derive(0, total_minor))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        booking_id = %booking.id,
        event_id = %event_id,
        quantity,
        total_minor,
        "booking created"
    );
    Ok(booking)
}

/// Get a booking visible to the caller (its user, or the event's manager).
pub async fn get_booking(
    pool: &DbPool,
    auth: &AuthContext,
    booking_id: Uuid,
) -> Result<Booking, AppError> {
    let booking = fetch_booking(pool, booking_id).await?;
    if booking.user_id != auth.user_id {
        let event = event_service::fetch_event(pool, booking.event_id).await?;
        if !auth.can_manage(event.organizer_id) {
            // Same answer as a missing booking
            return Err(AppError::NotFound("Booking"));
        }
    }
    Ok(booking)
}

/// All bookings of an event, newest first.
pub async fn list_event_bookings(
    pool: &DbPool,
    auth: &AuthContext,
    event_id: Uuid,
) -> Result<Vec<Booking>, AppError> {
    let event = event_service::fetch_event(pool, event_id).await?;
    auth.require_manager_of(event.organizer_id)?;

    let bookings = sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE event_id = $1 ORDER BY created_at DESC",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    Ok(bookings)
}

/// Open a gateway checkout for part or all of what a booking owes.
///
/// # Process
///
/// 1. Validate amount (positive, not above `amount_due`) and email
/// 2. Record a `pending` payment with a fresh reference
/// 3. Initialize the checkout at the gateway
/// 4. Store the authorization URL (or mark the payment failed)
pub async fn initiate_payment(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    currency: &str,
    auth: &AuthContext,
    booking_id: Uuid,
    request: InitiatePaymentRequest,
) -> Result<PaymentCheckout, AppError> {
    request.validate()?;

    let booking = get_booking(pool, auth, booking_id).await?;
    if request.amount_minor > booking.amount_due_minor {
        return Err(AppError::InvalidRequest(format!(
            "Amount exceeds the amount due of {}",
            booking.amount_due_minor
        )));
    }

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (event_id, booking_id, user_id, amount_minor, reference)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(booking.event_id)
    .bind(booking.id)
    .bind(booking.user_id)
    .bind(request.amount_minor)
    .bind(generate_reference("pay"))
    .fetch_one(pool)
    .await?;

    let checkout = CheckoutRequest {
        email: request.email.trim().to_string(),
        amount_minor: payment.amount_minor,
        reference: payment.reference.clone(),
        currency: currency.to_string(),
    };

    let session = match gateway.initialize_transaction(&checkout).await {
        Ok(session) => session,
        Err(err) => {
            sqlx::query("UPDATE payments SET status = 'failed' WHERE id = $1")
                .bind(payment.id)
                .execute(pool)
                .await?;
            return Err(err.into());
        }
    };

    let payment = sqlx::query_as::<_, Payment>(
        "UPDATE payments SET authorization_url = $1 WHERE id = $2 RETURNING *",
    )
    .bind(&session.authorization_url)
    .bind(payment.id)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        reference = %payment.reference,
        booking_id = %booking.id,
        amount_minor = payment.amount_minor,
        "checkout opened"
    );

    Ok(PaymentCheckout {
        payment,
        authorization_url: session.authorization_url,
        access_code: session.access_code,
    })
}

/// Apply a completed gateway payment to the booking ledger and event balance.
///
/// `amount_minor` is what the gateway actually charged. The booking's
/// `amount_paid` is clamped at its total (excess flagged for
/// reconciliation); the event balance grows by the full amount collected.
pub async fn record_payment(
    pool: &DbPool,
    feed: &SettlementFeed,
    reference: &str,
    amount_minor: i64,
) -> Result<RecordedPayment, AppError> {
    crate::money::require_positive("amount", amount_minor)?;

    let mut tx = pool.begin().await?;

    let payment =
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE reference = $1 FOR UPDATE")
            .bind(reference)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Payment"))?;

    match payment.status {
        PaymentRecordStatus::Completed => {
            let booking = fetch_booking(&mut *tx, payment.booking_id).await?;
            tx.rollback().await?;
            tracing::debug!(reference, "payment already recorded");
            return Ok(RecordedPayment {
                payment,
                booking,
                overpaid_minor: 0,
                already_recorded: true,
            });
        }
        PaymentRecordStatus::Failed => {
            tx.rollback().await?;
            tracing::warn!(
                reference,
                amount_minor,
                "gateway reports success for a failed payment; manual reconciliation required"
            );
            return Err(AppError::InvalidState(
                "Payment was already marked failed".to_string(),
            ));
        }
        PaymentRecordStatus::Pending => {}
    }

    let booking =
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(payment.booking_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Booking"))?;

    let update = booking.apply_payment(amount_minor);
    if update.needs_reconciliation() {
        tracing::warn!(
            reference,
            booking_id = %booking.id,
            overpaid_minor = update.overpaid_minor,
            "payment exceeds amount due; booking flagged for reconciliation"
        );
    }

    let booking = sqlx::query_as::<_, Booking>(
        r#"
        UPDATE bookings
        SET amount_paid_minor = $1,
            amount_due_minor = $2,
            payment_status = $3,
            needs_reconciliation = needs_reconciliation OR $4,
            updated_at = NOW()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(update.amount_paid_minor)
    .bind(update.amount_due_minor)
    .bind(update.payment_status)
    .bind(update.needs_reconciliation())
    .bind(booking.id)
    .fetch_one(&mut *tx)
    .await?;

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        UPDATE payments
        SET status = 'completed',
            amount_minor = $1,
            completed_at = NOW()
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(amount_minor)
    .bind(payment.id)
    .fetch_one(&mut *tx)
    .await?;

    let organizer_id: Uuid = sqlx::query_scalar(
        r#"
        UPDATE events
        SET collection_balance_minor = collection_balance_minor + $1,
            updated_at = NOW()
        WHERE id = $2
        RETURNING organizer_id
        "#,
    )
    .bind(amount_minor)
    .bind(payment.event_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Event"))?;

    tx.commit().await?;

    tracing::info!(
        reference,
        booking_id = %booking.id,
        amount_minor,
        payment_status = ?booking.payment_status,
        "payment recorded"
    );

    feed.publish(SettlementUpdate {
        organizer_id,
        event_id: payment.event_id,
        kind: SettlementKind::Payment,
        id: payment.id,
        status: "completed".to_string(),
        amount_minor,
    });

    Ok(RecordedPayment {
        payment,
        booking,
        overpaid_minor: update.overpaid_minor,
        already_recorded: false,
    })
}

/// Ask the gateway about a payment and bring the local record up to date.
///
/// - `success` → the payment is recorded into the ledger
/// - `failed` / `abandoned` / `reversed` → a pending payment is marked failed
/// - anything else → nothing changes yet
pub async fn confirm_payment(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    feed: &SettlementFeed,
    currency: &str,
    auth: &AuthContext,
    reference: &str,
) -> Result<PaymentConfirmation, AppError> {
    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE reference = $1")
        .bind(reference)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Payment"))?;
    // Visibility check goes through the booking
    get_booking(pool, auth, payment.booking_id).await?;

    let verification = gateway.verify_transaction(reference).await?;
    ensure_currency(
        &verification.reference,
        verification.currency.as_deref(),
        currency,
    )?;

    if verification.is_successful() {
        let recorded = record_payment(pool, feed, reference, verification.amount).await?;
        return Ok(PaymentConfirmation {
            payment: recorded.payment,
            booking: Some(recorded.booking),
            gateway_status: verification.status,
        });
    }

    if verification.is_failed() {
        let failed = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = 'failed'
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .fetch_optional(pool)
        .await?;

        if let Some(failed) = failed {
            tracing::info!(reference, gateway_status = %verification.status, "payment failed");
            let organizer_id = event_service::fetch_event(pool, failed.event_id)
                .await?
                .organizer_id;
            feed.publish(SettlementUpdate {
                organizer_id,
                event_id: failed.event_id,
                kind: SettlementKind::Payment,
                id: failed.id,
                status: "failed".to_string(),
                amount_minor: failed.amount_minor,
            });
            return Ok(PaymentConfirmation {
                payment: failed,
                booking: None,
                gateway_status: verification.status,
            });
        }
    }

    Ok(PaymentConfirmation {
        payment,
        booking: None,
        gateway_status: verification.status,
    })
}

/// Refuse a charge made in another currency than the platform's.
///
/// A charge that does not name its currency is accepted.
pub fn ensure_currency(
    reference: &str,
    charged: Option<&str>,
    expected: &str,
) -> Result<(), AppError> {
    match charged {
        Some(charged) if !charged.eq_ignore_ascii_case(expected) => {
            tracing::warn!(reference, charged, expected, "payment charged in unexpected currency");
            Err(AppError::InvalidState(format!(
                "Payment was charged in {charged}, expected {expected}"
            )))
        }
        _ => Ok(()),
    }
}

/// Gateway's view of a payment the caller can see, returned verbatim.
///
/// The payment must exist locally and belong to a booking visible to the
/// caller. Nothing is changed.
pub async fn verify_payment(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    auth: &AuthContext,
    reference: &str,
) -> Result<TransactionVerification, AppError> {
    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE reference = $1")
        .bind(reference)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Payment"))?;
    get_booking(pool, auth, payment.booking_id).await?;

    Ok(gateway.verify_transaction(reference).await?)
}
