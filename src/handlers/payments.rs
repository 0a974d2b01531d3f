//! Payment HTTP handlers.
//!
//! - POST /api/v1/bookings/{id}/payments - Open a gateway checkout
//! - POST /api/v1/payments/{reference}/confirm - Reconcile with the gateway
//! - GET /api/v1/payments/{reference}/verify - Gateway's view, unchanged

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    gateway::TransactionVerification,
    middleware::auth::AuthContext,
    models::payment::{InitiatePaymentRequest, PaymentCheckout, validate_reference},
    response::ApiResponse,
    services::ledger_service::{self, PaymentConfirmation},
    state::AppState,
};

/// Open a checkout for part or all of a booking's amount due.
///
/// # Request Body
///
/// ```json
/// { "amount_minor": 1000000, "email": "guest@example.com" }
/// ```
///
/// # Response (201)
///
/// The pending payment with the gateway's `authorization_url` to redirect
/// the customer to.
pub async fn initiate_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<ApiResponse<PaymentCheckout>, AppError> {
    let checkout = ledger_service::initiate_payment(
        &state.pool,
        state.gateway.as_ref(),
        &state.currency,
        &auth,
        booking_id,
        request,
    )
    .await?;
    Ok(ApiResponse::created("Checkout initialized", checkout))
}

/// Ask the gateway for the payment's outcome and apply it locally.
///
/// Safe to call repeatedly, and safe to race with the `charge.success`
/// webhook: a payment is recorded into the ledger once.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(reference): Path<String>,
) -> Result<ApiResponse<PaymentConfirmation>, AppError> {
    validate_reference(&reference)?;
    let confirmation = ledger_service::confirm_payment(
        &state.pool,
        state.gateway.as_ref(),
        &state.feed,
        &state.currency,
        &auth,
        &reference,
    )
    .await?;
    Ok(ApiResponse::ok("Payment confirmed", confirmation))
}

/// Gateway's view of one of the caller's payments. Nothing changes locally.
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(reference): Path<String>,
) -> Result<ApiResponse<TransactionVerification>, AppError> {
    validate_reference(&reference)?;
    let verification =
        ledger_service::verify_payment(&state.pool, state.gateway.as_ref(), &auth, &reference)
            .await?;
    Ok(ApiResponse::ok("Verification successful", verification))
}
