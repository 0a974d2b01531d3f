//! Withdrawal HTTP handlers.
//!
//! - POST /api/v1/withdrawals - File a withdrawal from an event balance
//! - GET /api/v1/withdrawals - List the caller's withdrawals
//! - POST /api/v1/withdrawals/{id}/process - Pay a withdrawal out (admin)

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::withdrawal::{CreateWithdrawalRequest, WithdrawalRequest},
    response::ApiResponse,
    services::withdrawal_service,
    state::AppState,
};

/// File a withdrawal.
///
/// # Request Body
///
/// ```json
/// { "event_id": "550e8400-...", "amount_minor": 100000 }
/// ```
///
/// # Response
///
/// - **201**: the `pending` request with its fee and net amount
/// - **422**: amount exceeds the event's available balance
/// - **409**: the event is not paid out by the platform, or has no account
pub async fn create_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<ApiResponse<WithdrawalRequest>, AppError> {
    let withdrawal = withdrawal_service::create_withdrawal_request(
        &state.pool,
        &state.fees,
        &state.feed,
        &auth,
        request,
    )
    .await?;
    Ok(ApiResponse::created("Withdrawal request created", withdrawal))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<ApiResponse<Vec<WithdrawalRequest>>, AppError> {
    let withdrawals = withdrawal_service::list_withdrawals(&state.pool, &auth).await?;
    Ok(ApiResponse::ok("Withdrawals retrieved", withdrawals))
}

/// Run the payout: validate account, create recipient, initiate transfer.
///
/// On a gateway timeout at the transfer step the request stays
/// `processing` and the transfer webhook settles it.
pub async fn process_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(withdrawal_id): Path<Uuid>,
) -> Result<ApiResponse<WithdrawalRequest>, AppError> {
    let withdrawal = withdrawal_service::process_withdrawal(
        &state.pool,
        state.gateway.as_ref(),
        &state.currency,
        &state.feed,
        &auth,
        withdrawal_id,
    )
    .await?;
    Ok(ApiResponse::ok("Withdrawal processed", withdrawal))
}
