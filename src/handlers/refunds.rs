//! Refund HTTP handlers.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::refund::{CreateRefundRequest, RefundRequest},
    response::ApiResponse,
    services::refund_service,
    state::AppState,
};

/// `POST /api/v1/refunds`
///
/// ```json
/// { "payment_id": "770e8400-...", "amount_minor": 5000, "reason": "Cancelled" }
/// ```
pub async fn create_refund(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateRefundRequest>,
) -> Result<ApiResponse<RefundRequest>, AppError> {
    let refund =
        refund_service::create_refund_request(&state.pool, &state.feed, &auth, request).await?;
    Ok(ApiResponse::created("Refund request created", refund))
}

pub async fn list_refunds(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(event_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<RefundRequest>>, AppError> {
    let refunds = refund_service::list_refunds(&state.pool, &auth, event_id).await?;
    Ok(ApiResponse::ok("Refunds retrieved", refunds))
}

/// `POST /api/v1/refunds/{id}/approve`
///
/// A gateway rejection answers `502` and leaves the request `pending`.
pub async fn approve_refund(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(refund_id): Path<Uuid>,
) -> Result<ApiResponse<RefundRequest>, AppError> {
    let refund = refund_service::approve_refund(
        &state.pool,
        state.gateway.as_ref(),
        &state.feed,
        &auth,
        refund_id,
    )
    .await?;
    Ok(ApiResponse::ok("Refund approved", refund))
}
