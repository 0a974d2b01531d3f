//! Event HTTP handlers.
//!
//! - POST /api/v1/events - Create an event
//! - GET /api/v1/events/{id} - Get an event
//! - PUT /api/v1/events/{id}/account - Set the payout account
//! - GET /api/v1/events/{id}/balance - Collection balance and held funds

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::event::{AccountDetails, CreateEventRequest, Event, EventBalance},
    response::ApiResponse,
    services::event_service,
    state::AppState,
};

/// Create an event owned by the caller.
///
/// # Request Body
///
/// ```json
/// {
///   "title": "Lake Naivasha Weekend",
///   "price_minor": 1500000,
///   "total_spaces": 40,
///   "payment_management": "platform",
///   "account_details": { "bank_code": "68", "account_number": "0123456789" }
/// }
/// ```
///
/// # Response
///
/// - **201**: the created event
/// - **403**: caller is not an organizer
/// - **502**: the gateway could not resolve the payout account
pub async fn create_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateEventRequest>,
) -> Result<ApiResponse<Event>, AppError> {
    let event = event_service::create_event(&state.pool, state.gateway.as_ref(), &auth, request)
        .await?;
    Ok(ApiResponse::created("Event created", event))
}

pub async fn get_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(event_id): Path<Uuid>,
) -> Result<ApiResponse<Event>, AppError> {
    let event = event_service::get_event(&state.pool, &auth, event_id).await?;
    Ok(ApiResponse::ok("Event retrieved", event))
}

/// Replace the payout account of an event.
///
/// The account is resolved with the gateway before it is stored; a
/// rejection answers `502` with "Invalid account details".
pub async fn set_account_details(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(event_id): Path<Uuid>,
    Json(details): Json<AccountDetails>,
) -> Result<ApiResponse<Event>, AppError> {
    let event = event_service::set_account_details(
        &state.pool,
        state.gateway.as_ref(),
        &auth,
        event_id,
        details,
    )
    .await?;
    Ok(ApiResponse::ok("Payout account updated", event))
}

/// # Response (200 OK)
///
/// ```json
/// {
///   "status": true,
///   "message": "Balance retrieved",
///   "data": {
///     "event_id": "...",
///     "collection_balance_minor": 300000,
///     "held_minor": 100000,
///     "available_minor": 200000
///   }
/// }
/// ```
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(event_id): Path<Uuid>,
) -> Result<ApiResponse<EventBalance>, AppError> {
    let balance = event_service::event_balance(&state.pool, &auth, event_id).await?;
    Ok(ApiResponse::ok("Balance retrieved", balance))
}
