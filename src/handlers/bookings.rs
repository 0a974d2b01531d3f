//! Booking HTTP handlers.
//!
//! - POST /api/v1/events/{id}/bookings - Book spaces on an event
//! - GET /api/v1/events/{id}/bookings - List an event's bookings
//! - GET /api/v1/bookings/{id} - Get a booking and its ledger

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::booking::{Booking, CreateBookingRequest},
    response::ApiResponse,
    services::ledger_service,
    state::AppState,
};

/// Book `quantity` spaces.
///
/// The booking starts `unpaid` with `amount_due = quantity * price`.
///
/// # Response
///
/// - **201**: the booking
/// - **409**: not enough spaces left
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<ApiResponse<Booking>, AppError> {
    let booking =
        ledger_service::create_booking(&state.pool, &auth, event_id, request.quantity).await?;
    Ok(ApiResponse::created("Booking created", booking))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(event_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<Booking>>, AppError> {
    let bookings = ledger_service::list_event_bookings(&state.pool, &auth, event_id).await?;
    Ok(ApiResponse::ok("Bookings retrieved", bookings))
}

/// Returns 404 both when the booking does not exist and when the caller
/// neither owns it nor manages its event.
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<ApiResponse<Booking>, AppError> {
    let booking = ledger_service::get_booking(&state.pool, &auth, booking_id).await?;
    Ok(ApiResponse::ok("Booking retrieved", booking))
}
