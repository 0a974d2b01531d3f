//! Admin-only reporting.

use axum::{Extension, extract::State};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    response::ApiResponse,
    services::stats_service::{self, PlatformStats},
    state::AppState,
};

/// `GET /api/v1/admin/stats`
pub async fn platform_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<ApiResponse<PlatformStats>, AppError> {
    let stats = stats_service::platform_stats(&state.pool, &auth).await?;
    Ok(ApiResponse::ok("Stats retrieved", stats))
}
