//! Settlement long-poll.
//!
//! `GET /api/v1/settlements/next?timeout_secs=25` waits for the next
//! payment, withdrawal or refund transition on the caller's events (every
//! event for admins). Only updates published after the request arrives are
//! seen; a client loops on this endpoint to follow the stream.

use std::time::Duration;

use axum::{
    Extension,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::{
    error::AppError, feed::SettlementUpdate, middleware::auth::AuthContext,
    response::ApiResponse, state::AppState,
};

const DEFAULT_WAIT_SECS: u64 = 25;
const MAX_WAIT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub timeout_secs: Option<u64>,
}

impl NextQuery {
    fn wait(&self) -> Duration {
        Duration::from_secs(
            self.timeout_secs
                .unwrap_or(DEFAULT_WAIT_SECS)
                .clamp(1, MAX_WAIT_SECS),
        )
    }
}

/// `data` is `null` when nothing happened before the timeout.
pub async fn next_update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<NextQuery>,
) -> Result<ApiResponse<Option<SettlementUpdate>>, AppError> {
    auth.require_organizer()?;

    let scope = if auth.is_admin() {
        None
    } else {
        Some(auth.user_id)
    };
    let mut subscription = state.feed.subscribe(scope);

    match tokio::time::timeout(query.wait(), subscription.next()).await {
        Ok(Some(update)) => Ok(ApiResponse::ok("Settlement update", Some(update))),
        Ok(None) | Err(_) => Ok(ApiResponse::ok("No settlement update", None)),
    }
}
