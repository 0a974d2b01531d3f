//! Inbound gateway webhook.
//!
//! `POST /api/v1/gateway/webhook` is not behind API-key auth; the HMAC
//! signature over the raw body authenticates the gateway instead, so the
//! body is taken as bytes and parsed only after the signature checks out.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
};

use crate::{
    error::AppError,
    response::ApiResponse,
    services::webhook_service::{self, SIGNATURE_HEADER, WebhookOutcome},
    state::AppState,
};

/// # Response
///
/// - **200**: accepted (`processed`, `duplicate` or `ignored`)
/// - **401**: missing or wrong signature
/// - **500/503**: not applied; the gateway should redeliver
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<WebhookOutcome>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = webhook_service::handle_webhook(
        &state.pool,
        &state.feed,
        &state.webhook_secret,
        &state.currency,
        signature,
        &body,
    )
    .await?;

    Ok(ApiResponse::ok("Webhook received", outcome))
}
