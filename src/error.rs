//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::gateway::GatewayError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Validation Errors**: missing or invalid amounts and account fields
/// - **Gateway Rejections**: the gateway refused the call; its message is surfaced verbatim
/// - **Resource Errors**: requested event, booking, payment or request not found
/// - **Unexpected Errors**: database and network failures, reported generically
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Inbound gateway webhook did not carry a valid signature.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Caller is authenticated but may not act on this resource.
    #[error("You are not allowed to perform this action")]
    Forbidden,

    /// The named resource does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The resource exists but is not in a state that allows the operation.
    #[error("{0}")]
    InvalidState(String),

    /// Requested withdrawal exceeds the event's available collection balance.
    #[error("Withdrawal amount exceeds available balance")]
    InsufficientBalance,

    /// Request body or parameters are invalid.
    #[error("{0}")]
    InvalidRequest(String),

    /// The gateway rejected the call.
    #[error("{0}")]
    Gateway(String),

    /// The gateway could not be reached or answered with garbage.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected(message) => AppError::Gateway(message),
            GatewayError::Transport(message) => AppError::GatewayUnavailable(message),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "status": false,
///   "message": "Human-readable error message",
///   "code": "error_type"
/// }
/// ```
///
/// Database and transport failures are logged here and replaced by a
/// generic message; nothing internal reaches the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                self.to_string(),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::InvalidState(ref msg) => (StatusCode::CONFLICT, "invalid_state", msg.clone()),
            AppError::InsufficientBalance => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_balance",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Gateway(ref msg) => {
                tracing::warn!(message = %msg, "gateway rejected request");
                (StatusCode::BAD_GATEWAY, "gateway_rejected", msg.clone())
            }
            AppError::GatewayUnavailable(ref detail) => {
                tracing::error!(detail = %detail, "gateway call failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "gateway_unavailable",
                    "Payment gateway is unavailable, please try again later".to_string(),
                )
            }
            AppError::Database(ref err) => {
                tracing::error!(error = ?err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "status": false,
            "message": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn insufficient_balance_maps_to_422() {
        let response = AppError::InsufficientBalance.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["status"], false);
        assert_eq!(body["code"], "insufficient_balance");
        assert_eq!(
            body["message"],
            "Withdrawal amount exceeds available balance"
        );
    }

    #[tokio::test]
    async fn gateway_rejection_is_surfaced_verbatim() {
        let err: AppError = GatewayError::Rejected("Invalid account details".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid account details");
    }

    #[tokio::test]
    async fn transport_failures_are_hidden() {
        let err: AppError = GatewayError::Transport("connection reset by peer".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert!(!body["message"].as_str().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn not_found_names_the_resource() {
        let response = AppError::NotFound("Booking").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Booking not found");
    }
}
