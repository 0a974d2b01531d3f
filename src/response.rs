//! Success envelope shared by every JSON endpoint.
//!
//! Errors use the same `status`/`message` keys (see [`crate::error::AppError`]),
//! so clients can branch on `status` alone.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// `{"status": true, "message": "...", "data": ...}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: bool,
    pub message: String,
    pub data: T,
    #[serde(skip)]
    http_status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: true,
            message: message.into(),
            data,
            http_status: StatusCode::OK,
        }
    }

    /// Same envelope with `201 Created`.
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            http_status: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.http_status;
        (status, Json(self)).into_response()
    }
}
