//! API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::json;
use tracing::error;
use ts_rs::TS;

use crate::football::FootballApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ApiErrorCode {
    InvalidParams,
    UpstreamFailed,
    NotConfigured,
    Internal,
}

impl ApiErrorCode {
    fn status(self) -> StatusCode {
        match self {
            Self::InvalidParams => StatusCode::BAD_REQUEST,
            Self::UpstreamFailed => StatusCode::BAD_GATEWAY,
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    code: ApiErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.code.status(),
            Json(json!({"error": self.code, "message": self.message})),
        )
            .into_response()
    }
}

/// Map an upstream client failure to an API error, logging the context.
/// A missing API key is an operator problem, not a client one.
pub fn upstream_error(context: &str, e: FootballApiError) -> ApiError {
    error!(error = %e, "{context} failed");
    match e {
        FootballApiError::MissingApiKey => ApiError::new(
            ApiErrorCode::NotConfigured,
            "Upstream API key is not configured",
        ),
        other => ApiError::new(ApiErrorCode::UpstreamFailed, other.to_string()),
    }
}

/// Map a database failure to an opaque internal error, logging the context.
pub fn db_error(context: &str, e: sqlx::Error) -> ApiError {
    error!(error = %e, "{context} failed");
    ApiError::new(ApiErrorCode::Internal, "Internal error")
}
