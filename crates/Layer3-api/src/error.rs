//! API error responses
//!
//! Errors render as `{"detail": "..."}`. Task routes report unknown ids and refused
//! transitions alike as 404; execution routes report refused transitions as 400.

use agentpod_foundation::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Mapping for the execution routes
    pub fn for_execution(err: Error) -> Self {
        match err {
            Error::InvalidTransition { .. } => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            other => other.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::NotFound { .. } | Error::InvalidTransition { .. } => StatusCode::NOT_FOUND,
            Error::Config(_) | Error::InvalidInput(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = if err.is_user_facing() || status != StatusCode::INTERNAL_SERVER_ERROR {
            err.to_string()
        } else {
            error!("Request failed: {}", err);
            "Internal server error".to_string()
        };
        Self::new(status, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
