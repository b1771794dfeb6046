//! Unified error envelope and `ApiError` type.
//!
//! Success bodies are the typed responses themselves (§6) -- there is no
//! success envelope. Only failures are wrapped, in the fixed shape
//! `{success:false, error:{code, message}, request_id}`. `request_id` is
//! filled in by `gateway::middleware::request_context` after the handler
//! returns, not by the handler itself, so `ApiError` doesn't need to know
//! about the current request.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub mod error_codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const MISSING_API_KEY: &str = "MISSING_API_KEY";
    pub const INVALID_API_KEY: &str = "INVALID_API_KEY";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Matches spec §6's global error envelope. `request_id` starts empty and
/// is populated by the outermost middleware layer.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
    pub request_id: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            error_codes::VALIDATION_ERROR,
            message,
        )
    }

    pub fn missing_api_key() -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            error_codes::MISSING_API_KEY,
            "missing X-API-Key header",
        )
    }

    pub fn invalid_api_key() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            error_codes::INVALID_API_KEY,
            "invalid API key",
        )
    }

    pub fn rate_limited(window_seconds: u64) -> Self {
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            error_codes::RATE_LIMITED,
            "rate limit exceeded",
        );
        err.retry_after = Some(window_seconds);
        err
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, message)
    }

    /// Maps an engine business error (`success: false`) per §7: order
    /// placement failures surface as 400, get/cancel-on-missing as 404,
    /// anything else as 500 -- the caller picks the status, this just
    /// carries the engine's own code/message through unchanged.
    pub fn engine_business(status: StatusCode, code: String, message: String) -> Self {
        Self {
            status,
            code,
            message,
            retry_after: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            message,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: self.code,
                message: self.message,
            },
            request_id: String::new(),
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}
