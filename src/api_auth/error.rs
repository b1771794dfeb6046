//! Authentication failures (C6), expressed as `ApiError` conversions so the
//! auth layer and the rest of the gateway share one error envelope.

use crate::gateway::types::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// `X-API-Key` absent entirely -- treated as a validation failure per
    /// spec §4.6, not a 401.
    MissingKey,
    /// `X-API-Key` present but not in the configured key set.
    InvalidKey,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingKey => ApiError::missing_api_key(),
            AuthError::InvalidKey => ApiError::invalid_api_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn missing_key_maps_to_422() {
        let err: ApiError = AuthError::MissingKey.into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn invalid_key_maps_to_401() {
        let err: ApiError = AuthError::InvalidKey.into();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
