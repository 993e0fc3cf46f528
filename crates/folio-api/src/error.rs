//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use folio_core::CoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] folio_storage::StorageError),

    #[error("Upstream error: {0}")]
    Proxy(#[from] folio_proxy::ProxyError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
            ApiError::Core(e) => match e {
                CoreError::InvalidMessage(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_MESSAGE", msg.clone())
                }
                CoreError::InvalidState(msg) => (StatusCode::CONFLICT, "INVALID_STATE", msg.clone()),
                CoreError::Install(msg) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "INSTALL_FAILED", msg.clone())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    e.to_string(),
                ),
            },
            ApiError::Storage(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                e.to_string(),
            ),
            ApiError::Proxy(e) => match e {
                folio_proxy::ProxyError::InvalidUrl { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_URL", e.to_string())
                }
                _ => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string()),
            },
        };

        let body = axum::Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
            (
                ApiError::Core(CoreError::InvalidState("busy".to_string())),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Core(CoreError::Install("offline".to_string())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::Proxy(folio_proxy::ProxyError::Unavailable("down".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (ApiError::Internal("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
