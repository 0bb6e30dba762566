//! Error handling module for the sync agent.
//!
//! Provides centralized error types with mapping to HTTP status codes and
//! JSON response envelopes served by the local HTTP surfaces.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
#[allow(dead_code)]
pub mod codes {
    pub const OFFLINE: &str = "OFFLINE";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const CACHE_ERROR: &str = "CACHE_ERROR";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// No connection and no cached data to fall back on
    Offline(String),
    /// Pending-queue persistence error
    Storage(String),
    /// Cache storage error
    Cache(String),
    /// Upstream (backend) request error
    Upstream(String),
    /// Bad request
    BadRequest(String),
    /// Internal error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Offline(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Offline(_) => codes::OFFLINE,
            AppError::Storage(_) => codes::STORAGE_ERROR,
            AppError::Cache(_) => codes::CACHE_ERROR,
            AppError::Upstream(_) => codes::UPSTREAM_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Offline(msg)
            | AppError::Storage(msg)
            | AppError::Cache(msg)
            | AppError::Upstream(msg)
            | AppError::BadRequest(msg)
            | AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Cache storage error: {:?}", err);
        AppError::Cache(format!("Cache storage error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(format!("Upstream request failed: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!("I/O error: {:?}", err);
        AppError::Storage(format!("I/O error: {}", err))
    }
}

/// Error response envelope served by the gateway and the cache worker.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub offline: bool,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            error: match error {
                // Fixed contract string the frontend matches on
                AppError::Offline(_) => "Offline".to_string(),
                _ => error.error_code().to_string(),
            },
            message: error.message(),
            offline: matches!(error, AppError::Offline(_)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_maps_to_503_contract() {
        let err = AppError::Offline("No connection and no cached data".to_string());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let body = serde_json::to_value(ErrorResponse::new(&err)).unwrap();
        assert_eq!(body["error"], "Offline");
        assert_eq!(body["offline"], true);
    }

    #[test]
    fn test_non_offline_errors_omit_flag() {
        let err = AppError::Upstream("boom".to_string());
        let body = serde_json::to_value(ErrorResponse::new(&err)).unwrap();
        assert_eq!(body["error"], "UPSTREAM_ERROR");
        assert!(body.get("offline").is_none());
    }
}
