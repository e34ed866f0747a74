//! HTTP-facing error taxonomy.
//!
//! Validation and not-found conditions are ordinary values here; collaborator
//! failures are folded into `Upstream` / `Timeout` at the call site.

use std::{future::Future, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{operation} failed: {message}")]
    Upstream {
        operation: &'static str,
        message: String,
    },

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    pub fn upstream(operation: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::Upstream {
            operation,
            message: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::InvalidQuery(msg) => AppError::Validation(msg),
            StoreError::Database(e) => AppError::upstream("document store", e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // upstream detail stays in the logs
            AppError::Upstream { operation, .. } => format!("{operation} unavailable"),
            AppError::Configuration(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Runs a collaborator call under a deadline, mapping expiry to `Timeout`.
pub async fn with_deadline<T, E, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<AppError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(Into::into),
        Err(_) => {
            tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "upstream call timed out");
            Err(AppError::Timeout(operation))
        }
    }
}
