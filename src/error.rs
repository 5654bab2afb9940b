//! Error types for the service layer
//!
//! Errors are classified by recoverability:
//! - Retryable: rate limits, gateway outages, transport failures
//! - NonRetryable: validation, missing rows, permission and state conflicts
//! - RequiresUserAction: missing API key, exhausted AI credits

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::config::ConfigError;
use crate::db::DbError;
use crate::intelligence::CompletionError;

/// Error type for every operation behind the HTTP surface
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Only HR managers can review flags")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

impl ServiceError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Completion(
                CompletionError::RateLimited
                    | CompletionError::Transport(_)
                    | CompletionError::Upstream { .. }
            )
        )
    }

    /// Returns true if this error requires operator action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            ServiceError::Completion(CompletionError::NotConfigured | CompletionError::QuotaExhausted)
                | ServiceError::Config(_)
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "Fix the highlighted fields and submit again.",
            ServiceError::NotFound(_) => "Check the id and try again.",
            ServiceError::Forbidden => "Ask an HR manager to review this flag.",
            ServiceError::Conflict(_) => "Refresh and try again.",
            ServiceError::Completion(CompletionError::NotConfigured) => {
                "Set AI_GATEWAY_API_KEY and restart the server."
            }
            ServiceError::Completion(CompletionError::RateLimited) => {
                "Wait a few minutes and try again."
            }
            ServiceError::Completion(CompletionError::QuotaExhausted) => {
                "Add AI credits to the gateway workspace."
            }
            ServiceError::Completion(_) => "The AI gateway is unavailable. Try again later.",
            ServiceError::Db(_) => "Check the database file permissions and disk space.",
            ServiceError::Config(_) => "Check the PULSECHECK_* and AI_GATEWAY_* variables.",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Completion(CompletionError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Completion(CompletionError::QuotaExhausted) => {
                StatusCode::PAYMENT_REQUIRED
            }
            ServiceError::Completion(_) | ServiceError::Db(_) | ServiceError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Serializable error body: `{"error": "..."}` plus retry hints.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

impl From<&ServiceError> for ErrorBody {
    fn from(err: &ServiceError) -> Self {
        let error = match err {
            // Storage details stay in the log.
            ServiceError::Db(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        ErrorBody {
            error,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}
