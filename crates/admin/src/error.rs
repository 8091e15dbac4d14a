//! Unified error handling for admin.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::sync::SyncError;
use crate::webhooks::WebhookError;

/// Application-level error type for the admin service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Sync request failed as a whole.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Webhook delivery rejected.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for the error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Webhook(e) => match e {
                WebhookError::InvalidSignature(_) | WebhookError::SecretNotConfigured => {
                    StatusCode::UNAUTHORIZED
                }
                WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                WebhookError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Sync(e) => match e {
                SyncError::Policy(_) => StatusCode::CONFLICT,
                SyncError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                SyncError::MissingRecord(_) => StatusCode::NOT_FOUND,
                SyncError::Erp(_) | SyncError::Blob(_) => StatusCode::BAD_GATEWAY,
                SyncError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::BAD_GATEWAY => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
