//! Sync trigger endpoint.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
    routing::post,
};
use secrecy::ExposeSecret;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::state::AppState;
use crate::sync::{SyncRequest, SyncSummary};
use crate::webhooks::signature::constant_time_compare;

/// Create sync routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/sync", post(trigger_sync))
}

/// Run one sync action and return its summary.
///
/// Requires `Authorization: Bearer <SYNC_TRIGGER_TOKEN>`. Long catalogs are
/// walked by calling again with the returned `nextOffset`.
#[instrument(skip(state, headers, request), fields(action = %request.action))]
async fn trigger_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncSummary>, AppError> {
    authorize(&headers, state.trigger_token().expose_secret())?;

    let summary = state.runner().run(&request).await?;

    info!(
        processed = summary.processed,
        errors = summary.errors,
        next_offset = ?summary.next_offset,
        "Sync request finished"
    );
    Ok(Json(summary))
}

fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    if !constant_time_compare(provided.trim(), expected) {
        return Err(AppError::Unauthorized("invalid bearer token".into()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_authorize() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            authorize(&headers, "tok_9f8e7d"),
            Err(AppError::Unauthorized(_))
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer wrong"));
        assert!(authorize(&headers, "tok_9f8e7d").is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok_9f8e7d"));
        assert!(authorize(&headers, "tok_9f8e7d").is_ok());
    }

    #[test]
    fn test_authorize_requires_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("tok_9f8e7d"));
        assert!(authorize(&headers, "tok_9f8e7d").is_err());
    }
}
