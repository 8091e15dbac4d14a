//! ERP webhook receiver.

use axum::{Json, Router, body::Bytes, extract::State, http::HeaderMap, routing::post};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;
use crate::webhooks::{SIGNATURE_HEADER, WebhookAck};

/// Largest accepted delivery. Legacy batches carry a few hundred entries.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Create webhook routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/erp", post(receive))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}

/// Verify, record and apply an ERP event delivery.
///
/// The raw body is kept for signature verification. Per-event failures are
/// reported inside the ack with a 200 so the ERP does not redeliver them.
#[instrument(skip(state, headers, body), fields(bytes = body.len()))]
async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let ack = state.webhooks().handle(signature, &body).await?;
    Ok(Json(ack))
}
