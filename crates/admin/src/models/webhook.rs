//! Webhook idempotency ledger records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use vitrine_core::{ErpId, WebhookEventRowId, WebhookStatus};

/// A row in the `webhook_events` ledger.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WebhookEventRecord {
    pub id: WebhookEventRowId,
    /// Provider event id. Unique.
    pub event_id: String,
    pub event_type: String,
    pub external_product_id: Option<ErpId>,
    pub payload: serde_json::Value,
    pub status: WebhookStatus,
    pub last_error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Parameters for claiming an event in the ledger.
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub external_product_id: Option<ErpId>,
    pub payload: serde_json::Value,
}
