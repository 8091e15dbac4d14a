//! Webhook idempotency ledger.
//!
//! A row is inserted before an event is processed. The unique `event_id`
//! index turns a redelivery into `RepositoryError::Conflict`, which callers
//! treat as "already handled".

use sqlx::PgPool;

use vitrine_core::{WebhookEventRowId, WebhookStatus};

use super::{RepositoryError, conflict_or_database};
use crate::models::{NewWebhookEvent, WebhookEventRecord};

/// Repository for the webhook event ledger.
pub struct WebhookEventRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WebhookEventRepository<'a> {
    /// Create a new webhook event repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an event as `processing`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the event id was seen before.
    pub async fn insert(
        &self,
        event: &NewWebhookEvent,
    ) -> Result<WebhookEventRecord, RepositoryError> {
        sqlx::query_as::<_, WebhookEventRecord>(
            r"
            INSERT INTO webhook_events (event_id, event_type, external_product_id, payload, status)
            VALUES ($1, $2, $3, $4, 'processing')
            RETURNING id, event_id, event_type, external_product_id, payload, status,
                      last_error, received_at, processed_at
            ",
        )
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(event.external_product_id)
        .bind(&event.payload)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "webhook event"))
    }

    /// Move an event to its terminal status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn finish(
        &self,
        id: WebhookEventRowId,
        status: WebhookStatus,
        last_error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE webhook_events
            SET status = $2, last_error = $3, processed_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status)
        .bind(last_error)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
