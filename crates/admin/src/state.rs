//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::SecretString;
use sqlx::PgPool;

use crate::config::{AdminConfig, SyncConfig, WebhookConfig};
use crate::db::{PgCatalogStore, PgTokenStore};
use crate::erp::{ErpClient, ErpError};
use crate::storage::HttpBlobStore;
use crate::sync::{SyncEngine, SyncRunner};
use crate::webhooks::WebhookProcessor;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    runner: SyncRunner,
    webhooks: WebhookProcessor,
    trigger_token: SecretString,
}

impl AppState {
    /// Wire the production ERP client, blob store and database store.
    ///
    /// # Errors
    ///
    /// Returns `ErpError` if the ERP client cannot be built from the
    /// configuration.
    pub fn new(config: &AdminConfig, pool: PgPool) -> Result<Self, ErpError> {
        let tokens = Arc::new(PgTokenStore::new(pool.clone()));
        let source = Arc::new(ErpClient::new(config.erp.clone(), Some(tokens))?);
        let blobs = Arc::new(HttpBlobStore::new(config.blob.clone()));
        let store = Arc::new(PgCatalogStore::new(pool));

        let engine = SyncEngine::new(source, store, blobs);
        Ok(Self::from_engine(engine, &config.sync, config.webhook.clone()))
    }

    /// State around an already built engine.
    #[must_use]
    pub fn from_engine(engine: SyncEngine, sync: &SyncConfig, webhook: WebhookConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                runner: SyncRunner::new(engine.clone(), sync.log_cap),
                webhooks: WebhookProcessor::new(engine, webhook),
                trigger_token: sync.trigger_token.clone(),
            }),
        }
    }

    #[must_use]
    pub fn runner(&self) -> &SyncRunner {
        &self.inner.runner
    }

    #[must_use]
    pub fn webhooks(&self) -> &WebhookProcessor {
        &self.inner.webhooks
    }

    /// Bearer token expected on `POST /sync`.
    #[must_use]
    pub fn trigger_token(&self) -> &SecretString {
        &self.inner.trigger_token
    }

    #[must_use]
    pub fn engine(&self) -> &SyncEngine {
        self.inner.runner.engine()
    }
}
