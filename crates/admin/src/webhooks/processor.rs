//! Idempotent dispatch of webhook events to the sync engine.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use vitrine_core::{ErpId, EventKind, ProductId, VariantId, WebhookStatus};

use super::signature::verify;
use super::{IncomingEvent, WebhookError, parse_events};
use crate::catalog::{ExternalListingItem, ProductGroup};
use crate::config::WebhookConfig;
use crate::erp::ProductDetail;
use crate::models::{CanonicalProduct, NewWebhookEvent, SyncPolicy};
use crate::sync::engine::product_update;
use crate::sync::stock::{StockApplied, fetch_available};
use crate::sync::variants::default_variant;
use crate::sync::{GroupReport, RunState, SyncEngine, SyncError};

/// Product fields a product webhook may overwrite regardless of the stored
/// policy. Names, descriptions and images are left to full syncs.
const WEBHOOK_FIELDS: SyncPolicy = SyncPolicy {
    sync_stock: true,
    sync_titles: false,
    sync_descriptions: false,
    sync_images: false,
    sync_prices: true,
    sync_dimensions: true,
    sync_sku_gtin: true,
    sync_variant_active: false,
    import_new_products: false,
    merge_by_sku: false,
    first_import_done: true,
};

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", content = "detail", rename_all = "snake_case")]
pub enum EventEffect {
    Stock(StockApplied),
    /// Product and its variants deactivated after an ERP deletion.
    Deactivated { product_id: ProductId },
    /// A single variation was deleted in the ERP.
    VariantDeactivated { variant_id: VariantId },
    /// Safe subset of product fields refreshed.
    Refreshed {
        product_id: ProductId,
        fields: bool,
        stock_updated: usize,
    },
    /// The product went through group reconciliation.
    Reconciled(GroupReport),
    /// The product is inactive locally.
    Inactive,
    /// Nothing local matches the event.
    NotFound,
    /// The event carries nothing this service acts on.
    Ignored { reason: String },
}

/// Result of one event in a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResult {
    pub event_id: String,
    pub kind: EventKind,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<EventEffect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ledger outcome of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Processed,
    Duplicate,
    Failed,
}

/// Response body of a webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: usize,
    pub processed: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub results: Vec<EventResult>,
}

impl WebhookAck {
    fn push(&mut self, result: EventResult) {
        match result.status {
            EventStatus::Processed => self.processed += 1,
            EventStatus::Duplicate => self.duplicates += 1,
            EventStatus::Failed => self.failed += 1,
        }
        self.results.push(result);
    }
}

/// Verifies, records and applies webhook deliveries.
#[derive(Clone)]
pub struct WebhookProcessor {
    engine: SyncEngine,
    config: WebhookConfig,
}

impl WebhookProcessor {
    #[must_use]
    pub const fn new(engine: SyncEngine, config: WebhookConfig) -> Self {
        Self { engine, config }
    }

    /// Verify the signature of a raw body.
    ///
    /// The configured secret takes precedence over the one stored with the
    /// ERP credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature is rejected or the stored secret
    /// cannot be read.
    pub async fn verify(&self, signature: Option<&str>, body: &[u8]) -> Result<(), WebhookError> {
        let stored = match &self.config.secret {
            Some(_) => None,
            None => self.engine.store().stored_webhook_secret().await?,
        };
        let secret = self.config.secret.as_ref().or(stored.as_ref());
        verify(secret, self.config.allow_unsigned, signature, body)
    }

    /// Verify, decode and process one delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the delivery is rejected as a whole. Failures of
    /// single events, including ledger failures, are reported in the ack.
    #[instrument(skip(self, signature, body), fields(bytes = body.len()))]
    pub async fn handle(&self, signature: Option<&str>, body: &[u8]) -> Result<WebhookAck, WebhookError> {
        self.verify(signature, body).await?;
        let events = parse_events(body)?;

        let mut ack = WebhookAck {
            received: events.len(),
            ..WebhookAck::default()
        };
        for event in events {
            let (event_id, kind) = (event.event_id.clone(), event.kind);
            let result = match self.process(event).await {
                Ok(result) => result,
                Err(e) => {
                    error!(event_id = %event_id, error = %e, "Webhook event could not be recorded");
                    EventResult {
                        event_id,
                        kind,
                        status: EventStatus::Failed,
                        effect: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            ack.push(result);
        }

        info!(
            received = ack.received,
            processed = ack.processed,
            duplicates = ack.duplicates,
            failed = ack.failed,
            "Webhook delivery handled"
        );
        Ok(ack)
    }

    /// Claim one event in the ledger, apply it and record the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error only if the ledger row cannot be inserted.
    #[instrument(skip(self, event), fields(event_id = %event.event_id, kind = %event.kind))]
    pub async fn process(&self, event: IncomingEvent) -> Result<EventResult, WebhookError> {
        let store = self.engine.store();
        let claim = NewWebhookEvent {
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            external_product_id: event.external_id,
            payload: event.payload.clone(),
        };

        let record = match store.insert_webhook_event(&claim).await {
            Ok(record) => record,
            Err(e) if e.is_conflict() => {
                debug!("Duplicate delivery acknowledged");
                return Ok(EventResult {
                    event_id: event.event_id,
                    kind: event.kind,
                    status: EventStatus::Duplicate,
                    effect: None,
                    error: None,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = self.apply(&event).await;
        let (status, effect, message) = match outcome {
            Ok(effect) => (EventStatus::Processed, Some(effect), None),
            Err(e) => {
                warn!(error = %e, "Webhook event failed");
                (EventStatus::Failed, None, Some(e.to_string()))
            }
        };

        let ledger_status = if status == EventStatus::Failed {
            WebhookStatus::Failed
        } else {
            WebhookStatus::Processed
        };
        if let Err(e) = store
            .finish_webhook_event(record.id, ledger_status, message.as_deref())
            .await
        {
            error!(error = %e, "Failed to record webhook outcome");
        }

        Ok(EventResult {
            event_id: event.event_id,
            kind: event.kind,
            status,
            effect,
            error: message,
        })
    }

    async fn apply(&self, event: &IncomingEvent) -> Result<EventEffect, SyncError> {
        let ignored = |reason: &str| EventEffect::Ignored {
            reason: reason.to_string(),
        };

        match event.kind {
            EventKind::Stock => {
                let Some(external_id) = event.external_id else {
                    return Ok(ignored("stock event without product id"));
                };
                let applied = self.engine.apply_stock(external_id, event.quantity).await?;
                Ok(EventEffect::Stock(applied))
            }
            EventKind::Product => {
                let Some(external_id) = event.external_id else {
                    return Ok(ignored("product event without product id"));
                };
                if event.deleted {
                    self.deactivate(external_id).await
                } else {
                    self.refresh_product(external_id).await
                }
            }
            EventKind::Order | EventKind::Invoice | EventKind::Unknown => {
                Ok(ignored("event type not handled"))
            }
        }
    }

    /// Soft-delete the product or variation an ERP deletion refers to.
    async fn deactivate(&self, external_id: ErpId) -> Result<EventEffect, SyncError> {
        let store = self.engine.store();

        if let Some(product) = store.product_by_external_id(external_id).await? {
            if !product.is_active {
                return Ok(EventEffect::Inactive);
            }
            store.set_product_active(product.id, false, true).await?;
            store.set_product_variants_active(product.id, false).await?;
            info!(product_id = %product.id, "Product deactivated after ERP deletion");
            return Ok(EventEffect::Deactivated {
                product_id: product.id,
            });
        }

        if let Some(variant) = store.variant_by_external_id(external_id).await? {
            if variant.is_active {
                store.set_variant_active(variant.id, false).await?;
            }
            return Ok(EventEffect::VariantDeactivated {
                variant_id: variant.id,
            });
        }

        Ok(EventEffect::NotFound)
    }

    /// Refresh a product after an ERP create or update.
    ///
    /// Known products get the webhook-safe field subset and variant stock.
    /// Unknown products go through group reconciliation under the stored
    /// policy, which imports them only when the policy allows.
    async fn refresh_product(&self, external_id: ErpId) -> Result<EventEffect, SyncError> {
        let source = self.engine.source();
        let store = self.engine.store();

        let Some(mut detail) = source.product_detail(external_id).await? else {
            return Ok(EventEffect::NotFound);
        };
        if let Some(parent_id) = detail.redirect_parent() {
            detail = source
                .product_detail(parent_id)
                .await?
                .ok_or(SyncError::MissingRecord(parent_id))?;
        }

        match store.product_by_external_id(detail.id).await? {
            Some(product) if !product.is_active => Ok(EventEffect::Inactive),
            Some(product) => self.apply_safe_update(&product, &detail).await,
            None => {
                let policy = store.load_policy().await?;
                let group = ProductGroup::standalone(ExternalListingItem {
                    external_id: detail.id,
                    raw_name: detail.name.clone(),
                    format: detail.format,
                });
                let mut run = RunState::new();
                let report = self.engine.reconcile_group(&group, &policy, &mut run).await?;
                Ok(EventEffect::Reconciled(report))
            }
        }
    }

    async fn apply_safe_update(
        &self,
        product: &CanonicalProduct,
        detail: &ProductDetail,
    ) -> Result<EventEffect, SyncError> {
        let store = self.engine.store();

        let update = product_update(detail, &product.name, &WEBHOOK_FIELDS);
        let fields = !update.is_empty();
        if fields {
            store.update_product(product.id, &update).await?;
        }

        let locals = store.variants_for_product(product.id).await?;
        let mut targets: Vec<(VariantId, i32, ErpId, Option<i32>)> = Vec::new();
        if detail.variations.is_empty() {
            if let Some(v) = default_variant(&locals, Some(detail.id)) {
                targets.push((v.id, v.stock_quantity, detail.id, detail.stock));
            }
        } else {
            for variation in &detail.variations {
                if let Some(v) = locals
                    .iter()
                    .find(|l| l.external_variant_id == Some(variation.id))
                {
                    targets.push((v.id, v.stock_quantity, variation.id, variation.stock));
                }
            }
        }

        let missing: Vec<ErpId> = targets
            .iter()
            .filter(|(_, _, _, stock)| stock.is_none())
            .map(|(_, _, id, _)| *id)
            .collect();
        let balances: HashMap<ErpId, i32> = if missing.is_empty() {
            HashMap::new()
        } else {
            fetch_available(self.engine.source(), &missing).await?
        };

        let mut stock_updated = 0;
        for (variant_id, current, external_id, nested) in targets {
            let Some(quantity) = nested.or_else(|| balances.get(&external_id).copied()) else {
                continue;
            };
            if quantity != current {
                store.set_variant_stock(variant_id, quantity).await?;
                stock_updated += 1;
            }
        }

        Ok(EventEffect::Refreshed {
            product_id: product.id,
            fields,
            stock_updated,
        })
    }
}
