//! Integration tests for Vitrine.
//!
//! Scenarios run the real sync engine, webhook processor and router against
//! the in-memory store, ERP and blob fakes from `vitrine_admin::testing`. No
//! database or network is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p vitrine-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `catalog_sync` - Full sync, first import, cleanup, stock refresh
//! - `webhooks` - Stock and product events, idempotency
//! - `http` - Routes, auth and status mapping

use std::sync::Arc;

use axum::Router;
use rust_decimal::Decimal;
use secrecy::SecretString;

use vitrine_admin::config::{SyncConfig, WebhookConfig};
use vitrine_admin::erp::ProductDetail;
use vitrine_admin::models::SyncPolicy;
use vitrine_admin::routes;
use vitrine_admin::state::AppState;
use vitrine_admin::sync::{SyncEngine, SyncRunner};
use vitrine_admin::testing::{
    FakeCatalogSource, MemoryBlobStore, MemoryCatalogStore, product_detail, variation,
};
use vitrine_admin::webhooks::WebhookProcessor;
use vitrine_core::{ErpId, ListingFormat, Sku};

/// Bearer token accepted by the harness router.
pub const TRIGGER_TOKEN: &str = "sync_tok_4Jf8Qm2Rx7Lw9Zp3";

/// Webhook secret used by signed deliveries.
pub const WEBHOOK_SECRET: &str = "whsec_Hq7Vt3Np9Kx2Lm8R";

/// Fakes plus the components built on them.
pub struct TestContext {
    pub source: Arc<FakeCatalogSource>,
    pub store: Arc<MemoryCatalogStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub engine: SyncEngine,
}

impl TestContext {
    /// A context whose store starts with `policy`.
    #[must_use]
    pub fn with_policy(policy: SyncPolicy) -> Self {
        let source = Arc::new(FakeCatalogSource::new());
        let store = Arc::new(MemoryCatalogStore::with_policy(policy));
        let blobs = Arc::new(MemoryBlobStore::new());
        let engine = SyncEngine::new(source.clone(), store.clone(), blobs.clone());
        Self {
            source,
            store,
            blobs,
            engine,
        }
    }

    /// A context with the default stock-only policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(SyncPolicy::default())
    }

    #[must_use]
    pub fn runner(&self) -> SyncRunner {
        SyncRunner::new(self.engine.clone(), 200)
    }

    /// Processor verifying against [`WEBHOOK_SECRET`].
    #[must_use]
    pub fn webhooks(&self) -> WebhookProcessor {
        WebhookProcessor::new(self.engine.clone(), signed_config())
    }

    /// Processor that accepts unsigned deliveries.
    #[must_use]
    pub fn unsigned_webhooks(&self) -> WebhookProcessor {
        WebhookProcessor::new(
            self.engine.clone(),
            WebhookConfig {
                secret: None,
                allow_unsigned: true,
            },
        )
    }

    /// The admin router over this context.
    #[must_use]
    pub fn app(&self) -> Router {
        let sync = SyncConfig {
            trigger_token: SecretString::from(TRIGGER_TOKEN.to_string()),
            log_cap: 200,
        };
        let state = AppState::from_engine(self.engine.clone(), &sync, signed_config());
        routes::routes().with_state(state)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

fn signed_config() -> WebhookConfig {
    WebhookConfig {
        secret: Some(SecretString::from(WEBHOOK_SECRET.to_string())),
        allow_unsigned: false,
    }
}

fn sku(value: &str) -> Option<Sku> {
    Sku::parse(value).ok()
}

/// Price in cents.
#[must_use]
pub fn brl(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Parent 501 "Sandália Laura" with colors Preto (1001) and Branco (1002).
#[must_use]
pub fn laura_detail() -> ProductDetail {
    let mut preto = variation(1001, "Sandália Laura (501) Cor: Preto", Some("SL-PT"), "Cor:Preto");
    preto.stock = Some(4);
    let mut branco = variation(1002, "Sandália Laura (501) Cor: Branco", Some("SL-BR"), "Cor:Branco");
    branco.stock = Some(2);

    ProductDetail {
        sku: sku("SL-501"),
        format: ListingFormat::Variation,
        short_description: Some("Rasteira em couro".to_string()),
        variations: vec![preto, branco],
        ..product_detail(501, "Sandália Laura", brl(18990))
    }
}

/// Simple product 2000 "Tênis Max".
#[must_use]
pub fn max_detail() -> ProductDetail {
    ProductDetail {
        sku: sku("TM-2000"),
        stock: Some(7),
        ..product_detail(2000, "Tênis Max", brl(29990))
    }
}

/// Child record 1002 pointing at parent 501.
#[must_use]
pub fn branco_child_detail() -> ProductDetail {
    ProductDetail {
        sku: sku("SL-BR"),
        parent_id: Some(ErpId::new(501)),
        variation_name: Some("Cor:Branco".to_string()),
        stock: Some(2),
        ..product_detail(1002, "Sandália Laura Cor: Branco", brl(18990))
    }
}

/// The three-row listing of the Sandália Laura scenario with its details.
pub fn seed_laura_listing(source: &FakeCatalogSource) {
    source.list(1001, "Sandália Laura (501) Cor: Preto", ListingFormat::Simple);
    source.list(1002, "Sandália Laura (501) Cor: Branco", ListingFormat::Simple);
    source.list(2000, "Tênis Max", ListingFormat::Simple);
    source.add_detail(laura_detail());
    source.add_detail(max_detail());
    source.add_detail(branco_child_detail());
}
