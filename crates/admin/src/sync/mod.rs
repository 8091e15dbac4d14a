//! Catalog reconciliation engine.
//!
//! Keeps the canonical catalog converged with the ERP listing:
//!
//! - [`engine`] reconciles one [`ProductGroup`](crate::catalog::ProductGroup)
//!   into a canonical product and its variants
//! - [`runner`] drives the operator-facing actions (full sync, first import,
//!   stock refresh, relink, cleanup, debug)
//! - [`stock`] holds the stock primitives shared with the webhook path
//!
//! The engine talks to the outside only through [`CatalogSource`],
//! [`CatalogStore`] and [`BlobStore`], and receives the [`SyncPolicy`]
//! explicitly on every call.
//!
//! [`SyncPolicy`]: crate::models::SyncPolicy

pub mod category;
pub mod cleanup;
pub mod engine;
pub mod images;
pub mod runner;
pub mod stock;
pub mod variants;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use vitrine_core::{ErpId, SyncOutcome};

use crate::db::{CatalogStore, RepositoryError};
use crate::erp::{CatalogSource, ErpError};
use crate::models::PolicyError;
use crate::storage::{BlobError, BlobStore};

pub use runner::{SyncAction, SyncRequest, SyncRunner, SyncSummary};

/// Errors raised while syncing.
#[derive(Debug, Error)]
pub enum SyncError {
    /// ERP call failed.
    #[error("ERP error: {0}")]
    Erp(#[from] ErpError),

    /// Store read or write failed.
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),

    /// Blob upload failed.
    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),

    /// The policy transition is not allowed.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The ERP does not know a record it referenced.
    #[error("ERP record {0} not found")]
    MissingRecord(ErpId),

    /// The request is incomplete.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SyncError {
    /// Whether the error must abort the whole run instead of one group.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Erp(e) => e.is_configuration(),
            Self::Policy(_) | Self::InvalidRequest(_) => true,
            _ => false,
        }
    }
}

/// Shared collaborators of every sync operation.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    source: Arc<dyn CatalogSource>,
    store: Arc<dyn CatalogStore>,
    blobs: Arc<dyn BlobStore>,
}

impl SyncEngine {
    /// Create an engine.
    #[must_use]
    pub fn new(
        source: Arc<dyn CatalogSource>,
        store: Arc<dyn CatalogStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            source,
            store,
            blobs,
        }
    }

    /// The canonical store.
    #[must_use]
    pub fn store(&self) -> &dyn CatalogStore {
        self.store.as_ref()
    }

    /// The ERP catalog.
    #[must_use]
    pub fn source(&self) -> &dyn CatalogSource {
        self.source.as_ref()
    }
}

/// State carried across the groups of one run.
#[derive(Debug, Default)]
pub struct RunState {
    /// Parent ids already reconciled, including redirect targets.
    handled_parents: HashSet<ErpId>,
}

impl RunState {
    /// A fresh run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parent ids reconciled so far.
    #[must_use]
    pub const fn handled_parents(&self) -> &HashSet<ErpId> {
        &self.handled_parents
    }
}

/// Result of reconciling one group or applying one event. Doubles as the
/// per-item entry of a run's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReport {
    pub external_id: ErpId,
    pub name: String,
    pub status: SyncOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Variants touched.
    pub variants: usize,
}

impl GroupReport {
    /// A report without message or variants.
    #[must_use]
    pub fn new(external_id: ErpId, name: impl Into<String>, status: SyncOutcome) -> Self {
        Self {
            external_id,
            name: name.into(),
            status,
            message: None,
            variants: 0,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub const fn with_variants(mut self, variants: usize) -> Self {
        self.variants = variants;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(SyncError::Erp(ErpError::NotLinked).is_fatal());
        assert!(SyncError::Policy(PolicyError::FirstImportAlreadyDone).is_fatal());
        assert!(!SyncError::Erp(ErpError::RateLimited { attempts: 3 }).is_fatal());
        assert!(!SyncError::MissingRecord(ErpId::new(1)).is_fatal());
        assert!(!SyncError::Store(RepositoryError::NotFound).is_fatal());
    }

    #[test]
    fn test_report_serializes_log_entry() {
        let report = GroupReport::new(ErpId::new(501), "Sandália Laura", SyncOutcome::Imported)
            .with_variants(3);
        let json = serde_json::to_value(&report).unwrap_or_default();
        assert_eq!(json["externalId"], 501);
        assert_eq!(json["status"], "imported");
        assert_eq!(json["variants"], 3);
        assert!(json.get("message").is_none());
    }
}
