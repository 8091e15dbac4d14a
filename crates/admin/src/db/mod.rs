//! Database operations for the canonical catalog.
//!
//! ## Tables
//!
//! - `categories` - Storefront categories, matched by name during import
//! - `products` - Canonical products, linked to the ERP by `external_product_id`
//! - `product_variants` - Size/color variants, linked by `external_variant_id`
//! - `product_images` - Re-hosted product images
//! - `product_characteristics` - Brand, unit and ERP custom fields
//! - `sync_policy` - Single-row sync flags
//! - `webhook_events` - Idempotency ledger for inbound webhooks
//! - `erp_credentials` - OAuth tokens of the linked ERP account
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p vitrine-cli -- migrate
//! ```

pub mod categories;
pub mod characteristics;
pub mod erp_credentials;
pub mod images;
pub mod products;
pub mod store;
pub mod sync_policy;
pub mod variants;
pub mod webhook_events;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use categories::CategoryRepository;
pub use characteristics::CharacteristicRepository;
pub use erp_credentials::{ErpCredentialsRepository, PgTokenStore};
pub use images::ImageRepository;
pub use products::ProductRepository;
pub use store::{CatalogStore, PgCatalogStore};
pub use sync_policy::SyncPolicyRepository;
pub use variants::VariantRepository;
pub use webhook_events::WebhookEventRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate external id).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Whether this is a unique constraint conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Map a unique violation to `RepositoryError::Conflict`, anything else to
/// `RepositoryError::Database`.
pub(crate) fn conflict_or_database(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_classification() {
        assert!(RepositoryError::Conflict("event already exists".to_string()).is_conflict());
        assert!(!RepositoryError::NotFound.is_conflict());
    }

    #[test]
    fn test_non_database_errors_are_not_conflicts() {
        let err = conflict_or_database(sqlx::Error::RowNotFound, "product");
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
