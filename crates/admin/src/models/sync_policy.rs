//! Sync policy: which ERP fields may overwrite local data.
//!
//! The policy is a single persisted row. It is loaded once per invocation and
//! passed by value into every reconciliation call, so the engine never reads
//! it from shared state.
//!
//! # First import
//!
//! ```text
//! NORMAL ──first_import──▶ FIRST_IMPORT ──last page done──▶ NORMAL (stock only)
//! ```
//!
//! While the first import runs every flag is on. When its final page has been
//! reconciled everything except `sync_stock` is switched off and
//! `first_import_done` is set, which makes the transition one-way.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from policy state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The catalog already went through its first import.
    #[error("first import already completed")]
    FirstImportAlreadyDone,
}

/// Field-overwrite policy for catalog sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct SyncPolicy {
    pub sync_stock: bool,
    pub sync_titles: bool,
    pub sync_descriptions: bool,
    pub sync_images: bool,
    pub sync_prices: bool,
    pub sync_dimensions: bool,
    pub sync_sku_gtin: bool,
    pub sync_variant_active: bool,
    pub import_new_products: bool,
    pub merge_by_sku: bool,
    pub first_import_done: bool,
}

impl Default for SyncPolicy {
    /// Stock-only sync that still imports and links new ERP products.
    fn default() -> Self {
        Self {
            sync_stock: true,
            sync_titles: false,
            sync_descriptions: false,
            sync_images: false,
            sync_prices: false,
            sync_dimensions: false,
            sync_sku_gtin: false,
            sync_variant_active: false,
            import_new_products: true,
            merge_by_sku: true,
            first_import_done: false,
        }
    }
}

impl SyncPolicy {
    /// The fully permissive policy used while a first import runs.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::FirstImportAlreadyDone` if the catalog has
    /// already completed its first import.
    pub const fn begin_first_import(self) -> Result<Self, PolicyError> {
        if self.first_import_done {
            return Err(PolicyError::FirstImportAlreadyDone);
        }
        Ok(Self {
            sync_stock: true,
            sync_titles: true,
            sync_descriptions: true,
            sync_images: true,
            sync_prices: true,
            sync_dimensions: true,
            sync_sku_gtin: true,
            sync_variant_active: true,
            import_new_products: true,
            merge_by_sku: true,
            first_import_done: false,
        })
    }

    /// The policy persisted once the final page of a first import completes.
    #[must_use]
    pub const fn complete_first_import(self) -> Self {
        Self {
            sync_stock: self.sync_stock,
            sync_titles: false,
            sync_descriptions: false,
            sync_images: false,
            sync_prices: false,
            sync_dimensions: false,
            sync_sku_gtin: false,
            sync_variant_active: false,
            import_new_products: false,
            merge_by_sku: false,
            first_import_done: true,
        }
    }

    /// Whether any product-level field is allowed to change on an existing
    /// product.
    #[must_use]
    pub const fn updates_product_fields(&self) -> bool {
        self.sync_titles
            || self.sync_descriptions
            || self.sync_prices
            || self.sync_dimensions
            || self.sync_sku_gtin
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_stock_only() {
        let policy = SyncPolicy::default();
        assert!(policy.sync_stock);
        assert!(policy.import_new_products);
        assert!(policy.merge_by_sku);
        assert!(!policy.updates_product_fields());
        assert!(!policy.sync_images);
        assert!(!policy.first_import_done);
    }

    #[test]
    fn test_first_import_enables_everything() {
        let policy = SyncPolicy::default().begin_first_import().unwrap();
        assert!(policy.sync_titles && policy.sync_descriptions && policy.sync_images);
        assert!(policy.sync_prices && policy.sync_dimensions && policy.sync_sku_gtin);
        assert!(policy.sync_variant_active && policy.import_new_products && policy.merge_by_sku);
        assert!(!policy.first_import_done);
    }

    #[test]
    fn test_first_import_completion_narrows_to_stock() {
        let done = SyncPolicy::default()
            .begin_first_import()
            .unwrap()
            .complete_first_import();
        assert_eq!(
            done,
            SyncPolicy {
                sync_stock: true,
                sync_titles: false,
                sync_descriptions: false,
                sync_images: false,
                sync_prices: false,
                sync_dimensions: false,
                sync_sku_gtin: false,
                sync_variant_active: false,
                import_new_products: false,
                merge_by_sku: false,
                first_import_done: true,
            }
        );
    }

    #[test]
    fn test_first_import_is_one_way() {
        let done = SyncPolicy::default()
            .begin_first_import()
            .unwrap()
            .complete_first_import();
        assert_eq!(
            done.begin_first_import(),
            Err(PolicyError::FirstImportAlreadyDone)
        );
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(SyncPolicy::default()).unwrap();
        assert_eq!(json["syncStock"], true);
        assert_eq!(json["firstImportDone"], false);
    }
}
