//! Sync policy repository.
//!
//! The policy lives in a single row with `id = 1`. A missing row reads as
//! [`SyncPolicy::default`].

use sqlx::PgPool;

use super::RepositoryError;
use crate::models::SyncPolicy;

/// Repository for the singleton sync policy.
pub struct SyncPolicyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SyncPolicyRepository<'a> {
    /// Create a new sync policy repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the current policy.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load(&self) -> Result<SyncPolicy, RepositoryError> {
        let row = sqlx::query_as::<_, SyncPolicy>(
            r"
            SELECT sync_stock, sync_titles, sync_descriptions, sync_images, sync_prices,
                   sync_dimensions, sync_sku_gtin, sync_variant_active,
                   import_new_products, merge_by_sku, first_import_done
            FROM sync_policy
            WHERE id = 1
            ",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(row.unwrap_or_default())
    }

    /// Persist the policy.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save(&self, policy: &SyncPolicy) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO sync_policy (
                id, sync_stock, sync_titles, sync_descriptions, sync_images, sync_prices,
                sync_dimensions, sync_sku_gtin, sync_variant_active,
                import_new_products, merge_by_sku, first_import_done
            )
            VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                sync_stock = EXCLUDED.sync_stock,
                sync_titles = EXCLUDED.sync_titles,
                sync_descriptions = EXCLUDED.sync_descriptions,
                sync_images = EXCLUDED.sync_images,
                sync_prices = EXCLUDED.sync_prices,
                sync_dimensions = EXCLUDED.sync_dimensions,
                sync_sku_gtin = EXCLUDED.sync_sku_gtin,
                sync_variant_active = EXCLUDED.sync_variant_active,
                import_new_products = EXCLUDED.import_new_products,
                merge_by_sku = EXCLUDED.merge_by_sku,
                first_import_done = EXCLUDED.first_import_done,
                updated_at = NOW()
            ",
        )
        .bind(policy.sync_stock)
        .bind(policy.sync_titles)
        .bind(policy.sync_descriptions)
        .bind(policy.sync_images)
        .bind(policy.sync_prices)
        .bind(policy.sync_dimensions)
        .bind(policy.sync_sku_gtin)
        .bind(policy.sync_variant_active)
        .bind(policy.import_new_products)
        .bind(policy.merge_by_sku)
        .bind(policy.first_import_done)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
