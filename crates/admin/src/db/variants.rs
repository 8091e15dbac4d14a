//! Product variant repository.

use sqlx::PgPool;

use vitrine_core::{ErpId, ProductId, Sku, VariantId};

use super::{RepositoryError, conflict_or_database};
use crate::models::{CanonicalVariant, NewVariant};

const VARIANT_COLUMNS: &str = r"
    id, product_id, size, color, color_hex, stock_quantity, sku,
    external_variant_id, is_active, price_modifier
";

/// Repository for variant database operations.
pub struct VariantRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VariantRepository<'a> {
    /// Create a new variant repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All variants of a product, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<CanonicalVariant>, RepositoryError> {
        let sql = format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, CanonicalVariant>(&sql)
            .bind(product_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Get the variant linked to an ERP id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_external_id(
        &self,
        external_id: ErpId,
    ) -> Result<Option<CanonicalVariant>, RepositoryError> {
        let sql =
            format!("SELECT {VARIANT_COLUMNS} FROM product_variants WHERE external_variant_id = $1");
        let row = sqlx::query_as::<_, CanonicalVariant>(&sql)
            .bind(external_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Get a variant by SKU, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_sku(&self, sku: &Sku) -> Result<Option<CanonicalVariant>, RepositoryError> {
        let sql = format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE sku = $1 ORDER BY id LIMIT 1"
        );
        let row = sqlx::query_as::<_, CanonicalVariant>(&sql)
            .bind(sku)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Insert a variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the external id is taken.
    pub async fn create(&self, variant: &NewVariant) -> Result<CanonicalVariant, RepositoryError> {
        let sql = format!(
            "INSERT INTO product_variants (
                product_id, size, color, color_hex, stock_quantity, sku,
                external_variant_id, is_active, price_modifier
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {VARIANT_COLUMNS}"
        );
        sqlx::query_as::<_, CanonicalVariant>(&sql)
            .bind(variant.product_id)
            .bind(&variant.size)
            .bind(&variant.color)
            .bind(&variant.color_hex)
            .bind(variant.stock_quantity)
            .bind(&variant.sku)
            .bind(variant.external_variant_id)
            .bind(variant.is_active)
            .bind(variant.price_modifier)
            .fetch_one(self.pool)
            .await
            .map_err(|e| conflict_or_database(e, "external variant id"))
    }

    /// Set the stock quantity of a variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_stock(&self, id: VariantId, quantity: i32) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE product_variants SET stock_quantity = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Activate or deactivate one variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_active(&self, id: VariantId, active: bool) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE product_variants SET is_active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Activate or deactivate every variant of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_active_for_product(
        &self,
        product_id: ProductId,
        active: bool,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE product_variants SET is_active = $2, updated_at = NOW() WHERE product_id = $1",
        )
        .bind(product_id)
        .bind(active)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Link a variant to an ERP id if it has no link yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another variant holds the id.
    pub async fn link(&self, id: VariantId, external_id: ErpId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE product_variants
            SET external_variant_id = $2, updated_at = NOW()
            WHERE id = $1 AND external_variant_id IS NULL
            ",
        )
        .bind(id)
        .bind(external_id)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "external variant id"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: VariantId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM product_variants WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
