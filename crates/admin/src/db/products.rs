//! Product repository.

use std::collections::HashSet;

use sqlx::PgPool;

use vitrine_core::{ErpId, ProductId, Sku};

use super::{RepositoryError, conflict_or_database};
use crate::models::{CanonicalProduct, NewProduct, ProductUpdate};

const PRODUCT_COLUMNS: &str = r"
    id, name, slug, description, short_description, base_price, sale_price,
    category_id, external_product_id, is_active, deactivated_by_sync, sku, gtin,
    weight_kg, width_cm, height_cm, depth_cm
";

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by local id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<CanonicalProduct>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, CanonicalProduct>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Get the product linked to an ERP id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_external_id(
        &self,
        external_id: ErpId,
    ) -> Result<Option<CanonicalProduct>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE external_product_id = $1");
        let row = sqlx::query_as::<_, CanonicalProduct>(&sql)
            .bind(external_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Get a product by its own SKU. The oldest product wins if several
    /// share one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_sku(&self, sku: &Sku) -> Result<Option<CanonicalProduct>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1 ORDER BY id LIMIT 1");
        let row = sqlx::query_as::<_, CanonicalProduct>(&sql)
            .bind(sku)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Which of the given ERP ids are already linked to a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn linked_external_ids(
        &self,
        external_ids: &[ErpId],
    ) -> Result<HashSet<ErpId>, RepositoryError> {
        let raw: Vec<i64> = external_ids.iter().map(ErpId::as_i64).collect();
        let rows: Vec<ErpId> = sqlx::query_scalar(
            "SELECT external_product_id FROM products WHERE external_product_id = ANY($1)",
        )
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Page through ERP-linked products in id order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_linked(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<CanonicalProduct>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE external_product_id IS NOT NULL
             ORDER BY id
             OFFSET $1 LIMIT $2"
        );
        let rows = sqlx::query_as::<_, CanonicalProduct>(&sql)
            .bind(offset)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Whether a slug is taken.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn slug_exists(&self, slug: &str) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE slug = $1)")
            .bind(slug)
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }

    /// Insert a new, active product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug or external id is taken.
    pub async fn create(&self, product: &NewProduct) -> Result<CanonicalProduct, RepositoryError> {
        let sql = format!(
            "INSERT INTO products (
                name, slug, description, short_description, base_price, sale_price,
                category_id, external_product_id, sku, gtin,
                weight_kg, width_cm, height_cm, depth_cm
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, CanonicalProduct>(&sql)
            .bind(&product.name)
            .bind(&product.slug)
            .bind(&product.description)
            .bind(&product.short_description)
            .bind(product.base_price)
            .bind(product.sale_price)
            .bind(product.category_id)
            .bind(product.external_product_id)
            .bind(&product.sku)
            .bind(&product.gtin)
            .bind(product.weight_kg)
            .bind(product.width_cm)
            .bind(product.height_cm)
            .bind(product.depth_cm)
            .fetch_one(self.pool)
            .await
            .map_err(|e| conflict_or_database(e, "product"))
    }

    /// Apply a partial update. Unset fields keep their value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(&self, id: ProductId, update: &ProductUpdate) -> Result<(), RepositoryError> {
        let (set_sale_price, sale_price) = match update.sale_price {
            Some(value) => (true, value),
            None => (false, None),
        };

        let result = sqlx::query(
            r"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                short_description = COALESCE($4, short_description),
                base_price = COALESCE($5, base_price),
                sale_price = CASE WHEN $6 THEN $7 ELSE sale_price END,
                sku = COALESCE($8, sku),
                gtin = COALESCE($9, gtin),
                weight_kg = COALESCE($10, weight_kg),
                width_cm = COALESCE($11, width_cm),
                height_cm = COALESCE($12, height_cm),
                depth_cm = COALESCE($13, depth_cm),
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(&update.short_description)
        .bind(update.base_price)
        .bind(set_sale_price)
        .bind(sale_price)
        .bind(&update.sku)
        .bind(&update.gtin)
        .bind(update.weight_kg)
        .bind(update.width_cm)
        .bind(update.height_cm)
        .bind(update.depth_cm)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Link a product to an ERP id if it has no link yet.
    ///
    /// Returns `false` when the product was already linked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another product holds the id.
    pub async fn link(&self, id: ProductId, external_id: ErpId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET external_product_id = $2, updated_at = NOW()
            WHERE id = $1 AND external_product_id IS NULL
            ",
        )
        .bind(id)
        .bind(external_id)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "external product id"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Activate or deactivate a product.
    ///
    /// `by_sync` records whether the change came from the ERP; only
    /// sync-deactivated products are eligible for automatic reactivation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_active(
        &self,
        id: ProductId,
        active: bool,
        by_sync: bool,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE products
            SET is_active = $2, deactivated_by_sync = (NOT $2) AND $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(active)
        .bind(by_sync)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Delete a product. Variants, images and characteristics cascade.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
