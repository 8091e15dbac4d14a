//! Product image repository.

use sqlx::PgPool;

use vitrine_core::ProductId;

use super::RepositoryError;
use crate::models::NewImage;

/// Repository for product image database operations.
pub struct ImageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ImageRepository<'a> {
    /// Create a new image repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Replace every image of a product in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; the old
    /// images are kept in that case.
    pub async fn replace(
        &self,
        product_id: ProductId,
        images: &[NewImage],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM product_images WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        for image in images {
            sqlx::query(
                "INSERT INTO product_images (product_id, url, position, alt) VALUES ($1, $2, $3, $4)",
            )
            .bind(product_id)
            .bind(&image.url)
            .bind(image.position)
            .bind(&image.alt)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Image URLs of a product in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn urls_for_product(&self, product_id: ProductId) -> Result<Vec<String>, RepositoryError> {
        let urls = sqlx::query_scalar(
            "SELECT url FROM product_images WHERE product_id = $1 ORDER BY position",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(urls)
    }
}
