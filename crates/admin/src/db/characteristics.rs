//! Product characteristics repository.

use sqlx::PgPool;

use vitrine_core::ProductId;

use super::RepositoryError;
use crate::models::Characteristic;

/// Repository for product characteristic database operations.
pub struct CharacteristicRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CharacteristicRepository<'a> {
    /// Create a new characteristic repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Replace every characteristic of a product in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn replace(
        &self,
        product_id: ProductId,
        characteristics: &[Characteristic],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM product_characteristics WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        for (position, c) in (0_i32..).zip(characteristics) {
            sqlx::query(
                r"
                INSERT INTO product_characteristics (product_id, name, value, position)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(product_id)
            .bind(&c.name)
            .bind(&c.value)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
