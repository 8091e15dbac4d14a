//! The store seam used by the sync engine and webhook processor.
//!
//! [`CatalogStore`] gathers every read and write reconciliation performs.
//! [`PgCatalogStore`] delegates to the per-table repositories; tests use the
//! in-memory store from `crate::testing`.

use std::collections::HashSet;

use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::PgPool;

use vitrine_core::{ErpId, ProductId, Sku, VariantId, WebhookEventRowId, WebhookStatus};

use super::{
    CategoryRepository, CharacteristicRepository, ErpCredentialsRepository, ImageRepository,
    ProductRepository, RepositoryError, SyncPolicyRepository, VariantRepository,
    WebhookEventRepository,
};
use crate::models::{
    CanonicalProduct, CanonicalVariant, Category, Characteristic, NewImage, NewProduct,
    NewVariant, NewWebhookEvent, ProductUpdate, SyncPolicy, WebhookEventRecord,
};

/// Persistence operations used by catalog reconciliation.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // Products
    async fn product_by_id(&self, id: ProductId) -> Result<Option<CanonicalProduct>, RepositoryError>;
    async fn product_by_external_id(
        &self,
        external_id: ErpId,
    ) -> Result<Option<CanonicalProduct>, RepositoryError>;
    async fn product_by_sku(&self, sku: &Sku) -> Result<Option<CanonicalProduct>, RepositoryError>;
    async fn linked_external_ids(&self, ids: &[ErpId]) -> Result<HashSet<ErpId>, RepositoryError>;
    async fn linked_products(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<CanonicalProduct>, RepositoryError>;
    async fn product_slug_exists(&self, slug: &str) -> Result<bool, RepositoryError>;
    async fn insert_product(&self, product: &NewProduct) -> Result<CanonicalProduct, RepositoryError>;
    async fn update_product(&self, id: ProductId, update: &ProductUpdate) -> Result<(), RepositoryError>;
    /// Write the link only if the product has none. `false` if it already had one.
    async fn link_product(&self, id: ProductId, external_id: ErpId) -> Result<bool, RepositoryError>;
    async fn set_product_active(
        &self,
        id: ProductId,
        active: bool,
        by_sync: bool,
    ) -> Result<(), RepositoryError>;
    /// Delete a product with its variants, images and characteristics.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;

    // Variants
    async fn variants_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<CanonicalVariant>, RepositoryError>;
    async fn variant_by_external_id(
        &self,
        external_id: ErpId,
    ) -> Result<Option<CanonicalVariant>, RepositoryError>;
    async fn variant_by_sku(&self, sku: &Sku) -> Result<Option<CanonicalVariant>, RepositoryError>;
    async fn insert_variant(&self, variant: &NewVariant) -> Result<CanonicalVariant, RepositoryError>;
    async fn set_variant_stock(&self, id: VariantId, quantity: i32) -> Result<(), RepositoryError>;
    async fn set_variant_active(&self, id: VariantId, active: bool) -> Result<(), RepositoryError>;
    async fn set_product_variants_active(
        &self,
        product_id: ProductId,
        active: bool,
    ) -> Result<(), RepositoryError>;
    async fn link_variant(&self, id: VariantId, external_id: ErpId) -> Result<bool, RepositoryError>;
    async fn delete_variant(&self, id: VariantId) -> Result<(), RepositoryError>;

    // Categories and media
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;
    async fn insert_category(&self, name: &str, slug: &str) -> Result<Category, RepositoryError>;
    async fn replace_images(
        &self,
        product_id: ProductId,
        images: &[NewImage],
    ) -> Result<(), RepositoryError>;
    async fn image_urls(&self, product_id: ProductId) -> Result<Vec<String>, RepositoryError>;
    async fn replace_characteristics(
        &self,
        product_id: ProductId,
        characteristics: &[Characteristic],
    ) -> Result<(), RepositoryError>;

    // Policy
    async fn load_policy(&self) -> Result<SyncPolicy, RepositoryError>;
    async fn save_policy(&self, policy: &SyncPolicy) -> Result<(), RepositoryError>;

    // Webhooks
    /// Insert a ledger row. `RepositoryError::Conflict` on a duplicate event id.
    async fn insert_webhook_event(
        &self,
        event: &NewWebhookEvent,
    ) -> Result<WebhookEventRecord, RepositoryError>;
    async fn finish_webhook_event(
        &self,
        id: WebhookEventRowId,
        status: WebhookStatus,
        last_error: Option<&str>,
    ) -> Result<(), RepositoryError>;
    /// Webhook signing secret stored with the linked ERP account.
    async fn stored_webhook_secret(&self) -> Result<Option<SecretString>, RepositoryError>;
}

/// [`CatalogStore`] on `PostgreSQL`.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    /// Create a store on a pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(&self.pool)
    }

    fn variants(&self) -> VariantRepository<'_> {
        VariantRepository::new(&self.pool)
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn product_by_id(&self, id: ProductId) -> Result<Option<CanonicalProduct>, RepositoryError> {
        self.products().get_by_id(id).await
    }

    async fn product_by_external_id(
        &self,
        external_id: ErpId,
    ) -> Result<Option<CanonicalProduct>, RepositoryError> {
        self.products().get_by_external_id(external_id).await
    }

    async fn product_by_sku(&self, sku: &Sku) -> Result<Option<CanonicalProduct>, RepositoryError> {
        self.products().get_by_sku(sku).await
    }

    async fn linked_external_ids(&self, ids: &[ErpId]) -> Result<HashSet<ErpId>, RepositoryError> {
        self.products().linked_external_ids(ids).await
    }

    async fn linked_products(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<CanonicalProduct>, RepositoryError> {
        self.products().list_linked(offset, limit).await
    }

    async fn product_slug_exists(&self, slug: &str) -> Result<bool, RepositoryError> {
        self.products().slug_exists(slug).await
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<CanonicalProduct, RepositoryError> {
        self.products().create(product).await
    }

    async fn update_product(&self, id: ProductId, update: &ProductUpdate) -> Result<(), RepositoryError> {
        self.products().update(id, update).await
    }

    async fn link_product(&self, id: ProductId, external_id: ErpId) -> Result<bool, RepositoryError> {
        self.products().link(id, external_id).await
    }

    async fn set_product_active(
        &self,
        id: ProductId,
        active: bool,
        by_sync: bool,
    ) -> Result<(), RepositoryError> {
        self.products().set_active(id, active, by_sync).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        self.products().delete(id).await
    }

    async fn variants_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<CanonicalVariant>, RepositoryError> {
        self.variants().list_for_product(product_id).await
    }

    async fn variant_by_external_id(
        &self,
        external_id: ErpId,
    ) -> Result<Option<CanonicalVariant>, RepositoryError> {
        self.variants().get_by_external_id(external_id).await
    }

    async fn variant_by_sku(&self, sku: &Sku) -> Result<Option<CanonicalVariant>, RepositoryError> {
        self.variants().get_by_sku(sku).await
    }

    async fn insert_variant(&self, variant: &NewVariant) -> Result<CanonicalVariant, RepositoryError> {
        self.variants().create(variant).await
    }

    async fn set_variant_stock(&self, id: VariantId, quantity: i32) -> Result<(), RepositoryError> {
        self.variants().set_stock(id, quantity).await
    }

    async fn set_variant_active(&self, id: VariantId, active: bool) -> Result<(), RepositoryError> {
        self.variants().set_active(id, active).await
    }

    async fn set_product_variants_active(
        &self,
        product_id: ProductId,
        active: bool,
    ) -> Result<(), RepositoryError> {
        self.variants()
            .set_active_for_product(product_id, active)
            .await
            .map(|_| ())
    }

    async fn link_variant(&self, id: VariantId, external_id: ErpId) -> Result<bool, RepositoryError> {
        self.variants().link(id, external_id).await
    }

    async fn delete_variant(&self, id: VariantId) -> Result<(), RepositoryError> {
        self.variants().delete(id).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        CategoryRepository::new(&self.pool).list().await
    }

    async fn insert_category(&self, name: &str, slug: &str) -> Result<Category, RepositoryError> {
        CategoryRepository::new(&self.pool).create(name, slug).await
    }

    async fn replace_images(
        &self,
        product_id: ProductId,
        images: &[NewImage],
    ) -> Result<(), RepositoryError> {
        ImageRepository::new(&self.pool)
            .replace(product_id, images)
            .await
    }

    async fn image_urls(&self, product_id: ProductId) -> Result<Vec<String>, RepositoryError> {
        ImageRepository::new(&self.pool)
            .urls_for_product(product_id)
            .await
    }

    async fn replace_characteristics(
        &self,
        product_id: ProductId,
        characteristics: &[Characteristic],
    ) -> Result<(), RepositoryError> {
        CharacteristicRepository::new(&self.pool)
            .replace(product_id, characteristics)
            .await
    }

    async fn load_policy(&self) -> Result<SyncPolicy, RepositoryError> {
        SyncPolicyRepository::new(&self.pool).load().await
    }

    async fn save_policy(&self, policy: &SyncPolicy) -> Result<(), RepositoryError> {
        SyncPolicyRepository::new(&self.pool).save(policy).await
    }

    async fn insert_webhook_event(
        &self,
        event: &NewWebhookEvent,
    ) -> Result<WebhookEventRecord, RepositoryError> {
        WebhookEventRepository::new(&self.pool).insert(event).await
    }

    async fn finish_webhook_event(
        &self,
        id: WebhookEventRowId,
        status: WebhookStatus,
        last_error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        WebhookEventRepository::new(&self.pool)
            .finish(id, status, last_error)
            .await
    }

    async fn stored_webhook_secret(&self) -> Result<Option<SecretString>, RepositoryError> {
        let credentials = ErpCredentialsRepository::new(&self.pool)
            .get_default()
            .await?;
        Ok(credentials.and_then(|c| c.webhook_secret))
    }
}
