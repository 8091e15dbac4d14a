//! In-memory fakes of the store, the ERP and the blob store.
//!
//! Available to this crate's unit tests and, through the `testing` feature,
//! to the integration tests. The store enforces the same uniqueness rules as
//! the `PostgreSQL` schema and counts writes so tests can assert that a path
//! left the catalog untouched.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::SecretString;

use vitrine_core::{
    CategoryId, ErpId, ListingFormat, ProductId, Sku, VariantId, WebhookEventRowId, WebhookStatus,
};

use crate::catalog::ExternalListingItem;
use crate::db::{CatalogStore, RepositoryError};
use crate::erp::{
    CatalogSource, DownloadedImage, ErpError, ErpVariation, ProductDetail, STOCK_BATCH_LIMIT,
    StockBalance,
};
use crate::models::{
    CanonicalProduct, CanonicalVariant, Category, Characteristic, NewImage, NewProduct,
    NewVariant, NewWebhookEvent, ProductUpdate, SyncPolicy, WebhookEventRecord,
};
use crate::storage::{BlobError, BlobStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Store
// =============================================================================

/// Writes performed against a [`MemoryCatalogStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub product_inserts: usize,
    pub product_updates: usize,
    pub product_links: usize,
    pub product_activations: usize,
    pub product_deletes: usize,
    pub variant_inserts: usize,
    pub variant_stock: usize,
    pub variant_activations: usize,
    pub variant_links: usize,
    pub variant_deletes: usize,
    pub category_inserts: usize,
    pub image_replacements: usize,
    pub characteristic_replacements: usize,
}

impl WriteCounts {
    /// Catalog writes of any kind.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.product_inserts
            + self.product_updates
            + self.product_links
            + self.product_activations
            + self.product_deletes
            + self.variant_inserts
            + self.variant_stock
            + self.variant_activations
            + self.variant_links
            + self.variant_deletes
            + self.category_inserts
            + self.image_replacements
            + self.characteristic_replacements
    }
}

#[derive(Default)]
struct StoreState {
    next_id: i64,
    products: BTreeMap<ProductId, CanonicalProduct>,
    variants: BTreeMap<VariantId, CanonicalVariant>,
    categories: Vec<Category>,
    images: HashMap<ProductId, Vec<NewImage>>,
    characteristics: HashMap<ProductId, Vec<Characteristic>>,
    policy: SyncPolicy,
    events: Vec<WebhookEventRecord>,
    webhook_secret: Option<SecretString>,
    unavailable_events: HashSet<String>,
    writes: WriteCounts,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn conflict(what: &str) -> RepositoryError {
        RepositoryError::Conflict(format!("{what} already exists"))
    }

    fn insert_product(&mut self, new: &NewProduct) -> Result<CanonicalProduct, RepositoryError> {
        if self.products.values().any(|p| p.slug == new.slug) {
            return Err(Self::conflict("product slug"));
        }
        if new.external_product_id.is_some()
            && self
                .products
                .values()
                .any(|p| p.external_product_id == new.external_product_id)
        {
            return Err(Self::conflict("product"));
        }

        let product = CanonicalProduct {
            id: ProductId::new(self.next_id()),
            name: new.name.clone(),
            slug: new.slug.clone(),
            description: new.description.clone(),
            short_description: new.short_description.clone(),
            base_price: new.base_price,
            sale_price: new.sale_price,
            category_id: new.category_id,
            external_product_id: new.external_product_id,
            is_active: true,
            deactivated_by_sync: false,
            sku: new.sku.clone(),
            gtin: new.gtin.clone(),
            weight_kg: new.weight_kg,
            width_cm: new.width_cm,
            height_cm: new.height_cm,
            depth_cm: new.depth_cm,
        };
        self.products.insert(product.id, product.clone());
        Ok(product)
    }

    fn insert_variant(&mut self, new: &NewVariant) -> Result<CanonicalVariant, RepositoryError> {
        if new.external_variant_id.is_some()
            && self
                .variants
                .values()
                .any(|v| v.external_variant_id == new.external_variant_id)
        {
            return Err(Self::conflict("variant"));
        }
        if new.stock_quantity < 0 {
            return Err(RepositoryError::DataCorruption(
                "negative stock quantity".to_string(),
            ));
        }

        let variant = CanonicalVariant {
            id: VariantId::new(self.next_id()),
            product_id: new.product_id,
            size: new.size.clone(),
            color: new.color.clone(),
            color_hex: new.color_hex.clone(),
            stock_quantity: new.stock_quantity,
            sku: new.sku.clone(),
            external_variant_id: new.external_variant_id,
            is_active: new.is_active,
            price_modifier: new.price_modifier,
        };
        self.variants.insert(variant.id, variant.clone());
        Ok(variant)
    }
}

/// [`CatalogStore`] held in memory.
#[derive(Default)]
pub struct MemoryCatalogStore {
    state: Mutex<StoreState>,
}

impl MemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(policy: SyncPolicy) -> Self {
        let store = Self::default();
        lock(&store.state).policy = policy;
        store
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        lock(&self.state)
    }

    /// Insert a product without counting it as a write.
    ///
    /// # Panics
    ///
    /// Panics if the product violates a uniqueness rule.
    #[allow(clippy::expect_used)]
    pub fn seed_product(&self, product: &NewProduct) -> CanonicalProduct {
        self.state()
            .insert_product(product)
            .expect("seeded product must be unique")
    }

    /// Insert a variant without counting it as a write.
    ///
    /// # Panics
    ///
    /// Panics if the variant violates a uniqueness rule.
    #[allow(clippy::expect_used)]
    pub fn seed_variant(&self, variant: &NewVariant) -> CanonicalVariant {
        self.state()
            .insert_variant(variant)
            .expect("seeded variant must be unique")
    }

    pub fn seed_category(&self, name: &str, slug: &str) -> Category {
        let mut state = self.state();
        let category = Category {
            id: CategoryId::new(state.next_id()),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        state.categories.push(category.clone());
        category
    }

    /// Mark a product inactive as an operator would.
    pub fn deactivate_product(&self, id: ProductId) {
        if let Some(product) = self.state().products.get_mut(&id) {
            product.is_active = false;
            product.deactivated_by_sync = false;
        }
    }

    /// Mark a product and its variants inactive as an ERP deletion would.
    pub fn deactivate_product_by_sync(&self, id: ProductId) {
        let mut state = self.state();
        if let Some(product) = state.products.get_mut(&id) {
            product.is_active = false;
            product.deactivated_by_sync = true;
        }
        for variant in state.variants.values_mut().filter(|v| v.product_id == id) {
            variant.is_active = false;
        }
    }

    /// Make the ledger insert of `event_id` fail with a database error.
    pub fn fail_ledger_insert(&self, event_id: &str) {
        self.state().unavailable_events.insert(event_id.to_string());
    }

    pub fn set_webhook_secret(&self, secret: &str) {
        self.state().webhook_secret = Some(SecretString::from(secret.to_string()));
    }

    #[must_use]
    pub fn products(&self) -> Vec<CanonicalProduct> {
        self.state().products.values().cloned().collect()
    }

    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<CanonicalProduct> {
        self.state().products.get(&id).cloned()
    }

    #[must_use]
    pub fn variants_of(&self, product_id: ProductId) -> Vec<CanonicalVariant> {
        self.state()
            .variants
            .values()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<CanonicalVariant> {
        self.state().variants.get(&id).cloned()
    }

    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        self.state().categories.clone()
    }

    #[must_use]
    pub fn images_of(&self, product_id: ProductId) -> Vec<NewImage> {
        self.state()
            .images
            .get(&product_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn characteristics_of(&self, product_id: ProductId) -> Vec<Characteristic> {
        self.state()
            .characteristics
            .get(&product_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn webhook_events(&self) -> Vec<WebhookEventRecord> {
        self.state().events.clone()
    }

    #[must_use]
    pub fn policy(&self) -> SyncPolicy {
        self.state().policy
    }

    #[must_use]
    pub fn writes(&self) -> WriteCounts {
        self.state().writes
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn product_by_id(&self, id: ProductId) -> Result<Option<CanonicalProduct>, RepositoryError> {
        Ok(self.product(id))
    }

    async fn product_by_external_id(
        &self,
        external_id: ErpId,
    ) -> Result<Option<CanonicalProduct>, RepositoryError> {
        Ok(self
            .state()
            .products
            .values()
            .find(|p| p.external_product_id == Some(external_id))
            .cloned())
    }

    async fn product_by_sku(&self, sku: &Sku) -> Result<Option<CanonicalProduct>, RepositoryError> {
        Ok(self
            .state()
            .products
            .values()
            .find(|p| p.sku.as_ref() == Some(sku))
            .cloned())
    }

    async fn linked_external_ids(&self, ids: &[ErpId]) -> Result<HashSet<ErpId>, RepositoryError> {
        Ok(self
            .state()
            .products
            .values()
            .filter_map(|p| p.external_product_id)
            .filter(|id| ids.contains(id))
            .collect())
    }

    async fn linked_products(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<CanonicalProduct>, RepositoryError> {
        let skip = usize::try_from(offset).unwrap_or(0);
        let take = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .state()
            .products
            .values()
            .filter(|p| p.external_product_id.is_some())
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn product_slug_exists(&self, slug: &str) -> Result<bool, RepositoryError> {
        Ok(self.state().products.values().any(|p| p.slug == slug))
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<CanonicalProduct, RepositoryError> {
        let mut state = self.state();
        let created = state.insert_product(product)?;
        state.writes.product_inserts += 1;
        Ok(created)
    }

    async fn update_product(&self, id: ProductId, update: &ProductUpdate) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let product = state.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        update.apply_to(product);
        state.writes.product_updates += 1;
        Ok(())
    }

    async fn link_product(&self, id: ProductId, external_id: ErpId) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        if state
            .products
            .values()
            .any(|p| p.id != id && p.external_product_id == Some(external_id))
        {
            return Err(StoreState::conflict("product"));
        }
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(false);
        };
        if product.external_product_id.is_some() {
            return Ok(false);
        }
        product.external_product_id = Some(external_id);
        state.writes.product_links += 1;
        Ok(true)
    }

    async fn set_product_active(
        &self,
        id: ProductId,
        active: bool,
        by_sync: bool,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let product = state.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        product.is_active = active;
        product.deactivated_by_sync = !active && by_sync;
        state.writes.product_activations += 1;
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        if state.products.remove(&id).is_none() {
            return Ok(false);
        }
        state.variants.retain(|_, v| v.product_id != id);
        state.images.remove(&id);
        state.characteristics.remove(&id);
        state.writes.product_deletes += 1;
        Ok(true)
    }

    async fn variants_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<CanonicalVariant>, RepositoryError> {
        Ok(self.variants_of(product_id))
    }

    async fn variant_by_external_id(
        &self,
        external_id: ErpId,
    ) -> Result<Option<CanonicalVariant>, RepositoryError> {
        Ok(self
            .state()
            .variants
            .values()
            .find(|v| v.external_variant_id == Some(external_id))
            .cloned())
    }

    async fn variant_by_sku(&self, sku: &Sku) -> Result<Option<CanonicalVariant>, RepositoryError> {
        Ok(self
            .state()
            .variants
            .values()
            .find(|v| v.sku.as_ref() == Some(sku))
            .cloned())
    }

    async fn insert_variant(&self, variant: &NewVariant) -> Result<CanonicalVariant, RepositoryError> {
        let mut state = self.state();
        let created = state.insert_variant(variant)?;
        state.writes.variant_inserts += 1;
        Ok(created)
    }

    async fn set_variant_stock(&self, id: VariantId, quantity: i32) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let variant = state.variants.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        variant.stock_quantity = quantity.max(0);
        state.writes.variant_stock += 1;
        Ok(())
    }

    async fn set_variant_active(&self, id: VariantId, active: bool) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let variant = state.variants.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        variant.is_active = active;
        state.writes.variant_activations += 1;
        Ok(())
    }

    async fn set_product_variants_active(
        &self,
        product_id: ProductId,
        active: bool,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        for variant in state.variants.values_mut().filter(|v| v.product_id == product_id) {
            variant.is_active = active;
        }
        state.writes.variant_activations += 1;
        Ok(())
    }

    async fn link_variant(&self, id: VariantId, external_id: ErpId) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        if state
            .variants
            .values()
            .any(|v| v.id != id && v.external_variant_id == Some(external_id))
        {
            return Err(StoreState::conflict("variant"));
        }
        let Some(variant) = state.variants.get_mut(&id) else {
            return Ok(false);
        };
        if variant.external_variant_id.is_some() {
            return Ok(false);
        }
        variant.external_variant_id = Some(external_id);
        state.writes.variant_links += 1;
        Ok(true)
    }

    async fn delete_variant(&self, id: VariantId) -> Result<(), RepositoryError> {
        let mut state = self.state();
        if state.variants.remove(&id).is_some() {
            state.writes.variant_deletes += 1;
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        Ok(self.categories())
    }

    async fn insert_category(&self, name: &str, slug: &str) -> Result<Category, RepositoryError> {
        let mut state = self.state();
        if state.categories.iter().any(|c| c.slug == slug) {
            return Err(StoreState::conflict("category"));
        }
        let category = Category {
            id: CategoryId::new(state.next_id()),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        state.categories.push(category.clone());
        state.writes.category_inserts += 1;
        Ok(category)
    }

    async fn replace_images(
        &self,
        product_id: ProductId,
        images: &[NewImage],
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        state.images.insert(product_id, images.to_vec());
        state.writes.image_replacements += 1;
        Ok(())
    }

    async fn image_urls(&self, product_id: ProductId) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .images_of(product_id)
            .into_iter()
            .map(|image| image.url)
            .collect())
    }

    async fn replace_characteristics(
        &self,
        product_id: ProductId,
        characteristics: &[Characteristic],
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        state
            .characteristics
            .insert(product_id, characteristics.to_vec());
        state.writes.characteristic_replacements += 1;
        Ok(())
    }

    async fn load_policy(&self) -> Result<SyncPolicy, RepositoryError> {
        Ok(self.policy())
    }

    async fn save_policy(&self, policy: &SyncPolicy) -> Result<(), RepositoryError> {
        self.state().policy = *policy;
        Ok(())
    }

    async fn insert_webhook_event(
        &self,
        event: &NewWebhookEvent,
    ) -> Result<WebhookEventRecord, RepositoryError> {
        let mut state = self.state();
        if state.unavailable_events.contains(&event.event_id) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        if state.events.iter().any(|e| e.event_id == event.event_id) {
            return Err(StoreState::conflict("webhook event"));
        }
        let record = WebhookEventRecord {
            id: WebhookEventRowId::new(state.next_id()),
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            external_product_id: event.external_product_id,
            payload: event.payload.clone(),
            status: WebhookStatus::Processing,
            last_error: None,
            received_at: Utc::now(),
            processed_at: None,
        };
        state.events.push(record.clone());
        Ok(record)
    }

    async fn finish_webhook_event(
        &self,
        id: WebhookEventRowId,
        status: WebhookStatus,
        last_error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(RepositoryError::NotFound)?;
        event.status = status;
        event.last_error = last_error.map(String::from);
        event.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn stored_webhook_secret(&self) -> Result<Option<SecretString>, RepositoryError> {
        Ok(self.state().webhook_secret.clone())
    }
}

// =============================================================================
// ERP
// =============================================================================

#[derive(Default)]
struct SourceState {
    listing: Vec<ExternalListingItem>,
    details: HashMap<ErpId, ProductDetail>,
    balances: HashMap<ErpId, i32>,
    categories: HashMap<ErpId, String>,
    images: HashMap<String, DownloadedImage>,
    not_linked: bool,
    detail_calls: Vec<ErpId>,
    stock_batches: Vec<usize>,
}

/// [`CatalogSource`] serving canned ERP records.
#[derive(Default)]
pub struct FakeCatalogSource {
    state: Mutex<SourceState>,
}

impl FakeCatalogSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SourceState> {
        lock(&self.state)
    }

    /// Append a row to the flat listing.
    pub fn list(&self, id: i64, name: &str, format: ListingFormat) {
        self.state().listing.push(ExternalListingItem {
            external_id: ErpId::new(id),
            raw_name: name.to_string(),
            format,
        });
    }

    pub fn add_detail(&self, detail: ProductDetail) {
        self.state().details.insert(detail.id, detail);
    }

    pub fn set_balance(&self, id: i64, available: i32) {
        self.state().balances.insert(ErpId::new(id), available);
    }

    pub fn add_category(&self, id: i64, name: &str) {
        self.state()
            .categories
            .insert(ErpId::new(id), name.to_string());
    }

    pub fn add_image(&self, url: &str, bytes: &'static [u8], content_type: &str) {
        self.state().images.insert(
            url.to_string(),
            DownloadedImage {
                bytes: Bytes::from_static(bytes),
                content_type: Some(content_type.to_string()),
            },
        );
    }

    /// Make every call fail as if no ERP account were linked.
    pub fn unlink(&self) {
        self.state().not_linked = true;
    }

    /// Ids passed to `product_detail`, in call order.
    #[must_use]
    pub fn detail_calls(&self) -> Vec<ErpId> {
        self.state().detail_calls.clone()
    }

    /// Size of every `stock_balances` batch, in call order.
    #[must_use]
    pub fn stock_batches(&self) -> Vec<usize> {
        self.state().stock_batches.clone()
    }

    fn check_linked(&self) -> Result<(), ErpError> {
        if self.state().not_linked {
            return Err(ErpError::NotLinked);
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for FakeCatalogSource {
    async fn list_page(&self, page: u32, limit: u32) -> Result<Vec<ExternalListingItem>, ErpError> {
        self.check_linked()?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let start = usize::try_from(page.saturating_sub(1))
            .unwrap_or(usize::MAX)
            .saturating_mul(limit);
        Ok(self
            .state()
            .listing
            .iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn product_detail(&self, id: ErpId) -> Result<Option<ProductDetail>, ErpError> {
        self.check_linked()?;
        let mut state = self.state();
        state.detail_calls.push(id);
        Ok(state.details.get(&id).cloned())
    }

    async fn stock_balances(&self, ids: &[ErpId]) -> Result<Vec<StockBalance>, ErpError> {
        self.check_linked()?;
        if ids.len() > STOCK_BATCH_LIMIT {
            return Err(ErpError::BatchTooLarge(ids.len()));
        }
        let mut state = self.state();
        state.stock_batches.push(ids.len());
        Ok(ids
            .iter()
            .filter_map(|id| {
                state.balances.get(id).map(|&available| StockBalance {
                    product_id: *id,
                    physical: available,
                    available,
                })
            })
            .collect())
    }

    async fn category_name(&self, id: ErpId) -> Result<Option<String>, ErpError> {
        self.check_linked()?;
        Ok(self.state().categories.get(&id).cloned())
    }

    async fn download_image(&self, url: &str) -> Result<DownloadedImage, ErpError> {
        self.check_linked()?;
        self.state()
            .images
            .get(url)
            .cloned()
            .ok_or_else(|| ErpError::Status {
                status: 404,
                body: "image not found".to_string(),
            })
    }
}

/// A detail record with every optional field empty.
#[must_use]
pub fn product_detail(id: i64, name: &str, price: Decimal) -> ProductDetail {
    ProductDetail {
        id: ErpId::new(id),
        name: name.to_string(),
        sku: None,
        price,
        sale_price: None,
        short_description: None,
        description: None,
        format: ListingFormat::Simple,
        is_active: true,
        gtin: None,
        brand: None,
        unit: None,
        weight_kg: None,
        width_cm: None,
        height_cm: None,
        depth_cm: None,
        category_id: None,
        stock: None,
        image_urls: Vec::new(),
        parent_id: None,
        variation_name: None,
        variations: Vec::new(),
        custom_fields: Vec::new(),
    }
}

/// A nested variation with its attributes parsed from `attributes`.
#[must_use]
pub fn variation(id: i64, name: &str, sku: Option<&str>, attributes: &str) -> ErpVariation {
    ErpVariation {
        id: ErpId::new(id),
        name: name.to_string(),
        sku: sku.and_then(|s| Sku::parse(s).ok()),
        price: None,
        is_active: true,
        stock: None,
        attributes: crate::catalog::attribute_pairs(attributes),
    }
}

/// A product insert with only the required fields set.
#[must_use]
pub fn new_product(name: &str, slug: &str, price: Decimal) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        slug: slug.to_string(),
        description: None,
        short_description: None,
        base_price: price,
        sale_price: None,
        category_id: None,
        external_product_id: None,
        sku: None,
        gtin: None,
        weight_kg: None,
        width_cm: None,
        height_cm: None,
        depth_cm: None,
    }
}

/// A variant insert with zero stock and no price modifier.
#[must_use]
pub fn new_variant(product_id: ProductId, size: &str) -> NewVariant {
    NewVariant {
        product_id,
        size: size.to_string(),
        color: None,
        color_hex: None,
        stock_quantity: 0,
        sku: None,
        external_variant_id: None,
        is_active: true,
        price_modifier: Decimal::ZERO,
    }
}

// =============================================================================
// Blob store
// =============================================================================

/// [`BlobStore`] that records uploads.
#[derive(Default)]
pub struct MemoryBlobStore {
    uploads: Mutex<Vec<(String, String)>>,
    failing: Mutex<bool>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following upload.
    pub fn fail_uploads(&self) {
        *lock(&self.failing) = true;
    }

    /// `(key, content type)` of every upload.
    #[must_use]
    pub fn uploads(&self) -> Vec<(String, String)> {
        lock(&self.uploads).clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, key: &str, _bytes: Bytes, content_type: &str) -> Result<(), BlobError> {
        if *lock(&self.failing) {
            return Err(BlobError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        lock(&self.uploads).push((key.to_string(), content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://blobs.test/{key}")
    }
}
