//! Reconciliation of one product group.
//!
//! # Resolution order
//!
//! 1. the product linked to the parent's ERP id
//! 2. with `merge_by_sku`, a product or variant sharing a SKU with the ERP
//!    record or any of its variations (the link is written once)
//! 3. with `import_new_products`, a new product
//!
//! A resolved product that is inactive is never written.

use std::collections::HashSet;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use vitrine_core::{ErpId, SyncOutcome};

use super::variants::variation_from_detail;
use super::{GroupReport, RunState, SyncEngine, SyncError};
use crate::catalog::ProductGroup;
use crate::catalog::text::slugify;
use crate::erp::{ErpVariation, ProductDetail};
use crate::models::{
    CanonicalProduct, Characteristic, NewProduct, ProductUpdate, SyncPolicy,
};

/// How the group's canonical product was found.
enum Resolution {
    Linked(CanonicalProduct),
    BySku(CanonicalProduct),
    New,
}

/// Fields of an existing product the policy allows the ERP to overwrite.
///
/// `is_active`, `slug` and `category_id` are never part of an update.
#[must_use]
pub fn product_update(detail: &ProductDetail, name: &str, policy: &SyncPolicy) -> ProductUpdate {
    let mut update = ProductUpdate::default();

    if policy.sync_titles && !name.trim().is_empty() {
        update.name = Some(name.trim().to_string());
    }
    if policy.sync_descriptions {
        update.description.clone_from(&detail.description);
        update.short_description.clone_from(&detail.short_description);
    }
    if policy.sync_prices && detail.price > Decimal::ZERO {
        update.base_price = Some(detail.price);
        update.sale_price = Some(effective_sale_price(detail));
    }
    if policy.sync_dimensions {
        update.weight_kg = detail.weight_kg;
        update.width_cm = detail.width_cm;
        update.height_cm = detail.height_cm;
        update.depth_cm = detail.depth_cm;
    }
    if policy.sync_sku_gtin {
        update.sku.clone_from(&detail.sku);
        update.gtin.clone_from(&detail.gtin);
    }

    update
}

/// The promotional price, if it is actually below the regular price.
#[must_use]
pub fn effective_sale_price(detail: &ProductDetail) -> Option<Decimal> {
    detail.sale_price.filter(|sale| *sale < detail.price)
}

/// Brand, unit and custom fields as product characteristics.
#[must_use]
pub fn characteristics(detail: &ProductDetail) -> Vec<Characteristic> {
    let fixed = [("Marca", &detail.brand), ("Unidade", &detail.unit)];
    fixed
        .into_iter()
        .filter_map(|(name, value)| {
            value.as_ref().map(|v| Characteristic {
                name: name.to_string(),
                value: v.clone(),
            })
        })
        .chain(detail.custom_fields.iter().map(|(name, value)| Characteristic {
            name: name.clone(),
            value: value.clone(),
        }))
        .collect()
}

impl SyncEngine {
    /// Reconcile one group into the canonical catalog.
    ///
    /// Per-group failures are reported as [`SyncOutcome::Error`] so the run
    /// can continue.
    ///
    /// # Errors
    ///
    /// Returns only errors that make the whole run pointless (unlinked or
    /// rejected ERP credentials).
    #[instrument(
        skip(self, group, policy, run),
        fields(external_id = %group.parent_external_id, name = %group.display_name())
    )]
    pub async fn reconcile_group(
        &self,
        group: &ProductGroup,
        policy: &SyncPolicy,
        run: &mut RunState,
    ) -> Result<GroupReport, SyncError> {
        match self.reconcile(group, policy, run).await {
            Ok(report) => {
                debug!(status = %report.status, variants = report.variants, "Group reconciled");
                Ok(report)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "Group reconciliation failed");
                Ok(GroupReport::new(
                    group.parent_external_id,
                    group.display_name(),
                    SyncOutcome::Error,
                )
                .with_message(e.to_string()))
            }
        }
    }

    async fn reconcile(
        &self,
        group: &ProductGroup,
        policy: &SyncPolicy,
        run: &mut RunState,
    ) -> Result<GroupReport, SyncError> {
        let listed_id = group.parent_external_id;
        let duplicate = |id: ErpId, name: &str| {
            GroupReport::new(id, name, SyncOutcome::SkippedDuplicate)
                .with_message("parent already handled in this run")
        };

        if run.handled_parents.contains(&listed_id) {
            return Ok(duplicate(listed_id, group.display_name()));
        }

        let mut detail = self.fetch_detail(listed_id).await?;
        let mut redirected = false;
        if let Some(parent_id) = detail.redirect_parent() {
            run.handled_parents.insert(listed_id);
            if run.handled_parents.contains(&parent_id) {
                return Ok(duplicate(parent_id, group.display_name()));
            }
            debug!(parent_id = %parent_id, "Listed item is a variation, redirecting to parent");
            detail = self.fetch_detail(parent_id).await?;
            redirected = true;
        }
        run.handled_parents.insert(listed_id);
        run.handled_parents.insert(detail.id);

        // A parentless cluster that did not redirect stands on its first
        // child's record; name the product after the cluster instead
        let detail_is_child = !redirected
            && group.parent_list_item.is_none()
            && group.variation_items.iter().any(|v| v.external_id == listed_id);
        let name = if detail_is_child {
            group.display_name().to_string()
        } else {
            detail.name.clone()
        };

        let variations = self.collect_variations(&detail, group, detail_is_child).await?;

        let report = match self.resolve_product(&detail, &variations, policy).await? {
            Resolution::Linked(product) | Resolution::BySku(product) if !product.is_active => {
                GroupReport::new(detail.id, &name, SyncOutcome::IgnoredInactive)
            }
            Resolution::Linked(product) => {
                let variants = self
                    .update_existing(&product, &detail, &name, &variations, policy)
                    .await?;
                GroupReport::new(detail.id, &name, SyncOutcome::Updated).with_variants(variants)
            }
            Resolution::BySku(product) => {
                match self.store.link_product(product.id, detail.id).await {
                    Ok(true) => {
                        info!(product_id = %product.id, "Linked existing product by SKU");
                    }
                    Ok(false) => {
                        return Ok(duplicate(detail.id, name.as_str())
                            .with_message("product was linked concurrently"));
                    }
                    Err(e) if e.is_conflict() => {
                        return Ok(duplicate(detail.id, name.as_str())
                            .with_message("external id already linked to another product"));
                    }
                    Err(e) => return Err(e.into()),
                }
                let variants = self
                    .update_existing(&product, &detail, &name, &variations, policy)
                    .await?;
                GroupReport::new(detail.id, &name, SyncOutcome::LinkedBySku).with_variants(variants)
            }
            Resolution::New if !policy.import_new_products => {
                GroupReport::new(detail.id, &name, SyncOutcome::SkippedImportDisabled)
            }
            Resolution::New => match self.create_product(&detail, &name, &variations, policy).await {
                Ok(variants) => {
                    GroupReport::new(detail.id, &name, SyncOutcome::Imported).with_variants(variants)
                }
                Err(SyncError::Store(e)) if e.is_conflict() => {
                    duplicate(detail.id, name.as_str()).with_message("product was created concurrently")
                }
                Err(e) => return Err(e),
            },
        };

        Ok(report)
    }

    async fn fetch_detail(&self, id: ErpId) -> Result<ProductDetail, SyncError> {
        self.source
            .product_detail(id)
            .await?
            .ok_or(SyncError::MissingRecord(id))
    }

    /// The parent's nested variations plus any listed child the parent
    /// record does not nest.
    async fn collect_variations(
        &self,
        detail: &ProductDetail,
        group: &ProductGroup,
        detail_is_child: bool,
    ) -> Result<Vec<ErpVariation>, SyncError> {
        let mut variations = detail.variations.clone();
        let mut known: HashSet<ErpId> = variations.iter().map(|v| v.id).collect();

        for item in &group.variation_items {
            if known.contains(&item.external_id) {
                continue;
            }
            if item.external_id == detail.id {
                if detail_is_child {
                    variations.push(variation_from_detail(detail, item));
                    known.insert(item.external_id);
                }
                continue;
            }
            match self.source.product_detail(item.external_id).await? {
                Some(child) => {
                    variations.push(variation_from_detail(&child, item));
                    known.insert(item.external_id);
                }
                None => warn!(external_id = %item.external_id, "Listed variation missing from ERP"),
            }
        }

        Ok(variations)
    }

    async fn resolve_product(
        &self,
        detail: &ProductDetail,
        variations: &[ErpVariation],
        policy: &SyncPolicy,
    ) -> Result<Resolution, SyncError> {
        if let Some(product) = self.store.product_by_external_id(detail.id).await? {
            return Ok(Resolution::Linked(product));
        }
        if !policy.merge_by_sku {
            return Ok(Resolution::New);
        }

        let skus = detail
            .sku
            .iter()
            .chain(variations.iter().filter_map(|v| v.sku.as_ref()));
        for sku in skus {
            let candidate = match self.store.variant_by_sku(sku).await? {
                Some(variant) => self.store.product_by_id(variant.product_id).await?,
                None => self.store.product_by_sku(sku).await?,
            };
            if let Some(product) = candidate {
                if product.external_product_id.is_none() {
                    return Ok(Resolution::BySku(product));
                }
                debug!(sku = %sku, product_id = %product.id, "SKU match already linked elsewhere");
            }
        }

        Ok(Resolution::New)
    }

    async fn update_existing(
        &self,
        product: &CanonicalProduct,
        detail: &ProductDetail,
        name: &str,
        variations: &[ErpVariation],
        policy: &SyncPolicy,
    ) -> Result<usize, SyncError> {
        let update = product_update(detail, name, policy);
        if !update.is_empty() {
            self.store.update_product(product.id, &update).await?;
        }
        if policy.sync_descriptions {
            let characteristics = characteristics(detail);
            if !characteristics.is_empty() {
                self.store
                    .replace_characteristics(product.id, &characteristics)
                    .await?;
            }
        }
        if policy.sync_images {
            self.rehost_images(product.id, &detail.image_urls, name)
                .await?;
        }

        let base_price = update.base_price.unwrap_or(product.base_price);
        self.reconcile_variants(product.id, base_price, detail, variations, policy, false)
            .await
    }

    async fn create_product(
        &self,
        detail: &ProductDetail,
        name: &str,
        variations: &[ErpVariation],
        policy: &SyncPolicy,
    ) -> Result<usize, SyncError> {
        let category_id = match self.resolve_category(detail.category_id).await {
            Ok(id) => id,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Category resolution failed, importing without category");
                None
            }
        };

        let slug = self.unique_product_slug(name, detail.id).await?;
        let product = self
            .store
            .insert_product(&NewProduct {
                name: name.trim().to_string(),
                slug,
                description: detail.description.clone(),
                short_description: detail.short_description.clone(),
                base_price: detail.price,
                sale_price: effective_sale_price(detail),
                category_id,
                external_product_id: Some(detail.id),
                sku: detail.sku.clone(),
                gtin: detail.gtin.clone(),
                weight_kg: detail.weight_kg,
                width_cm: detail.width_cm,
                height_cm: detail.height_cm,
                depth_cm: detail.depth_cm,
            })
            .await?;
        info!(product_id = %product.id, slug = %product.slug, "Imported product");

        let characteristics = characteristics(detail);
        if !characteristics.is_empty() {
            self.store
                .replace_characteristics(product.id, &characteristics)
                .await?;
        }
        self.rehost_images(product.id, &detail.image_urls, name)
            .await?;

        self.reconcile_variants(product.id, detail.price, detail, variations, policy, true)
            .await
    }

    async fn unique_product_slug(&self, name: &str, external_id: ErpId) -> Result<String, SyncError> {
        let base = slugify(name);
        let base = if base.is_empty() {
            format!("produto-{external_id}")
        } else {
            base
        };

        // Probe a bounded number of suffixes before falling back to the id
        for candidate in std::iter::once(base.clone()).chain((2..=10).map(|n| format!("{base}-{n}"))) {
            if !self.store.product_slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Ok(format!("{base}-{external_id}"))
    }
}
