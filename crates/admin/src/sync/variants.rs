//! Variant reconciliation.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use vitrine_core::{ErpId, ProductId, VariantId};

use super::stock::fetch_available;
use super::{SyncEngine, SyncError};
use crate::catalog::{VariationItem, attribute_pairs, extract_attributes};
use crate::erp::{ErpVariation, ProductDetail};
use crate::models::{CanonicalProduct, CanonicalVariant, DEFAULT_SIZE, NewVariant, SyncPolicy};

/// The variant standing in for a product without ERP variations.
///
/// Prefers a variant linked to the product's own ERP id, then an unlinked
/// `"Único"` variant, then the only unlinked variant.
#[must_use]
pub fn default_variant(
    variants: &[CanonicalVariant],
    product_external_id: Option<ErpId>,
) -> Option<&CanonicalVariant> {
    if let Some(external_id) = product_external_id
        && let Some(v) = variants
            .iter()
            .find(|v| v.external_variant_id == Some(external_id))
    {
        return Some(v);
    }

    let unlinked: Vec<&CanonicalVariant> = variants
        .iter()
        .filter(|v| v.external_variant_id.is_none())
        .collect();

    unlinked
        .iter()
        .find(|v| v.size == DEFAULT_SIZE)
        .or_else(|| if unlinked.len() == 1 { unlinked.first() } else { None })
        .copied()
}

/// Price difference of a variation over the product's base price, never
/// negative.
#[must_use]
pub fn price_modifier(variation_price: Option<Decimal>, base_price: Decimal) -> Decimal {
    variation_price
        .map(|p| (p - base_price).max(Decimal::ZERO))
        .unwrap_or_default()
}

/// A variation built from a listed item's own detail record, for children
/// the parent's detail does not nest.
#[must_use]
pub fn variation_from_detail(detail: &ProductDetail, item: &VariationItem) -> ErpVariation {
    let mut attributes = detail
        .variation_name
        .as_deref()
        .map(attribute_pairs)
        .unwrap_or_default();
    if attributes.is_empty() {
        attributes = attribute_pairs(&item.attribute_suffix);
    }

    ErpVariation {
        id: detail.id,
        name: detail.name.clone(),
        sku: detail.sku.clone(),
        price: Some(detail.price).filter(|p| *p > Decimal::ZERO),
        is_active: detail.is_active,
        stock: detail.stock,
        attributes,
    }
}

impl SyncEngine {
    /// Converge a product's variants with the ERP's.
    ///
    /// With `created` set every field is written regardless of policy.
    /// Returns the number of variants matched or created.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the ERP fails.
    #[instrument(skip(self, detail, variations, policy), fields(variations = variations.len()))]
    pub async fn reconcile_variants(
        &self,
        product_id: ProductId,
        base_price: Decimal,
        detail: &ProductDetail,
        variations: &[ErpVariation],
        policy: &SyncPolicy,
        created: bool,
    ) -> Result<usize, SyncError> {
        let locals = self.store.variants_for_product(product_id).await?;

        // Nested variations often come without stock; batch the lookups
        let mut missing: Vec<ErpId> = variations
            .iter()
            .filter(|v| v.stock.is_none())
            .map(|v| v.id)
            .collect();
        if variations.is_empty() && detail.stock.is_none() {
            missing.push(detail.id);
        }
        let balances: HashMap<ErpId, i32> = if missing.is_empty() {
            HashMap::new()
        } else {
            fetch_available(self.source.as_ref(), &missing).await?
        };
        let stock_of =
            |id: ErpId, nested: Option<i32>| nested.or_else(|| balances.get(&id).copied());

        let write_stock = created || policy.sync_stock;
        let mut touched = HashSet::new();

        if variations.is_empty() {
            let stock = stock_of(detail.id, detail.stock);
            let id = self
                .ensure_default_variant(product_id, &locals, detail, stock, write_stock)
                .await?;
            touched.insert(id);
        }

        for variation in variations {
            let existing = locals
                .iter()
                .find(|l| l.external_variant_id == Some(variation.id))
                .or_else(|| {
                    let sku = variation.sku.as_ref()?;
                    if !policy.merge_by_sku && !created {
                        return None;
                    }
                    locals.iter().find(|l| {
                        l.external_variant_id.is_none()
                            && !touched.contains(&l.id)
                            && l.sku.as_ref() == Some(sku)
                    })
                });

            let stock = stock_of(variation.id, variation.stock);

            if let Some(local) = existing {
                touched.insert(local.id);

                if local.external_variant_id.is_none() {
                    match self.store.link_variant(local.id, variation.id).await {
                        Ok(_) => debug!(variant_id = %local.id, external_id = %variation.id, "Linked variant by SKU"),
                        Err(e) if e.is_conflict() => {
                            warn!(variant_id = %local.id, external_id = %variation.id, "Variant link held by another variant");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                if write_stock
                    && let Some(q) = stock
                    && q != local.stock_quantity
                {
                    self.store.set_variant_stock(local.id, q).await?;
                }
                if (created || policy.sync_variant_active) && variation.is_active != local.is_active {
                    self.store
                        .set_variant_active(local.id, variation.is_active)
                        .await?;
                }
                continue;
            }

            let attributes = extract_attributes(&variation.name, &variation.attributes);
            let new_variant = NewVariant {
                product_id,
                size: attributes.size,
                color: attributes.color,
                color_hex: attributes.color_hex,
                stock_quantity: stock.unwrap_or(0),
                sku: variation.sku.clone(),
                external_variant_id: Some(variation.id),
                is_active: variation.is_active,
                price_modifier: price_modifier(variation.price, base_price),
            };

            match self.store.insert_variant(&new_variant).await {
                Ok(v) => {
                    touched.insert(v.id);
                }
                Err(e) if e.is_conflict() => {
                    warn!(external_id = %variation.id, "Variation already linked to another product");
                }
                Err(e) => return Err(e.into()),
            }
        }

        // A product always keeps at least one sellable variant
        if touched.is_empty() {
            debug!(product_id = %product_id, "No variation resolved, keeping the default variant");
            let id = self
                .ensure_default_variant(product_id, &locals, detail, detail.stock, write_stock)
                .await?;
            touched.insert(id);
        }

        for stale in locals
            .iter()
            .filter(|l| l.external_variant_id.is_some() && !touched.contains(&l.id))
        {
            debug!(variant_id = %stale.id, "Deleting variant no longer in the ERP");
            self.store.delete_variant(stale.id).await?;
        }

        Ok(touched.len())
    }

    /// The product's `Único` variant, created when missing.
    async fn ensure_default_variant(
        &self,
        product_id: ProductId,
        locals: &[CanonicalVariant],
        detail: &ProductDetail,
        stock: Option<i32>,
        write_stock: bool,
    ) -> Result<VariantId, SyncError> {
        if let Some(existing) = default_variant(locals, Some(detail.id)) {
            if write_stock
                && let Some(q) = stock
                && q != existing.stock_quantity
            {
                self.store.set_variant_stock(existing.id, q).await?;
            }
            return Ok(existing.id);
        }

        let created = self
            .store
            .insert_variant(&NewVariant {
                product_id,
                size: DEFAULT_SIZE.to_string(),
                color: None,
                color_hex: None,
                stock_quantity: stock.unwrap_or(0),
                sku: detail.sku.clone(),
                external_variant_id: None,
                is_active: true,
                price_modifier: Decimal::ZERO,
            })
            .await?;
        Ok(created.id)
    }
}

impl SyncEngine {
    /// Backfill missing variant links of a linked product by matching SKUs
    /// against the ERP's variations. Returns the number of links written.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the ERP fails, or the ERP no longer
    /// knows the product.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn relink_variants(&self, product: &CanonicalProduct) -> Result<usize, SyncError> {
        let Some(external_id) = product.external_product_id else {
            return Ok(0);
        };
        let detail = self
            .source
            .product_detail(external_id)
            .await?
            .ok_or(SyncError::MissingRecord(external_id))?;

        let locals = self.store.variants_for_product(product.id).await?;
        let mut relinked = 0;
        for local in locals.iter().filter(|l| l.external_variant_id.is_none()) {
            let Some(sku) = &local.sku else { continue };
            let Some(variation) = detail
                .variations
                .iter()
                .find(|v| v.sku.as_ref() == Some(sku))
            else {
                continue;
            };

            match self.store.link_variant(local.id, variation.id).await {
                Ok(true) => relinked += 1,
                Ok(false) => {}
                Err(e) if e.is_conflict() => {
                    warn!(variant_id = %local.id, external_id = %variation.id, "Variant link held by another variant");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(relinked)
    }
}
