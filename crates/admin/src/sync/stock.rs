//! Stock primitives shared by the webhook path and the batch refresh.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, instrument};

use vitrine_core::{ErpId, VariantId};

use super::variants::default_variant;
use super::{SyncEngine, SyncError};
use crate::erp::{CatalogSource, ErpError, STOCK_BATCH_LIMIT};
use crate::models::{CanonicalProduct, CanonicalVariant};

/// Available stock for `ids`, fetched in batches of at most
/// [`STOCK_BATCH_LIMIT`]. Ids the ERP does not report are absent.
///
/// # Errors
///
/// Returns the first failing batch's error.
pub async fn fetch_available(
    source: &dyn CatalogSource,
    ids: &[ErpId],
) -> Result<HashMap<ErpId, i32>, ErpError> {
    let mut balances = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(STOCK_BATCH_LIMIT) {
        for balance in source.stock_balances(chunk).await? {
            balances.insert(balance.product_id, balance.available);
        }
    }
    Ok(balances)
}

/// How a stock event found its variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLink {
    /// By `external_variant_id`.
    Variant,
    /// As the default variant of the product with that external id.
    DefaultVariant,
    /// By SKU from the ERP detail; `backfilled` when the link was written.
    Sku { backfilled: bool },
}

/// Result of applying one stock quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum StockApplied {
    Updated {
        variant_id: VariantId,
        quantity: i32,
        link: StockLink,
        reactivated: bool,
    },
    Unchanged {
        variant_id: VariantId,
        link: StockLink,
    },
    /// No local variant matches the id.
    NotFound,
    /// The product was deactivated by an operator.
    InactiveProduct,
}

/// Outcome of one batch stock refresh window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRefresh {
    pub processed: usize,
    pub updated: usize,
    pub reactivated: usize,
    pub next_offset: Option<usize>,
}

impl SyncEngine {
    /// Find the local variant an ERP stock id refers to.
    ///
    /// Tries the variant link, then the default variant of a linked
    /// product, then the SKU of the ERP record. A SKU hit on an unlinked
    /// variant writes the link so the next event resolves directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the ERP fails.
    #[instrument(skip(self))]
    pub async fn resolve_stock_target(
        &self,
        external_id: ErpId,
    ) -> Result<Option<(CanonicalVariant, StockLink)>, SyncError> {
        if let Some(variant) = self.store.variant_by_external_id(external_id).await? {
            return Ok(Some((variant, StockLink::Variant)));
        }

        if let Some(product) = self.store.product_by_external_id(external_id).await? {
            let variants = self.store.variants_for_product(product.id).await?;
            if let Some(variant) = default_variant(&variants, Some(external_id)) {
                return Ok(Some((variant.clone(), StockLink::DefaultVariant)));
            }
        }

        let Some(detail) = self.source.product_detail(external_id).await? else {
            return Ok(None);
        };
        let Some(sku) = detail.sku else {
            return Ok(None);
        };
        let Some(mut variant) = self.store.variant_by_sku(&sku).await? else {
            return Ok(None);
        };

        let mut backfilled = false;
        if variant.external_variant_id.is_none() {
            match self.store.link_variant(variant.id, external_id).await {
                Ok(linked) => {
                    backfilled = linked;
                    if linked {
                        variant.external_variant_id = Some(external_id);
                        info!(variant_id = %variant.id, sku = %sku, "Backfilled variant link from SKU");
                    }
                }
                Err(e) if e.is_conflict() => {
                    debug!(variant_id = %variant.id, "Variant link taken concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Some((variant, StockLink::Sku { backfilled })))
    }

    /// Apply a stock quantity for an ERP id.
    ///
    /// With no quantity the current balance is fetched. Products
    /// deactivated by sync come back once a variant has stock again;
    /// products an operator deactivated are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the ERP fails.
    #[instrument(skip(self))]
    pub async fn apply_stock(
        &self,
        external_id: ErpId,
        quantity: Option<i32>,
    ) -> Result<StockApplied, SyncError> {
        let Some((variant, link)) = self.resolve_stock_target(external_id).await? else {
            return Ok(StockApplied::NotFound);
        };

        let Some(product) = self.store.product_by_id(variant.product_id).await? else {
            return Ok(StockApplied::NotFound);
        };
        if !product.is_active && !product.deactivated_by_sync {
            return Ok(StockApplied::InactiveProduct);
        }

        let quantity = match quantity {
            Some(q) => q.max(0),
            None => {
                let balances = fetch_available(self.source.as_ref(), &[external_id]).await?;
                match balances.get(&external_id) {
                    Some(q) => *q,
                    None => return Ok(StockApplied::Unchanged { variant_id: variant.id, link }),
                }
            }
        };

        // Inactive products are written only together with their reactivation
        if !product.is_active && quantity <= 0 {
            return Ok(StockApplied::InactiveProduct);
        }

        let reactivated = self.reactivate_if_restocked(&product, quantity).await?;
        if quantity == variant.stock_quantity && !reactivated {
            return Ok(StockApplied::Unchanged {
                variant_id: variant.id,
                link,
            });
        }

        self.store.set_variant_stock(variant.id, quantity).await?;
        Ok(StockApplied::Updated {
            variant_id: variant.id,
            quantity,
            link,
            reactivated,
        })
    }

    /// Reactivate a sync-deactivated product that has stock again.
    async fn reactivate_if_restocked(
        &self,
        product: &CanonicalProduct,
        quantity: i32,
    ) -> Result<bool, SyncError> {
        if product.is_active || !product.deactivated_by_sync || quantity <= 0 {
            return Ok(false);
        }
        self.store.set_product_active(product.id, true, false).await?;
        self.store
            .set_product_variants_active(product.id, true)
            .await?;
        info!(product_id = %product.id, "Reactivated product after restock");
        Ok(true)
    }

    /// Refresh stock of a window of linked products from the ERP.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the ERP fails.
    #[instrument(skip(self))]
    pub async fn refresh_stock(&self, offset: usize, limit: usize) -> Result<StockRefresh, SyncError> {
        let fetch = i64::try_from(limit.saturating_add(1)).unwrap_or(i64::MAX);
        let start = i64::try_from(offset).unwrap_or(i64::MAX);
        let mut products = self.store.linked_products(start, fetch).await?;

        let next_offset = (products.len() > limit).then(|| offset + limit);
        products.truncate(limit);

        // (variant, its ERP id) for every stock-bearing variant in the window
        let mut targets: Vec<(CanonicalProduct, CanonicalVariant, ErpId)> = Vec::new();
        for product in &products {
            if !product.is_active && !product.deactivated_by_sync {
                continue;
            }
            let variants = self.store.variants_for_product(product.id).await?;
            let linked: Vec<&CanonicalVariant> = variants
                .iter()
                .filter(|v| v.external_variant_id.is_some())
                .collect();

            if linked.is_empty() {
                if let (Some(default), Some(external_id)) = (
                    default_variant(&variants, product.external_product_id),
                    product.external_product_id,
                ) {
                    targets.push((product.clone(), default.clone(), external_id));
                }
            } else {
                for v in linked {
                    if let Some(external_id) = v.external_variant_id {
                        targets.push((product.clone(), v.clone(), external_id));
                    }
                }
            }
        }

        let ids: Vec<ErpId> = targets.iter().map(|(_, _, id)| *id).collect();
        let balances = fetch_available(self.source.as_ref(), &ids).await?;

        let mut report = StockRefresh {
            processed: products.len(),
            next_offset,
            ..StockRefresh::default()
        };
        let mut reactivated: Vec<_> = Vec::new();
        for (product, variant, external_id) in &targets {
            let Some(&quantity) = balances.get(external_id) else {
                continue;
            };
            if !product.is_active && !reactivated.contains(&product.id) {
                if !self.reactivate_if_restocked(product, quantity).await? {
                    continue;
                }
                reactivated.push(product.id);
            }
            if quantity != variant.stock_quantity {
                self.store.set_variant_stock(variant.id, quantity).await?;
                report.updated += 1;
            }
        }
        report.reactivated = reactivated.len();

        info!(
            processed = report.processed,
            updated = report.updated,
            reactivated = report.reactivated,
            "Stock refresh window complete"
        );
        Ok(report)
    }
}
