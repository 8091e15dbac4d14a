//! Operator-facing sync actions.
//!
//! A [`SyncRunner`] executes one [`SyncRequest`] and always answers with a
//! [`SyncSummary`]. Long runs are windowed with `offset`/`limit` over the
//! classified group list so a scheduler can drive a full sync through many
//! short invocations, following `nextOffset` until it is absent.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use vitrine_core::{ErpId, SyncOutcome};

use super::cleanup::cleanup_candidates;
use super::{GroupReport, RunState, SyncEngine, SyncError};
use crate::catalog::{
    ClassifiedListing, ExternalListingItem, attribute_pairs, classify, extract_attributes,
    parse_name,
};

/// Listing page size requested from the ERP.
pub const LISTING_PAGE_SIZE: u32 = 100;

/// Upper bound on listing pages fetched in one run.
pub const MAX_LISTING_PAGES: u32 = 500;

/// Default window of a stock refresh.
pub const DEFAULT_STOCK_WINDOW: usize = 200;

/// Default window of a relink pass.
pub const DEFAULT_RELINK_WINDOW: usize = 50;

// =============================================================================
// Request
// =============================================================================

/// Actions accepted by `POST /sync` and `vitrine-cli sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// Reconcile the listing under the stored policy.
    SyncProducts,
    /// One-way bootstrap with every flag on.
    FirstImport,
    /// Refresh stock of linked products.
    SyncStock,
    /// Backfill missing variant links by SKU.
    RelinkVariants,
    /// Purge products imported from variation items.
    CleanupVariations,
    /// Dump the ERP and local view of one product.
    DebugProduct,
}

impl SyncAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SyncProducts => "sync_products",
            Self::FirstImport => "first_import",
            Self::SyncStock => "sync_stock",
            Self::RelinkVariants => "relink_variants",
            Self::CleanupVariations => "cleanup_variations",
            Self::DebugProduct => "debug_product",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().replace('-', "_").as_str() {
            "sync_products" => Ok(Self::SyncProducts),
            "first_import" => Ok(Self::FirstImport),
            "sync_stock" => Ok(Self::SyncStock),
            "relink_variants" => Ok(Self::RelinkVariants),
            "cleanup_variations" => Ok(Self::CleanupVariations),
            "debug_product" => Ok(Self::DebugProduct),
            other => Err(SyncError::InvalidRequest(format!("unknown action: {other}"))),
        }
    }
}

/// A sync invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub action: SyncAction,
    #[serde(default)]
    pub offset: usize,
    /// Window size; the whole list when absent.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Skip groups whose parent is already linked.
    #[serde(default)]
    pub only_new: bool,
    /// Target of `debug_product`.
    #[serde(default)]
    pub external_id: Option<ErpId>,
}

impl SyncRequest {
    /// A request for `action` over the whole list.
    #[must_use]
    pub const fn new(action: SyncAction) -> Self {
        Self {
            action,
            offset: 0,
            limit: None,
            only_new: false,
            external_id: None,
        }
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Structured result of a sync invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub action: SyncAction,
    pub total_groups: usize,
    pub processed: usize,
    pub imported: usize,
    pub updated: usize,
    pub linked_by_sku: usize,
    pub skipped: usize,
    pub ignored_inactive: usize,
    pub errors: usize,
    pub cleaned: usize,
    pub stock_updated: usize,
    pub relinked: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
    pub first_import_completed: bool,
    pub log: Vec<GroupReport>,
    pub log_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Value>,
    #[serde(skip)]
    log_cap: usize,
}

impl SyncSummary {
    /// An empty summary keeping at most `log_cap` log entries.
    #[must_use]
    pub const fn new(action: SyncAction, log_cap: usize) -> Self {
        Self {
            action,
            total_groups: 0,
            processed: 0,
            imported: 0,
            updated: 0,
            linked_by_sku: 0,
            skipped: 0,
            ignored_inactive: 0,
            errors: 0,
            cleaned: 0,
            stock_updated: 0,
            relinked: 0,
            next_offset: None,
            first_import_completed: false,
            log: Vec::new(),
            log_truncated: false,
            debug: None,
            log_cap,
        }
    }

    /// Count a group report and append it to the log while there is room.
    pub fn record(&mut self, report: GroupReport) {
        self.processed += 1;
        match report.status {
            SyncOutcome::Imported => self.imported += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::LinkedBySku => self.linked_by_sku += 1,
            SyncOutcome::IgnoredInactive => self.ignored_inactive += 1,
            SyncOutcome::SkippedImportDisabled | SyncOutcome::SkippedDuplicate => {
                self.skipped += 1;
            }
            SyncOutcome::Error => self.errors += 1,
        }

        if self.log.len() < self.log_cap {
            self.log.push(report);
        } else {
            self.log_truncated = true;
        }
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Executes sync requests against a [`SyncEngine`].
#[derive(Clone)]
pub struct SyncRunner {
    engine: SyncEngine,
    log_cap: usize,
}

impl SyncRunner {
    #[must_use]
    pub const fn new(engine: SyncEngine, log_cap: usize) -> Self {
        Self { engine, log_cap }
    }

    #[must_use]
    pub const fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Execute one request.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that make the whole request
    /// pointless: unusable ERP credentials, a rejected policy transition, an
    /// incomplete request, or a store that cannot load the policy. Per-item
    /// failures are counted in the summary.
    #[instrument(skip(self), fields(action = %request.action))]
    pub async fn run(&self, request: &SyncRequest) -> Result<SyncSummary, SyncError> {
        let mut summary = SyncSummary::new(request.action, self.log_cap);

        match request.action {
            SyncAction::SyncProducts | SyncAction::FirstImport => {
                self.sync_products(request, &mut summary).await?;
            }
            SyncAction::SyncStock => self.sync_stock(request, &mut summary).await?,
            SyncAction::RelinkVariants => self.relink(request, &mut summary).await?,
            SyncAction::CleanupVariations => {
                let listing = self.classified_listing().await?;
                summary.total_groups = listing.groups.len();
                summary.cleaned = self.cleanup(&listing, &HashSet::new()).await?;
            }
            SyncAction::DebugProduct => {
                let external_id = request.external_id.ok_or_else(|| {
                    SyncError::InvalidRequest("debug_product requires externalId".to_string())
                })?;
                summary.debug = Some(self.debug_product(external_id).await?);
            }
        }

        info!(
            processed = summary.processed,
            imported = summary.imported,
            updated = summary.updated,
            linked_by_sku = summary.linked_by_sku,
            skipped = summary.skipped,
            errors = summary.errors,
            cleaned = summary.cleaned,
            next_offset = ?summary.next_offset,
            "Sync finished"
        );
        Ok(summary)
    }

    /// Fetch the whole listing, stopping on an empty or short page.
    ///
    /// # Errors
    ///
    /// Returns an error if a listing page cannot be fetched.
    pub async fn fetch_listing(&self) -> Result<Vec<ExternalListingItem>, SyncError> {
        let mut items = Vec::new();
        for page in 1..=MAX_LISTING_PAGES {
            let rows = self
                .engine
                .source()
                .list_page(page, LISTING_PAGE_SIZE)
                .await?;
            let short = rows.len() < usize::try_from(LISTING_PAGE_SIZE).unwrap_or(usize::MAX);
            items.extend(rows);
            if short {
                return Ok(items);
            }
        }
        warn!(pages = MAX_LISTING_PAGES, "Listing page limit reached");
        Ok(items)
    }

    async fn classified_listing(&self) -> Result<ClassifiedListing, SyncError> {
        let items = self.fetch_listing().await?;
        let listing = classify(&items);
        info!(
            items = items.len(),
            groups = listing.groups.len(),
            variations = listing.variation_ids.len(),
            "Listing classified"
        );
        Ok(listing)
    }

    async fn sync_products(
        &self,
        request: &SyncRequest,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let store = self.engine.store();
        let mut policy = store.load_policy().await?;
        let first_import = request.action == SyncAction::FirstImport;
        if first_import {
            policy = policy.begin_first_import()?;
            store.save_policy(&policy).await?;
        }

        let listing = self.classified_listing().await?;
        let total = listing.groups.len();
        summary.total_groups = total;

        let start = request.offset.min(total);
        let end = request
            .limit
            .map_or(total, |limit| start.saturating_add(limit).min(total));
        let window = listing.groups.get(start..end).unwrap_or_default();

        // Window bounds apply to the full list so offsets stay stable
        // between invocations; linked groups are skipped inside the window
        let linked: HashSet<ErpId> = if request.only_new {
            let ids: Vec<ErpId> = window.iter().map(|g| g.parent_external_id).collect();
            store.linked_external_ids(&ids).await?
        } else {
            HashSet::new()
        };

        let mut run = RunState::new();
        for group in window {
            if linked.contains(&group.parent_external_id) {
                continue;
            }
            let report = self.engine.reconcile_group(group, &policy, &mut run).await?;
            summary.record(report);
        }

        summary.next_offset = (end < total).then_some(end);
        if summary.next_offset.is_some() {
            return Ok(());
        }

        if !request.only_new {
            summary.cleaned = self.cleanup(&listing, run.handled_parents()).await?;
        }
        if first_import {
            store.save_policy(&policy.complete_first_import()).await?;
            summary.first_import_completed = true;
            info!("First import completed, policy reset to stock-only");
        }
        Ok(())
    }

    async fn cleanup(
        &self,
        listing: &ClassifiedListing,
        handled: &HashSet<ErpId>,
    ) -> Result<usize, SyncError> {
        let mut parents: HashSet<ErpId> =
            listing.groups.iter().map(|g| g.parent_external_id).collect();
        parents.extend(handled.iter().copied());

        let candidates = cleanup_candidates(&listing.variation_ids, &parents);
        let report = self.engine.purge_variation_products(&candidates).await?;
        if report.skipped_inactive > 0 {
            info!(skipped = report.skipped_inactive, "Inactive variation products kept");
        }
        Ok(report.cleaned)
    }

    async fn sync_stock(
        &self,
        request: &SyncRequest,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let policy = self.engine.store().load_policy().await?;
        if !policy.sync_stock {
            info!("Stock sync disabled by policy");
            return Ok(());
        }

        let limit = request.limit.unwrap_or(DEFAULT_STOCK_WINDOW);
        let refresh = self.engine.refresh_stock(request.offset, limit).await?;
        summary.processed = refresh.processed;
        summary.stock_updated = refresh.updated;
        summary.next_offset = refresh.next_offset;
        Ok(())
    }

    async fn relink(&self, request: &SyncRequest, summary: &mut SyncSummary) -> Result<(), SyncError> {
        let limit = request.limit.unwrap_or(DEFAULT_RELINK_WINDOW);
        let fetch = i64::try_from(limit.saturating_add(1)).unwrap_or(i64::MAX);
        let start = i64::try_from(request.offset).unwrap_or(i64::MAX);

        let mut products = self.engine.store().linked_products(start, fetch).await?;
        summary.next_offset = (products.len() > limit).then(|| request.offset + limit);
        products.truncate(limit);

        for product in products.iter().filter(|p| p.is_active) {
            let Some(external_id) = product.external_product_id else {
                continue;
            };
            match self.engine.relink_variants(product).await {
                Ok(count) => {
                    summary.relinked += count;
                    summary.record(
                        GroupReport::new(external_id, &product.name, SyncOutcome::Updated)
                            .with_variants(count),
                    );
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(product_id = %product.id, error = %e, "Relink failed");
                    summary.record(
                        GroupReport::new(external_id, &product.name, SyncOutcome::Error)
                            .with_message(e.to_string()),
                    );
                }
            }
        }
        Ok(())
    }

    /// The ERP records, classifier view and local state of one product.
    async fn debug_product(&self, external_id: ErpId) -> Result<serde_json::Value, SyncError> {
        let source = self.engine.source();
        let store = self.engine.store();

        let detail = source
            .product_detail(external_id)
            .await?
            .ok_or(SyncError::MissingRecord(external_id))?;
        let parent = match detail.redirect_parent() {
            Some(parent_id) => source.product_detail(parent_id).await?,
            None => None,
        };

        let structured = detail
            .variation_name
            .as_deref()
            .map(attribute_pairs)
            .unwrap_or_default();
        let attributes = extract_attributes(&detail.name, &structured);
        let variations: Vec<serde_json::Value> = detail
            .variations
            .iter()
            .map(|v| {
                serde_json::json!({
                    "id": v.id,
                    "name": v.name,
                    "parsed": parse_name(&v.name),
                    "attributes": extract_attributes(&v.name, &v.attributes),
                })
            })
            .collect();

        let local_key = parent.as_ref().map_or(detail.id, |p| p.id);
        let product = store.product_by_external_id(local_key).await?;
        let (variants, images) = match &product {
            Some(p) => (
                store.variants_for_product(p.id).await?,
                store.image_urls(p.id).await?,
            ),
            None => (Vec::new(), Vec::new()),
        };
        let variant = store.variant_by_external_id(external_id).await?;
        let policy = store.load_policy().await?;

        Ok(serde_json::json!({
            "detail": detail,
            "parent": parent,
            "parsedName": parse_name(&detail.name),
            "attributes": attributes,
            "variations": variations,
            "local": {
                "product": product,
                "variants": variants,
                "images": images,
                "variant": variant,
            },
            "policy": policy,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn report(status: SyncOutcome) -> GroupReport {
        GroupReport::new(ErpId::new(1), "Produto", status)
    }

    #[test]
    fn test_action_parses_wire_and_cli_names() {
        assert_eq!("first_import".parse::<SyncAction>().unwrap(), SyncAction::FirstImport);
        assert_eq!("sync-stock".parse::<SyncAction>().unwrap(), SyncAction::SyncStock);
        assert!("reindex".parse::<SyncAction>().is_err());
        assert_eq!(SyncAction::DebugProduct.to_string(), "debug_product");
    }

    #[test]
    fn test_request_defaults() {
        let request: SyncRequest = serde_json::from_str(r#"{"action":"sync_products"}"#).unwrap();
        assert_eq!(request, SyncRequest::new(SyncAction::SyncProducts));

        let request: SyncRequest = serde_json::from_str(
            r#"{"action":"debug_product","offset":5,"limit":10,"onlyNew":true,"externalId":42}"#,
        )
        .unwrap();
        assert_eq!(request.offset, 5);
        assert_eq!(request.limit, Some(10));
        assert!(request.only_new);
        assert_eq!(request.external_id, Some(ErpId::new(42)));
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let mut summary = SyncSummary::new(SyncAction::SyncProducts, 10);
        for status in [
            SyncOutcome::Imported,
            SyncOutcome::Updated,
            SyncOutcome::LinkedBySku,
            SyncOutcome::IgnoredInactive,
            SyncOutcome::SkippedImportDisabled,
            SyncOutcome::SkippedDuplicate,
            SyncOutcome::Error,
        ] {
            summary.record(report(status));
        }
        assert_eq!(summary.processed, 7);
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.linked_by_sku, 1);
        assert_eq!(summary.ignored_inactive, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.errors, 1);
        assert!(!summary.log_truncated);
    }

    #[test]
    fn test_summary_log_is_capped() {
        let mut summary = SyncSummary::new(SyncAction::SyncProducts, 2);
        for _ in 0..5 {
            summary.record(report(SyncOutcome::Updated));
        }
        assert_eq!(summary.log.len(), 2);
        assert_eq!(summary.updated, 5);
        assert!(summary.log_truncated);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let mut summary = SyncSummary::new(SyncAction::FirstImport, 5);
        summary.record(report(SyncOutcome::LinkedBySku));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["action"], "first_import");
        assert_eq!(json["linkedBySku"], 1);
        assert_eq!(json["log"][0]["status"], "linked_by_sku");
        assert!(json.get("nextOffset").is_none());
        assert!(json.get("logCap").is_none());
    }
}
