//! Post-sync cleanup of products imported from variation items.
//!
//! Before the classifier existed, a variation listed on its own could be
//! imported as a standalone product. After a full pass those products are
//! deleted; their variation now lives under the parent.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{info, instrument};

use vitrine_core::ErpId;

use super::{SyncEngine, SyncError};

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Products deleted.
    pub cleaned: usize,
    /// Inactive products left in place.
    pub skipped_inactive: usize,
}

/// Ids to purge: every variation id that is not also a reconciled parent.
#[must_use]
pub fn cleanup_candidates(
    variation_ids: &HashSet<ErpId>,
    parents: &HashSet<ErpId>,
) -> Vec<ErpId> {
    let mut ids: Vec<ErpId> = variation_ids.difference(parents).copied().collect();
    ids.sort_unstable();
    ids
}

impl SyncEngine {
    /// Delete the canonical products linked to `external_ids`, with their
    /// variants, images and characteristics. Inactive products are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(skip(self, external_ids), fields(candidates = external_ids.len()))]
    pub async fn purge_variation_products(
        &self,
        external_ids: &[ErpId],
    ) -> Result<CleanupReport, SyncError> {
        let mut report = CleanupReport::default();

        for &external_id in external_ids {
            let Some(product) = self.store.product_by_external_id(external_id).await? else {
                continue;
            };
            if !product.is_active {
                report.skipped_inactive += 1;
                continue;
            }
            if self.store.delete_product(product.id).await? {
                info!(product_id = %product.id, external_id = %external_id, "Purged product imported from a variation");
                report.cleaned += 1;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_exclude_parents() {
        let variations: HashSet<ErpId> = [1001, 1002, 1003].into_iter().map(ErpId::new).collect();
        let parents: HashSet<ErpId> = [1001, 501].into_iter().map(ErpId::new).collect();
        assert_eq!(
            cleanup_candidates(&variations, &parents),
            vec![ErpId::new(1002), ErpId::new(1003)]
        );
    }
}
