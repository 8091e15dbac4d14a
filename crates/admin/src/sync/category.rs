//! Category resolution for imported products.
//!
//! An ERP category is matched against local categories by normalized name:
//! exact match first, then substring containment, then token overlap of at
//! least one half. Unmatched names create a new category.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use vitrine_core::{CategoryId, ErpId};

use super::{SyncEngine, SyncError};
use crate::catalog::text::{normalize, slugify, tokens};
use crate::models::Category;

/// Minimum share of tokens two names must have in common to match.
pub const TOKEN_OVERLAP_THRESHOLD: f64 = 0.5;

/// Find the local category an ERP category name refers to.
#[must_use]
pub fn match_category<'a>(name: &str, categories: &'a [Category]) -> Option<&'a Category> {
    let target = normalize(name);
    if target.is_empty() {
        return None;
    }

    let normalized: Vec<(String, &Category)> = categories
        .iter()
        .map(|c| (normalize(&c.name), c))
        .filter(|(n, _)| !n.is_empty())
        .collect();

    if let Some((_, c)) = normalized.iter().find(|(n, _)| *n == target) {
        return Some(*c);
    }

    if let Some((_, c)) = normalized
        .iter()
        .filter(|(n, _)| n.contains(&target) || target.contains(n.as_str()))
        .max_by_key(|(n, _)| n.len())
    {
        return Some(*c);
    }

    let target_tokens: HashSet<String> = tokens(&target).into_iter().collect();
    let mut best: Option<(f64, &Category)> = None;
    for (n, c) in &normalized {
        let score = token_overlap(&target_tokens, &tokens(n).into_iter().collect());
        if score >= TOKEN_OVERLAP_THRESHOLD && best.is_none_or(|(s, _)| score > s) {
            best = Some((score, *c));
        }
    }
    best.map(|(_, c)| c)
}

/// Shared tokens over the size of the larger set.
#[allow(clippy::cast_precision_loss)] // token counts are tiny
fn token_overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / larger as f64
}

/// A slug not yet taken, appending `-2`, `-3`, ... to the base as needed.
pub fn unique_slug(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let base = if base.is_empty() { "categoria" } else { base };
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

impl SyncEngine {
    /// Local category for an ERP category id, creating it if no local
    /// category matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP or the store fails.
    #[instrument(skip(self))]
    pub async fn resolve_category(
        &self,
        erp_category: Option<ErpId>,
    ) -> Result<Option<CategoryId>, SyncError> {
        let Some(erp_category) = erp_category else {
            return Ok(None);
        };
        let Some(name) = self.source.category_name(erp_category).await? else {
            return Ok(None);
        };

        let categories = self.store.list_categories().await?;
        if let Some(found) = match_category(&name, &categories) {
            debug!(category = %found.name, erp_name = %name, "Matched category");
            return Ok(Some(found.id));
        }

        let slugs: HashSet<&str> = categories.iter().map(|c| c.slug.as_str()).collect();
        let slug = unique_slug(&slugify(&name), |s| slugs.contains(s));

        match self.store.insert_category(name.trim(), &slug).await {
            Ok(created) => {
                info!(category = %created.name, slug = %created.slug, "Created category");
                Ok(Some(created.id))
            }
            Err(e) if e.is_conflict() => {
                // Created concurrently; pick it up by name
                let categories = self.store.list_categories().await?;
                Ok(match_category(&name, &categories).map(|c| c.id))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<Category> {
        [
            (1, "Calçados", "calcados"),
            (2, "Sandálias Femininas", "sandalias-femininas"),
            (3, "Bolsas e Acessórios", "bolsas-e-acessorios"),
            (4, "Tênis Esportivo", "tenis-esportivo"),
        ]
        .into_iter()
        .map(|(id, name, slug)| Category {
            id: CategoryId::new(id),
            name: name.to_string(),
            slug: slug.to_string(),
        })
        .collect()
    }

    fn matched(name: &str) -> Option<i64> {
        let cats = categories();
        match_category(name, &cats).map(|c| c.id.as_i64())
    }

    #[test]
    fn test_exact_match_ignores_case_and_accents() {
        assert_eq!(matched("CALCADOS"), Some(1));
        assert_eq!(matched(" sandalias  femininas "), Some(2));
    }

    #[test]
    fn test_substring_match() {
        assert_eq!(matched("Sandálias"), Some(2));
        assert_eq!(matched("Bolsas"), Some(3));
    }

    #[test]
    fn test_token_overlap_match() {
        // "tenis" shared out of two tokens on each side
        assert_eq!(matched("Tênis Casual"), Some(4));
        // one of three tokens is below the threshold
        assert_eq!(matched("Acessórios de Praia"), None);
    }

    #[test]
    fn test_no_match() {
        assert_eq!(matched("Perfumaria"), None);
        assert_eq!(matched("   "), None);
    }

    #[test]
    fn test_unique_slug() {
        let taken = ["calcados", "calcados-2"];
        assert_eq!(unique_slug("calcados", |s| taken.contains(&s)), "calcados-3");
        assert_eq!(unique_slug("bolsas", |s| taken.contains(&s)), "bolsas");
        assert_eq!(unique_slug("", |_| false), "categoria");
    }
}
