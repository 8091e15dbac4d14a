//! Grouping of the ERP's flat listing into parent/variation clusters.
//!
//! The ERP lists parents and their variations side by side. Two naming
//! conventions tie them together:
//!
//! - `"<base> (<parent id>) <attrs>"`: an explicit reference to the parent
//! - `"<base> Cor: Preto"`: an attribute suffix with no parent id, grouped
//!   with every other item sharing the same normalized base
//!
//! Every listing item ends up in exactly one [`ProductGroup`], either as its
//! parent or as one of its variation items.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use vitrine_core::{ErpId, ListingFormat};

use super::extract::attribute_suffix_start;
use super::text::normalize;

static EXPLICIT_PARENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.+?)\s*\(\s*(?P<id>\d+)\s*\)\s*(?P<rest>.*)$").expect("Invalid regex")
});

/// One row of the ERP's flat product listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalListingItem {
    pub external_id: ErpId,
    pub raw_name: String,
    pub format: ListingFormat,
}

/// A listing item recognised as one attribute combination of a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationItem {
    pub external_id: ErpId,
    pub base_name: String,
    pub attribute_suffix: String,
    pub raw_name: String,
}

/// A parent product and the listing items that are its variations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductGroup {
    /// The parent's ERP id. For clusters whose parent was not in the listing
    /// this is the first child's id; the engine resolves the true parent
    /// from the detail record.
    pub parent_external_id: ErpId,
    pub parent_list_item: Option<ExternalListingItem>,
    pub variation_items: Vec<VariationItem>,
    pub is_simple: bool,
}

impl ProductGroup {
    /// Best available display name for logs.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.parent_list_item
            .as_ref()
            .map(|item| item.raw_name.as_str())
            .or_else(|| self.variation_items.first().map(|v| v.base_name.as_str()))
            .unwrap_or_default()
    }

    /// A group holding a single listing item with no variations.
    #[must_use]
    pub fn standalone(item: ExternalListingItem) -> Self {
        Self {
            parent_external_id: item.external_id,
            is_simple: item.format == ListingFormat::Simple,
            parent_list_item: Some(item),
            variation_items: Vec::new(),
        }
    }
}

/// Output of [`classify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedListing {
    pub groups: Vec<ProductGroup>,
    /// Ids of every item classified as a variation.
    pub variation_ids: HashSet<ErpId>,
}

/// How a single name parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum NameShape {
    /// `<base> (<parent>) <rest>`
    ExplicitParent {
        parent: ErpId,
        base: String,
        rest: String,
    },
    /// `<base> <attribute suffix>` with no parent id.
    AttributeSuffix { base: String, suffix: String },
    Standalone,
}

/// Parse one listing name.
#[must_use]
pub fn parse_name(raw_name: &str) -> NameShape {
    let name = raw_name.trim();

    if let Some(caps) = EXPLICIT_PARENT_RE.captures(name)
        && let Some(parent) = caps.name("id").and_then(|m| m.as_str().parse::<i64>().ok())
    {
        let field = |n: &str| caps.name(n).map_or("", |m| m.as_str()).trim().to_string();
        return NameShape::ExplicitParent {
            parent: ErpId::new(parent),
            base: field("base"),
            rest: field("rest"),
        };
    }

    if let Some(start) = attribute_suffix_start(name).filter(|&s| s > 0)
        && let (Some(base), Some(suffix)) = (name.get(..start), name.get(start..))
    {
        let base = base.trim().trim_end_matches(['-', ',', '/', '|', ';']).trim();
        if !base.is_empty() {
            return NameShape::AttributeSuffix {
                base: base.to_string(),
                suffix: suffix.trim().to_string(),
            };
        }
    }

    NameShape::Standalone
}

/// Partition a listing into product groups.
///
/// Groups come back ordered by the position of their earliest member in the
/// listing. Duplicate listing rows (same id) are kept once.
#[must_use]
pub fn classify(items: &[ExternalListingItem]) -> ClassifiedListing {
    let mut seen = HashSet::new();
    let items: Vec<(usize, &ExternalListingItem, NameShape)> = items
        .iter()
        .filter(|item| seen.insert(item.external_id))
        .enumerate()
        .map(|(pos, item)| (pos, item, parse_name(&item.raw_name)))
        .collect();

    // Pass 1: explicit parent references
    let mut explicit: Vec<(usize, ProductGroup)> = Vec::new();
    let mut explicit_index: HashMap<ErpId, usize> = HashMap::new();
    for (pos, item, shape) in &items {
        if let NameShape::ExplicitParent { parent, base, rest } = shape
            && *parent != item.external_id
        {
            let idx = *explicit_index.entry(*parent).or_insert_with(|| {
                explicit.push((*pos, placeholder(*parent)));
                explicit.len() - 1
            });
            if let Some((_, group)) = explicit.get_mut(idx) {
                group.variation_items.push(VariationItem {
                    external_id: item.external_id,
                    base_name: base.clone(),
                    attribute_suffix: rest.clone(),
                    raw_name: item.raw_name.clone(),
                });
            }
        }
    }

    // Pass 2: attribute-suffix clusters by normalized base. An item that is
    // itself referenced as an explicit parent is never a variation.
    let mut clusters: Vec<(usize, String, Vec<VariationItem>)> = Vec::new();
    let mut cluster_index: HashMap<String, usize> = HashMap::new();
    for (pos, item, shape) in &items {
        if let NameShape::AttributeSuffix { base, suffix } = shape
            && !explicit_index.contains_key(&item.external_id)
        {
            let key = normalize(base);
            let idx = *cluster_index.entry(key.clone()).or_insert_with(|| {
                clusters.push((*pos, key, Vec::new()));
                clusters.len() - 1
            });
            if let Some((_, _, members)) = clusters.get_mut(idx) {
                members.push(VariationItem {
                    external_id: item.external_id,
                    base_name: base.clone(),
                    attribute_suffix: suffix.clone(),
                    raw_name: item.raw_name.clone(),
                });
            }
        }
    }

    // Pass 3: standalone items become parents where they can
    let mut claimed_clusters: Vec<Option<(usize, ExternalListingItem)>> = vec![None; clusters.len()];
    let mut own: Vec<(usize, ProductGroup)> = Vec::new();
    for (pos, item, shape) in &items {
        let is_standalone = match shape {
            NameShape::Standalone => true,
            NameShape::ExplicitParent { parent, .. } => *parent == item.external_id,
            NameShape::AttributeSuffix { .. } => explicit_index.contains_key(&item.external_id),
        };
        if !is_standalone {
            continue;
        }

        if let Some(&idx) = explicit_index.get(&item.external_id)
            && let Some((first_pos, group)) = explicit.get_mut(idx)
            && group.parent_list_item.is_none()
        {
            *first_pos = (*first_pos).min(*pos);
            group.parent_list_item = Some((*item).clone());
            continue;
        }

        if let Some(&idx) = cluster_index.get(&normalize(&item.raw_name))
            && let Some(slot) = claimed_clusters.get_mut(idx)
            && slot.is_none()
        {
            *slot = Some((*pos, (*item).clone()));
            continue;
        }

        own.push((*pos, ProductGroup::standalone((*item).clone())));
    }

    let mut ordered: Vec<(usize, ProductGroup)> = explicit;
    for ((first_pos, _, members), parent) in clusters.into_iter().zip(claimed_clusters) {
        let Some(first) = members.first() else {
            continue;
        };
        let group = match parent {
            Some((parent_pos, item)) => (
                first_pos.min(parent_pos),
                ProductGroup {
                    parent_external_id: item.external_id,
                    parent_list_item: Some(item),
                    variation_items: members,
                    is_simple: false,
                },
            ),
            None => (
                first_pos,
                ProductGroup {
                    parent_external_id: first.external_id,
                    parent_list_item: None,
                    variation_items: members,
                    is_simple: false,
                },
            ),
        };
        ordered.push(group);
    }
    ordered.extend(own);
    ordered.retain(|(_, g)| g.parent_list_item.is_some() || !g.variation_items.is_empty());
    ordered.sort_by_key(|(pos, _)| *pos);

    let variation_ids = ordered
        .iter()
        .flat_map(|(_, g)| g.variation_items.iter().map(|v| v.external_id))
        .collect();

    ClassifiedListing {
        groups: ordered.into_iter().map(|(_, g)| g).collect(),
        variation_ids,
    }
}

const fn placeholder(parent: ErpId) -> ProductGroup {
    ProductGroup {
        parent_external_id: parent,
        parent_list_item: None,
        variation_items: Vec::new(),
        is_simple: false,
    }
}
