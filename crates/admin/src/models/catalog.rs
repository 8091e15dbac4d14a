//! Canonical catalog records: products, variants, categories and media.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vitrine_core::{CategoryId, ErpId, ProductId, Sku, VariantId};

/// Size assigned to a product's single variant when nothing else is known.
pub const DEFAULT_SIZE: &str = "Único";

/// A product in the local catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CanonicalProduct {
    /// Local product ID.
    pub id: ProductId,
    pub name: String,
    /// URL slug, unique across products.
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub base_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    /// ERP product this record is linked to. Unique when set.
    pub external_product_id: Option<ErpId>,
    pub is_active: bool,
    /// Set when the product was deactivated by an ERP deletion event rather
    /// than by an operator.
    pub deactivated_by_sync: bool,
    pub sku: Option<Sku>,
    pub gtin: Option<String>,
    pub weight_kg: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub height_cm: Option<Decimal>,
    pub depth_cm: Option<Decimal>,
}

/// Fields for inserting a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub base_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    pub external_product_id: Option<ErpId>,
    pub sku: Option<Sku>,
    pub gtin: Option<String>,
    pub weight_kg: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub height_cm: Option<Decimal>,
    pub depth_cm: Option<Decimal>,
}

/// Partial update of a product's syncable fields.
///
/// `None` leaves the column untouched. The nested options on `sale_price`
/// distinguish "leave alone" from "clear". `is_active`, `slug` and
/// `category_id` cannot be changed through this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub base_price: Option<Decimal>,
    pub sale_price: Option<Option<Decimal>>,
    pub sku: Option<Sku>,
    pub gtin: Option<String>,
    pub weight_kg: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub height_cm: Option<Decimal>,
    pub depth_cm: Option<Decimal>,
}

impl ProductUpdate {
    /// Whether the update would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the update to an in-memory product.
    pub fn apply_to(&self, product: &mut CanonicalProduct) {
        if let Some(name) = &self.name {
            product.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(short) = &self.short_description {
            product.short_description = Some(short.clone());
        }
        if let Some(price) = self.base_price {
            product.base_price = price;
        }
        if let Some(sale) = self.sale_price {
            product.sale_price = sale;
        }
        if let Some(sku) = &self.sku {
            product.sku = Some(sku.clone());
        }
        if let Some(gtin) = &self.gtin {
            product.gtin = Some(gtin.clone());
        }
        if let Some(v) = self.weight_kg {
            product.weight_kg = Some(v);
        }
        if let Some(v) = self.width_cm {
            product.width_cm = Some(v);
        }
        if let Some(v) = self.height_cm {
            product.height_cm = Some(v);
        }
        if let Some(v) = self.depth_cm {
            product.depth_cm = Some(v);
        }
    }
}

/// A sellable variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CanonicalVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub size: String,
    pub color: Option<String>,
    pub color_hex: Option<String>,
    pub stock_quantity: i32,
    pub sku: Option<Sku>,
    /// ERP variation this variant is linked to. Unique when set.
    pub external_variant_id: Option<ErpId>,
    pub is_active: bool,
    /// Amount added to the product's base price.
    pub price_modifier: Decimal,
}

/// Fields for inserting a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVariant {
    pub product_id: ProductId,
    pub size: String,
    pub color: Option<String>,
    pub color_hex: Option<String>,
    pub stock_quantity: i32,
    pub sku: Option<Sku>,
    pub external_variant_id: Option<ErpId>,
    pub is_active: bool,
    pub price_modifier: Decimal,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// An image to attach to a product, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewImage {
    pub url: String,
    pub position: i32,
    pub alt: Option<String>,
}

/// A name/value attribute shown on the product page (brand, unit, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    pub name: String,
    pub value: String,
}
