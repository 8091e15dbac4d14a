//! Pure name handling for the ERP catalog.
//!
//! No I/O happens here. [`classify`] turns the flat listing into product
//! groups and [`extract_attributes`] infers a variant's size and color from
//! whatever the ERP gives us.

pub mod classify;
pub mod extract;
pub mod text;

pub use classify::{
    ClassifiedListing, ExternalListingItem, NameShape, ProductGroup, VariationItem, classify,
    parse_name,
};
pub use extract::{VariantAttributes, attribute_pairs, extract_attributes, hash_color_hex};
