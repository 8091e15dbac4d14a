//! Core types for Vitrine.
//!
//! This module provides type-safe wrappers for common catalog concepts.

pub mod id;
pub mod sku;
pub mod status;

pub use id::*;
pub use sku::{Sku, SkuError};
pub use status::*;
