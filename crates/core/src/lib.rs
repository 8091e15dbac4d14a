//! Vitrine Core - Shared catalog types.
//!
//! This crate provides common types used across all Vitrine components:
//! - `admin` - Back office service hosting the catalog reconciliation engine
//! - `cli` - Command-line tools for migrations and scheduled syncs
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, SKUs, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
