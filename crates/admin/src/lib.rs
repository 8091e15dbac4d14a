//! Vitrine admin library.
//!
//! Keeps the storefront's canonical catalog converged with the ERP: the
//! periodic sync runner, the webhook ingestion path and the HTTP surface
//! that triggers them.
//!
//! # Security
//!
//! This crate holds the ERP OAuth tokens, the blob store service key and
//! the webhook secret. `POST /sync` is bearer protected and webhook bodies
//! are HMAC verified.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod db;
pub mod erp;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod storage;
pub mod sync;
pub mod webhooks;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
