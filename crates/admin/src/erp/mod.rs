//! ERP REST API client.
//!
//! Provides the catalog reads the sync engine needs: the paginated product
//! listing, product detail with variations, batched stock balances and
//! category names.
//!
//! # Architecture
//!
//! - OAuth access tokens refreshed ahead of expiry with the refresh token,
//!   persisted through a [`TokenStore`] so restarts keep the link
//! - A cooperative minimum delay between consecutive calls
//! - 429 responses retried with linear backoff, bounded attempts
//! - Wire payloads decoded into typed records in [`types`] at the boundary
//!
//! The engine only sees the [`CatalogSource`] trait, so tests swap in an
//! in-memory catalog.

pub mod auth;
pub mod client;
pub mod types;

pub use auth::ErpToken;
pub use client::ErpClient;
pub use types::{DownloadedImage, ErpVariation, ProductDetail, StockBalance};

use async_trait::async_trait;
use thiserror::Error;

use vitrine_core::ErpId;

use crate::catalog::ExternalListingItem;
use crate::db::RepositoryError;

/// Maximum number of ids accepted by the stock balance endpoint.
pub const STOCK_BATCH_LIMIT: usize = 50;

/// Errors that can occur when talking to the ERP.
#[derive(Debug, Error)]
pub enum ErpError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Unexpected status code.
    #[error("ERP returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Still rate limited after every retry.
    #[error("Rate limited after {attempts} attempts")]
    RateLimited {
        /// Attempts made.
        attempts: u32,
    },

    /// Token endpoint rejected the refresh.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Access token expired and could not be refreshed.
    #[error("Access token expired")]
    TokenExpired,

    /// No ERP account has been linked yet.
    #[error("ERP integration is not linked")]
    NotLinked,

    /// The configured API base produced an invalid URL.
    #[error("Invalid ERP URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Too many ids passed to a batched endpoint.
    #[error("Too many ids in one batch: {0} (max {STOCK_BATCH_LIMIT})")]
    BatchTooLarge(usize),

    /// Reading or writing stored credentials failed.
    #[error("Credential storage error: {0}")]
    Credentials(#[from] RepositoryError),
}

impl ErpError {
    /// Whether the error means the integration itself is unusable, as
    /// opposed to a single failed call. Such errors abort a whole run.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NotLinked
                | Self::AuthenticationFailed(_)
                | Self::TokenExpired
                | Self::InvalidUrl(_)
        )
    }
}

/// Read access to the ERP catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// One page of the flat product listing. Pages start at 1.
    async fn list_page(&self, page: u32, limit: u32)
    -> Result<Vec<ExternalListingItem>, ErpError>;

    /// Full detail of one product or variation. `None` if the ERP does not
    /// know the id.
    async fn product_detail(&self, id: ErpId) -> Result<Option<ProductDetail>, ErpError>;

    /// Stock balances for at most [`STOCK_BATCH_LIMIT`] ids.
    async fn stock_balances(&self, ids: &[ErpId]) -> Result<Vec<StockBalance>, ErpError>;

    /// Display name of an ERP category.
    async fn category_name(&self, id: ErpId) -> Result<Option<String>, ErpError>;

    /// Download an image referenced by a product's media list.
    async fn download_image(&self, url: &str) -> Result<DownloadedImage, ErpError>;
}

/// Persistence for the linked account's OAuth tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the stored token, if the integration is linked.
    async fn load(&self) -> Result<Option<ErpToken>, RepositoryError>;

    /// Persist a freshly refreshed token.
    async fn save(&self, token: &ErpToken) -> Result<(), RepositoryError>;
}
