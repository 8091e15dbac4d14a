//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (store reachable)
//!
//! # Sync
//! POST /sync                   - Run a sync action (bearer token)
//!
//! # Webhooks
//! POST /webhooks/erp           - ERP event delivery (HMAC signed)
//! ```

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod sync;
pub mod webhooks;

/// Build the admin router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(sync::router())
        .merge(webhooks::router())
}
