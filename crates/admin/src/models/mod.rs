//! Domain models for the local catalog and sync bookkeeping.

pub mod catalog;
pub mod sync_policy;
pub mod webhook;

pub use catalog::*;
pub use sync_policy::{PolicyError, SyncPolicy};
pub use webhook::{NewWebhookEvent, WebhookEventRecord};
