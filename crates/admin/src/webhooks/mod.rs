//! Inbound ERP webhooks.
//!
//! Every delivery is verified against the shared secret, decoded into
//! [`IncomingEvent`]s and claimed in the idempotency ledger before any side
//! effect runs. A redelivered event id hits the ledger's unique index and is
//! acknowledged without being processed again.

pub mod payload;
pub mod processor;
pub mod signature;

use thiserror::Error;

use crate::db::RepositoryError;

pub use payload::{IncomingEvent, classify_event, parse_events};
pub use processor::{EventEffect, EventResult, EventStatus, WebhookAck, WebhookProcessor};
pub use signature::SIGNATURE_HEADER;

/// Errors that reject a webhook delivery as a whole.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature missing or wrong.
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// No secret is configured and unsigned delivery is not allowed.
    #[error("Webhook secret not configured")]
    SecretNotConfigured,

    /// Body is not a recognised event payload.
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// The ledger could not be read or written.
    #[error("Webhook ledger error: {0}")]
    Store(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_error_display() {
        assert_eq!(
            WebhookError::SecretNotConfigured.to_string(),
            "Webhook secret not configured"
        );
        assert_eq!(
            WebhookError::InvalidSignature("signature mismatch".to_string()).to_string(),
            "Invalid webhook signature: signature mismatch"
        );
    }
}
