//! Status enums for catalog sync entities.

use serde::{Deserialize, Serialize};

/// Processing state of a row in the webhook idempotency ledger.
///
/// A row is created as `Processing` before any side effect runs and always
/// ends in one of the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "webhook_event_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Processing,
    Processed,
    Failed,
}

impl WebhookStatus {
    /// Whether the status is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }
}

impl std::fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Processed => write!(f, "processed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Category of an inbound ERP webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Stock,
    Product,
    Order,
    Invoice,
    Unknown,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stock => write!(f, "stock"),
            Self::Product => write!(f, "product"),
            Self::Order => write!(f, "order"),
            Self::Invoice => write!(f, "invoice"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Format of a row in the ERP's flat product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingFormat {
    /// A product without variations.
    #[default]
    Simple,
    /// A product that owns variations (a parent).
    Variation,
}

/// Result of reconciling one product group or applying one event.
///
/// Policy no-ops (`IgnoredInactive`, `SkippedImportDisabled`,
/// `SkippedDuplicate`) are distinct from `Error` so operators can tell
/// "nothing to do" from "something broke".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Imported,
    Updated,
    LinkedBySku,
    IgnoredInactive,
    SkippedImportDisabled,
    SkippedDuplicate,
    Error,
}

impl SyncOutcome {
    /// Whether the outcome is a policy no-op rather than a write or failure.
    #[must_use]
    pub const fn is_skip(self) -> bool {
        matches!(
            self,
            Self::IgnoredInactive | Self::SkippedImportDisabled | Self::SkippedDuplicate
        )
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Imported => "imported",
            Self::Updated => "updated",
            Self::LinkedBySku => "linked_by_sku",
            Self::IgnoredInactive => "ignored_inactive",
            Self::SkippedImportDisabled => "skipped_import_disabled",
            Self::SkippedDuplicate => "skipped_duplicate",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}
