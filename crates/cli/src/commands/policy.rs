//! Sync policy commands.
//!
//! # Usage
//!
//! ```bash
//! vitrine-cli policy show
//! vitrine-cli policy reset
//! ```

use thiserror::Error;
use vitrine_admin::db::{RepositoryError, SyncPolicyRepository};
use vitrine_admin::models::SyncPolicy;

use super::{CommandError, connect};

/// Errors that can occur during policy operations.
#[derive(Debug, Error)]
pub enum PolicyCommandError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Print the stored policy.
///
/// # Errors
///
/// Returns `PolicyCommandError` if the policy cannot be loaded.
pub async fn show() -> Result<(), PolicyCommandError> {
    let pool = connect().await?;
    let policy = SyncPolicyRepository::new(&pool).load().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&policy)?);
    }
    Ok(())
}

/// Restore the default policy.
///
/// The first import marker survives the reset so a completed catalog cannot
/// be first-imported again.
///
/// # Errors
///
/// Returns `PolicyCommandError` if the policy cannot be saved.
pub async fn reset() -> Result<(), PolicyCommandError> {
    let pool = connect().await?;
    let repo = SyncPolicyRepository::new(&pool);

    let current = repo.load().await?;
    let policy = SyncPolicy {
        first_import_done: current.first_import_done,
        ..SyncPolicy::default()
    };
    repo.save(&policy).await?;

    tracing::info!(
        first_import_done = policy.first_import_done,
        "Sync policy reset to defaults"
    );
    Ok(())
}
