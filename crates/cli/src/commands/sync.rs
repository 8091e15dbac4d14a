//! Sync commands.
//!
//! Runs the same actions as `POST /sync` without going through HTTP.
//!
//! # Environment Variables
//!
//! Same as the admin server: database URL, ERP credentials and blob store
//! settings. See `AdminConfig::from_env`.

use thiserror::Error;
use vitrine_admin::config::{AdminConfig, ConfigError};
use vitrine_admin::erp::ErpError;
use vitrine_admin::state::AppState;
use vitrine_admin::sync::{SyncAction, SyncError, SyncRequest};
use vitrine_core::ErpId;

/// Arguments of `vitrine-cli sync`.
#[derive(Debug)]
pub struct SyncArgs {
    pub action: String,
    pub offset: usize,
    pub limit: Option<usize>,
    pub only_new: bool,
    pub external_id: Option<i64>,
}

/// Errors that can occur while running a sync action.
#[derive(Debug, Error)]
pub enum SyncCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("ERP client error: {0}")]
    Erp(#[from] ErpError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run one sync action and print the summary as JSON.
///
/// # Errors
///
/// Returns `SyncCommandError` if the environment is incomplete or the
/// action fails as a whole. Per-group failures are reported in the summary.
pub async fn run(args: SyncArgs) -> Result<(), SyncCommandError> {
    dotenvy::dotenv().ok();

    let action: SyncAction = args.action.parse()?;
    let request = SyncRequest {
        offset: args.offset,
        limit: args.limit,
        only_new: args.only_new,
        external_id: args.external_id.map(ErpId::new),
        ..SyncRequest::new(action)
    };

    let config = AdminConfig::from_env()?;
    let pool = vitrine_admin::db::create_pool(&config.database_url).await?;
    let state = AppState::new(&config, pool)?;

    tracing::info!(action = %action, offset = request.offset, "Running sync action");
    let summary = state.runner().run(&request).await?;

    tracing::info!(
        processed = summary.processed,
        imported = summary.imported,
        updated = summary.updated,
        errors = summary.errors,
        next_offset = ?summary.next_offset,
        "Sync action complete"
    );

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
