//! CLI command implementations.

pub mod migrate;
pub mod policy;
pub mod sync;

use sqlx::PgPool;
use thiserror::Error;
use vitrine_admin::config::{self, ConfigError};

/// Errors shared by the database-backed commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect to the admin database named by the environment.
///
/// # Errors
///
/// Returns `CommandError` if no database URL is set or the connection fails.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = config::database_url_from_env()?;

    tracing::info!("Connecting to admin database...");
    Ok(vitrine_admin::db::create_pool(&database_url).await?)
}
