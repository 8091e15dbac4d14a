//! ERP credentials repository for database operations.
//!
//! Stores the OAuth tokens of the linked ERP account and, optionally, the
//! secret used to sign its webhooks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use super::RepositoryError;
use crate::erp::{ErpToken, TokenStore};

// =============================================================================
// Types
// =============================================================================

/// ERP credentials stored in the database.
///
/// Implements `Debug` manually to redact sensitive tokens.
#[derive(Clone)]
pub struct ErpCredentials {
    /// Account name (default: "default").
    pub account_name: String,
    /// OAuth access token (redacted in debug output).
    pub access_token: SecretString,
    /// OAuth refresh token (redacted in debug output).
    pub refresh_token: SecretString,
    /// Unix timestamp when the access token expires.
    pub access_token_expires_at: i64,
    /// Secret used to verify webhook signatures, if configured in the ERP.
    pub webhook_secret: Option<SecretString>,
    /// When the account was linked.
    pub connected_at: DateTime<Utc>,
}

impl std::fmt::Debug for ErpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErpCredentials")
            .field("account_name", &self.account_name)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

impl ErpCredentials {
    /// The OAuth token pair.
    #[must_use]
    pub fn token(&self) -> ErpToken {
        ErpToken {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            access_token_expires_at: self.access_token_expires_at,
        }
    }
}

/// Internal row type for `PostgreSQL` queries.
#[derive(Debug, sqlx::FromRow)]
struct ErpCredentialsRow {
    account_name: String,
    access_token: String,
    refresh_token: String,
    access_token_expires_at: i64,
    webhook_secret: Option<String>,
    connected_at: DateTime<Utc>,
}

impl From<ErpCredentialsRow> for ErpCredentials {
    fn from(row: ErpCredentialsRow) -> Self {
        Self {
            account_name: row.account_name,
            access_token: SecretString::from(row.access_token),
            refresh_token: SecretString::from(row.refresh_token),
            access_token_expires_at: row.access_token_expires_at,
            webhook_secret: row.webhook_secret.map(SecretString::from),
            connected_at: row.connected_at,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for ERP credentials database operations.
pub struct ErpCredentialsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ErpCredentialsRepository<'a> {
    /// Create a new ERP credentials repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the default account credentials.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_default(&self) -> Result<Option<ErpCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, ErpCredentialsRow>(
            r"
            SELECT account_name, access_token, refresh_token, access_token_expires_at,
                   webhook_secret, connected_at
            FROM erp_credentials
            WHERE account_name = 'default'
            ",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ErpCredentials::from))
    }

    /// Update the tokens after a refresh.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no account is linked.
    pub async fn update_tokens(&self, token: &ErpToken) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE erp_credentials
            SET access_token = $1,
                refresh_token = $2,
                access_token_expires_at = $3,
                updated_at = NOW()
            WHERE account_name = 'default'
            ",
        )
        .bind(token.access_token.expose_secret())
        .bind(token.refresh_token.expose_secret())
        .bind(token.access_token_expires_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// [`TokenStore`] backed by the `erp_credentials` table.
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    /// Create a token store on a pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn load(&self) -> Result<Option<ErpToken>, RepositoryError> {
        let credentials = ErpCredentialsRepository::new(&self.pool).get_default().await?;
        Ok(credentials.map(|c| c.token()))
    }

    async fn save(&self, token: &ErpToken) -> Result<(), RepositoryError> {
        ErpCredentialsRepository::new(&self.pool)
            .update_tokens(token)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let credentials = ErpCredentials {
            account_name: "default".to_string(),
            access_token: SecretString::from("access-value"),
            refresh_token: SecretString::from("refresh-value"),
            access_token_expires_at: 0,
            webhook_secret: Some(SecretString::from("hook-value")),
            connected_at: Utc::now(),
        };
        let output = format!("{credentials:?}");
        assert!(!output.contains("access-value"));
        assert!(!output.contains("refresh-value"));
        assert!(!output.contains("hook-value"));
        assert_eq!(credentials.token().access_token_expires_at, 0);
    }
}
