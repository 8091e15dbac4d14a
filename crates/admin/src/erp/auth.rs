//! ERP OAuth token handling.
//!
//! The account is linked once by an operator (authorization code flow in the
//! ERP's UI). From then on the service only ever uses the refresh token
//! grant to keep the access token fresh.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::ErpError;
use crate::config::ErpConfig;

/// OAuth tokens for the linked ERP account.
#[derive(Clone)]
pub struct ErpToken {
    /// Bearer token for API requests.
    pub access_token: SecretString,
    /// Token used to obtain the next access token.
    pub refresh_token: SecretString,
    /// Unix timestamp when the access token expires.
    pub access_token_expires_at: i64,
}

impl std::fmt::Debug for ErpToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErpToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("access_token_expires_at", &self.access_token_expires_at)
            .finish()
    }
}

/// Response from the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

/// Error body from the token endpoint.
#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange a refresh token for a new access token.
///
/// Client credentials travel as HTTP basic auth; the grant goes in a form
/// body.
///
/// # Errors
///
/// Returns `ErpError::AuthenticationFailed` if the token endpoint rejects
/// the refresh token or the client credentials.
#[instrument(skip(client, config, refresh_token))]
pub async fn refresh_access_token(
    client: &reqwest::Client,
    config: &ErpConfig,
    refresh_token: &SecretString,
) -> Result<ErpToken, ErpError> {
    let now = chrono::Utc::now().timestamp();

    let response = client
        .post(&config.token_url)
        .basic_auth(&config.client_id, Some(config.client_secret.expose_secret()))
        .header("Accept", "1.0")
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
        ])
        .send()
        .await?;

    let status = response.status();

    if status.is_success() {
        let token: TokenResponse = response.json().await?;
        Ok(ErpToken {
            access_token: SecretString::from(token.access_token),
            refresh_token: SecretString::from(token.refresh_token),
            access_token_expires_at: now + token.expires_in,
        })
    } else {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<TokenErrorResponse>(&text)
            .ok()
            .and_then(|e| e.error_description.or(e.error))
            .unwrap_or(text);

        Err(ErpError::AuthenticationFailed(format!(
            "Token refresh failed (HTTP {status}): {message}"
        )))
    }
}

impl ErpToken {
    /// Check if the access token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 60 seconds remaining
        self.expires_within(60)
    }

    /// Check if the access token will expire within the given number of seconds.
    #[must_use]
    pub fn expires_within(&self, seconds: i64) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.access_token_expires_at - seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: i64) -> ErpToken {
        ErpToken {
            access_token: SecretString::from("access"),
            refresh_token: SecretString::from("refresh"),
            access_token_expires_at: expires_at,
        }
    }

    #[test]
    fn test_token_is_expired() {
        let now = chrono::Utc::now().timestamp();

        assert!(token(now - 3600).is_expired());
        assert!(!token(now + 3600).is_expired());
        // 30 seconds left is inside the 60 second buffer
        assert!(token(now + 30).is_expired());
    }

    #[test]
    fn test_expires_within() {
        let now = chrono::Utc::now().timestamp();
        let t = token(now + 200);
        assert!(t.expires_within(300));
        assert!(!t.expires_within(100));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let output = format!("{:?}", token(0));
        assert!(!output.contains("\"access\""));
        assert!(!output.contains("\"refresh\""));
        assert!(output.contains("[REDACTED]"));
    }
}
