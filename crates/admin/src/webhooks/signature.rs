//! HMAC-SHA256 verification of inbound webhook bodies.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::{debug, warn};

use super::WebhookError;

/// Header carrying `sha256=<hex>`.
pub const SIGNATURE_HEADER: &str = "X-Signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Hex HMAC-SHA256 of `body` under `secret`.
///
/// # Errors
///
/// Returns `WebhookError::InvalidSignature` if the key is rejected.
pub fn sign(secret: &SecretString, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a request against the effective secret.
///
/// With a secret the header must be present and match. Without one the
/// request is accepted only when `allow_unsigned` is set.
///
/// # Errors
///
/// Returns `WebhookError::InvalidSignature` for a missing or wrong
/// signature and `WebhookError::SecretNotConfigured` when no secret exists
/// and unsigned delivery is not allowed.
pub fn verify(
    secret: Option<&SecretString>,
    allow_unsigned: bool,
    header: Option<&str>,
    body: &[u8],
) -> Result<(), WebhookError> {
    let Some(secret) = secret else {
        if allow_unsigned {
            warn!("No webhook secret configured, accepting unsigned request");
            return Ok(());
        }
        return Err(WebhookError::SecretNotConfigured);
    };

    let provided = header
        .ok_or_else(|| WebhookError::InvalidSignature("missing signature header".to_string()))?
        .trim();
    let provided = provided.strip_prefix(SIGNATURE_PREFIX).unwrap_or(provided);

    let expected = sign(secret, body)?;
    if !constant_time_compare(&expected, &provided.to_ascii_lowercase()) {
        return Err(WebhookError::InvalidSignature("signature mismatch".to_string()));
    }

    debug!("Webhook signature verified");
    Ok(())
}

/// Constant-time string comparison to prevent timing attacks.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"event":"stock.updated","eventId":"e-1","data":{"id":1002}}"#;

    fn secret() -> SecretString {
        SecretString::from("whsec_7fK2pQ9vLm3xR8tN".to_string())
    }

    #[test]
    fn test_valid_signature() {
        let header = format!("sha256={}", sign(&secret(), BODY).unwrap());
        assert!(verify(Some(&secret()), false, Some(&header), BODY).is_ok());
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let header = format!("sha256={}", sign(&secret(), BODY).unwrap().to_uppercase());
        assert!(verify(Some(&secret()), false, Some(&header), BODY).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = format!("sha256={}", sign(&secret(), BODY).unwrap());
        let result = verify(Some(&secret()), false, Some(&header), b"{}");
        assert!(matches!(result, Err(WebhookError::InvalidSignature(_))));
    }

    #[test]
    fn test_missing_header_rejected_when_secret_set() {
        let result = verify(Some(&secret()), true, None, BODY);
        assert!(matches!(result, Err(WebhookError::InvalidSignature(_))));
    }

    #[test]
    fn test_unsigned_requires_opt_in() {
        assert!(matches!(
            verify(None, false, None, BODY),
            Err(WebhookError::SecretNotConfigured)
        ));
        assert!(verify(None, true, None, BODY).is_ok());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
