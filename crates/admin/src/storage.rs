//! Object storage for re-hosted product images.
//!
//! Images are stored under content-addressed keys,
//! `products/{product_id}/{sha256 prefix}.{ext}`, so re-uploading the same
//! image on a later sync overwrites an identical object.

use async_trait::async_trait;
use bytes::Bytes;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use vitrine_core::ProductId;

use crate::config::BlobConfig;

/// Errors from the blob store.
#[derive(Debug, Error)]
pub enum BlobError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store rejected the upload.
    #[error("Upload failed (HTTP {status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Upload-by-key object storage with public URLs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `key`, replacing any existing object.
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError>;

    /// Public URL of the object at `key`.
    fn public_url(&self, key: &str) -> String;
}

/// Storage key for a product image.
#[must_use]
pub fn image_key(product_id: ProductId, bytes: &[u8], extension: &str) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    let short = digest.get(..16).unwrap_or(&digest);
    format!("products/{product_id}/{short}.{extension}")
}

/// File extension for an image, from its content type or its URL.
#[must_use]
pub fn image_extension(content_type: Option<&str>, url: &str) -> &'static str {
    let from_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match from_type.as_deref() {
        Some("image/png") => return "png",
        Some("image/webp") => return "webp",
        Some("image/gif") => return "gif",
        Some("image/jpeg" | "image/jpg") => return "jpg",
        _ => {}
    }

    let path = url.split(['?', '#']).next().unwrap_or_default();
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "png",
        Some("webp") => "webp",
        Some("gif") => "gif",
        _ => "jpg",
    }
}

/// Content type for a stored extension.
#[must_use]
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

/// [`BlobStore`] speaking the Supabase Storage REST API.
#[derive(Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    config: BlobConfig,
}

impl HttpBlobStore {
    /// Create a store.
    #[must_use]
    pub fn new(config: BlobConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), BlobError> {
        let url = format!(
            "{}/storage/v1/object/{}/{key}",
            self.base(),
            self.config.bucket
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(self.config.service_key.expose_secret())
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{key}",
            self.base(),
            self.config.bucket
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_image_key_is_content_addressed() {
        let a = image_key(ProductId::new(7), b"one", "jpg");
        let b = image_key(ProductId::new(7), b"one", "jpg");
        let c = image_key(ProductId::new(7), b"two", "jpg");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("products/7/"));
        assert!(a.ends_with(".jpg"));
        assert_eq!(a.len(), "products/7/".len() + 16 + ".jpg".len());
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension(Some("image/png"), "https://x/y"), "png");
        assert_eq!(
            image_extension(Some("image/webp; charset=binary"), "https://x/y"),
            "webp"
        );
        assert_eq!(
            image_extension(Some("application/octet-stream"), "https://cdn/a/b.PNG?sig=1"),
            "png"
        );
        assert_eq!(image_extension(None, "https://cdn/a/b"), "jpg");
        assert_eq!(content_type_for("png"), "image/png");
        assert_eq!(content_type_for("jpg"), "image/jpeg");
    }

    #[test]
    fn test_public_url() {
        let store = HttpBlobStore::new(BlobConfig {
            base_url: "https://blob.example/".to_string(),
            bucket: "products".to_string(),
            service_key: SecretString::from("key"),
        });
        assert_eq!(
            store.public_url("products/1/abc.jpg"),
            "https://blob.example/storage/v1/object/public/products/products/1/abc.jpg"
        );
    }
}
