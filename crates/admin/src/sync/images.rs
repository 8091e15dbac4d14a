//! Image re-hosting.
//!
//! ERP media links are short-lived presigned URLs, so images are downloaded
//! and uploaded to our own blob store. When that fails for one image the
//! ERP link is kept with its query string removed.

use tracing::{instrument, warn};

use vitrine_core::ProductId;

use super::{SyncEngine, SyncError};
use crate::models::NewImage;
use crate::storage::{content_type_for, image_extension, image_key};

/// A URL without its query string or fragment.
#[must_use]
pub fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

impl SyncEngine {
    /// Replace a product's images with re-hosted copies of `urls`.
    ///
    /// An empty list leaves the current images untouched. Returns the number
    /// of images written.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails or the ERP integration is
    /// unusable. Single download or upload failures only degrade that image.
    #[instrument(skip(self, urls, alt), fields(count = urls.len()))]
    pub async fn rehost_images(
        &self,
        product_id: ProductId,
        urls: &[String],
        alt: &str,
    ) -> Result<usize, SyncError> {
        if urls.is_empty() {
            return Ok(0);
        }

        let mut images = Vec::with_capacity(urls.len());
        for (position, url) in (0_i32..).zip(urls) {
            let stored = match self.source.download_image(url).await {
                Ok(image) => {
                    let extension = image_extension(image.content_type.as_deref(), url);
                    let key = image_key(product_id, &image.bytes, extension);
                    match self
                        .blobs
                        .upload(&key, image.bytes, content_type_for(extension))
                        .await
                    {
                        Ok(()) => self.blobs.public_url(&key),
                        Err(e) => {
                            warn!(url = %strip_query(url), error = %e, "Image upload failed, keeping ERP link");
                            strip_query(url).to_string()
                        }
                    }
                }
                Err(e) if e.is_configuration() => return Err(e.into()),
                Err(e) => {
                    warn!(url = %strip_query(url), error = %e, "Image download failed, keeping ERP link");
                    strip_query(url).to_string()
                }
            };

            images.push(NewImage {
                url: stored,
                position,
                alt: Some(alt.to_string()).filter(|a| !a.is_empty()),
            });
        }

        self.store.replace_images(product_id, &images).await?;
        Ok(images.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_query() {
        assert_eq!(
            strip_query("https://cdn.erp/img/1.jpg?X-Amz-Signature=abc&x=1"),
            "https://cdn.erp/img/1.jpg"
        );
        assert_eq!(strip_query("https://cdn.erp/img/2.png#frag"), "https://cdn.erp/img/2.png");
        assert_eq!(strip_query("https://cdn.erp/img/3.png"), "https://cdn.erp/img/3.png");
    }
}
