//! ERP REST API client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};
use url::Url;

use vitrine_core::ErpId;

use super::auth::{ErpToken, refresh_access_token};
use super::types::{
    CategoryWire, DataEnvelope, DownloadedImage, ListingRowWire, ProductDetail,
    ProductDetailWire, StockBalance, StockBalanceWire,
};
use super::{CatalogSource, ErpError, STOCK_BATCH_LIMIT, TokenStore};
use crate::catalog::ExternalListingItem;
use crate::config::ErpConfig;

/// Refresh the access token when it expires within this many seconds.
const REFRESH_AHEAD_SECS: i64 = 300;

/// Maximum number of characters of an error body kept in `ErpError::Status`.
const ERROR_BODY_LIMIT: usize = 500;

/// ERP REST API client.
///
/// Cheap to clone; clones share the token, the throttle and the category
/// cache.
///
/// # Rate limiting
///
/// Consecutive API calls are spaced by at least `ErpConfig::min_interval`.
/// A 429 response is retried after `backoff * attempt` until
/// `max_attempts` is reached, after which the last response is handed back
/// to the caller.
#[derive(Clone)]
pub struct ErpClient {
    inner: Arc<ErpClientInner>,
}

struct ErpClientInner {
    client: reqwest::Client,
    config: ErpConfig,
    /// In-memory token, loaded from the store on first use.
    token: RwLock<Option<ErpToken>>,
    /// When the previous API call was sent.
    last_call: Mutex<Option<Instant>>,
    store: Option<Arc<dyn TokenStore>>,
    /// Category names rarely change; cache misses as well.
    categories: Cache<ErpId, Option<String>>,
}

impl ErpClient {
    /// Create a client.
    ///
    /// Without a token store the token must be supplied with
    /// [`ErpClient::set_token`], and refreshed tokens live only in memory.
    ///
    /// # Errors
    ///
    /// Returns `ErpError::Http` if the HTTP client cannot be built and
    /// `ErpError::InvalidUrl` if the API base is not a valid URL.
    pub fn new(config: ErpConfig, store: Option<Arc<dyn TokenStore>>) -> Result<Self, ErpError> {
        Url::parse(&config.api_base)?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let categories = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(3600))
            .build();

        Ok(Self {
            inner: Arc::new(ErpClientInner {
                client,
                config,
                token: RwLock::new(None),
                last_call: Mutex::new(None),
                store,
                categories,
            }),
        })
    }

    /// Set the access token directly.
    pub async fn set_token(&self, token: ErpToken) {
        *self.inner.token.write().await = Some(token);
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Current access token, loading it from the store and refreshing it
    /// ahead of expiry as needed.
    async fn access_token(&self) -> Result<String, ErpError> {
        let cached = self.inner.token.read().await.clone();
        let token = match cached {
            Some(token) => token,
            None => {
                let stored = match &self.inner.store {
                    Some(store) => store.load().await?,
                    None => None,
                };
                let token = stored.ok_or(ErpError::NotLinked)?;
                *self.inner.token.write().await = Some(token.clone());
                token
            }
        };

        if !token.expires_within(REFRESH_AHEAD_SECS) {
            return Ok(token.access_token.expose_secret().to_string());
        }

        match self.refresh(&token).await {
            Ok(fresh) => Ok(fresh.access_token.expose_secret().to_string()),
            Err(e) if !token.is_expired() => {
                warn!(error = %e, "ERP token refresh failed, using current token");
                Ok(token.access_token.expose_secret().to_string())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, current))]
    async fn refresh(&self, current: &ErpToken) -> Result<ErpToken, ErpError> {
        let mut guard = self.inner.token.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref()
            && !token.expires_within(REFRESH_AHEAD_SECS)
        {
            return Ok(token.clone());
        }

        let fresh =
            refresh_access_token(&self.inner.client, &self.inner.config, &current.refresh_token)
                .await?;

        if let Some(store) = &self.inner.store {
            store.save(&fresh).await?;
        }
        debug!(
            expires_at = fresh.access_token_expires_at,
            "ERP access token refreshed"
        );

        *guard = Some(fresh.clone());
        Ok(fresh)
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn endpoint(&self, path: &str) -> Result<Url, ErpError> {
        let base = self.inner.config.api_base.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Wait until the minimum interval since the previous call has passed.
    async fn throttle(&self) {
        let mut last = self.inner.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.inner.config.min_interval {
                tokio::time::sleep(self.inner.config.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Send an authenticated GET, retrying 429 responses.
    ///
    /// Once attempts are exhausted the final 429 response is returned as-is.
    async fn send(&self, url: &Url) -> Result<reqwest::Response, ErpError> {
        let max_attempts = self.inner.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let access_token = self.access_token().await?;
            self.throttle().await;

            let response = self
                .inner
                .client
                .get(url.clone())
                .bearer_auth(access_token)
                .header("Accept", "application/json")
                .send()
                .await?;

            if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS
                || attempt >= max_attempts
            {
                return Ok(response);
            }

            let delay = self.inner.config.backoff * attempt;
            warn!(
                path = url.path(),
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "ERP rate limited, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// GET a `{data: ...}` payload. `None` on 404.
    async fn get_data<T: DeserializeOwned>(&self, url: &Url) -> Result<Option<T>, ErpError> {
        let response = self.send(url).await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ErpError::RateLimited {
                attempts: self.inner.config.max_attempts.max(1),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ErpError::TokenExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErpError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let bytes = response.bytes().await?;
        let envelope: DataEnvelope<T> = serde_json::from_slice(&bytes)?;
        Ok(Some(envelope.data))
    }
}

#[async_trait]
impl CatalogSource for ErpClient {
    #[instrument(skip(self))]
    async fn list_page(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<Vec<ExternalListingItem>, ErpError> {
        let mut url = self.endpoint("produtos")?;
        url.query_pairs_mut()
            .append_pair("pagina", &page.to_string())
            .append_pair("limite", &limit.to_string());

        let rows: Vec<ListingRowWire> = self.get_data(&url).await?.unwrap_or_default();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(external_id = %id))]
    async fn product_detail(&self, id: ErpId) -> Result<Option<ProductDetail>, ErpError> {
        let url = self.endpoint(&format!("produtos/{id}"))?;
        let detail: Option<ProductDetailWire> = self.get_data(&url).await?;
        Ok(detail.map(Into::into))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn stock_balances(&self, ids: &[ErpId]) -> Result<Vec<StockBalance>, ErpError> {
        if ids.len() > STOCK_BATCH_LIMIT {
            return Err(ErpError::BatchTooLarge(ids.len()));
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut url = self.endpoint("estoques/saldos")?;
        {
            let mut query = url.query_pairs_mut();
            for id in ids {
                query.append_pair("idsProdutos[]", &id.to_string());
            }
        }

        let rows: Vec<StockBalanceWire> = self.get_data(&url).await?.unwrap_or_default();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(category_id = %id))]
    async fn category_name(&self, id: ErpId) -> Result<Option<String>, ErpError> {
        if let Some(cached) = self.inner.categories.get(&id).await {
            return Ok(cached);
        }

        let url = self.endpoint(&format!("categorias/produtos/{id}"))?;
        let category: Option<CategoryWire> = self.get_data(&url).await?;
        let name = category.and_then(CategoryWire::into_name);

        self.inner.categories.insert(id, name.clone()).await;
        Ok(name)
    }

    #[instrument(skip(self))]
    async fn download_image(&self, url: &str) -> Result<DownloadedImage, ErpError> {
        // Media links are presigned CDN URLs, not API calls
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ErpError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let bytes = response.bytes().await?;

        Ok(DownloadedImage {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use secrecy::SecretString;
    use serde_json::{Value, json};

    fn config() -> ErpConfig {
        ErpConfig {
            api_base: "https://erp.example/Api/v3/".to_string(),
            token_url: "https://erp.example/Api/v3/oauth/token".to_string(),
            client_id: "client".to_string(),
            client_secret: SecretString::from("secret"),
            timeout: Duration::from_secs(5),
            min_interval: Duration::from_millis(50),
            max_attempts: 3,
            backoff: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_endpoint_joins_base() {
        let client = ErpClient::new(config(), None).unwrap();
        let url = client.endpoint("produtos/501").unwrap();
        assert_eq!(url.as_str(), "https://erp.example/Api/v3/produtos/501");
    }

    #[test]
    fn test_new_rejects_invalid_base() {
        let mut bad = config();
        bad.api_base = "not a url".to_string();
        assert!(matches!(
            ErpClient::new(bad, None),
            Err(ErpError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_unlinked_client_reports_not_linked() {
        let client = ErpClient::new(config(), None).unwrap();
        let err = client.access_token().await.unwrap_err();
        assert!(matches!(err, ErpError::NotLinked));
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_fresh_token_used_without_refresh() {
        let client = ErpClient::new(config(), None).unwrap();
        client
            .set_token(ErpToken {
                access_token: SecretString::from("live"),
                refresh_token: SecretString::from("r"),
                access_token_expires_at: chrono::Utc::now().timestamp() + 3600,
            })
            .await;
        assert_eq!(client.access_token().await.unwrap(), "live");
    }

    #[tokio::test]
    async fn test_stock_batch_limit() {
        let client = ErpClient::new(config(), None).unwrap();
        let ids: Vec<ErpId> = (0..51).map(ErpId::new).collect();
        let err = client.stock_balances(&ids).await.unwrap_err();
        assert!(matches!(err, ErpError::BatchTooLarge(51)));
        assert!(client.stock_balances(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_throttle_spaces_calls() {
        let client = ErpClient::new(config(), None).unwrap();
        let start = Instant::now();
        client.throttle().await;
        client.throttle().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    // =========================================================================
    // Against a local ERP
    // =========================================================================

    #[derive(Default)]
    struct Recorded {
        calls: Vec<Instant>,
        bearers: Vec<String>,
        refreshes: usize,
    }

    #[derive(Clone)]
    struct LocalErp {
        recorded: Arc<StdMutex<Recorded>>,
        /// Listing calls answered with 429 before the first success.
        throttled: usize,
    }

    async fn listing(State(erp): State<LocalErp>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
        let mut recorded = erp.recorded.lock().unwrap();
        recorded.calls.push(Instant::now());
        if let Some(bearer) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            recorded.bearers.push(bearer.to_string());
        }
        if recorded.calls.len() <= erp.throttled {
            return (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": "too many requests" })));
        }
        (
            StatusCode::OK,
            Json(json!({ "data": [{ "id": 2000, "nome": "Tênis Max", "formato": "S" }] })),
        )
    }

    async fn token_endpoint(State(erp): State<LocalErp>) -> Json<Value> {
        erp.recorded.lock().unwrap().refreshes += 1;
        Json(json!({ "access_token": "fresh", "refresh_token": "next", "expires_in": 3600 }))
    }

    async fn local_erp(throttled: usize) -> (ErpConfig, Arc<StdMutex<Recorded>>) {
        let recorded = Arc::new(StdMutex::new(Recorded::default()));
        let app = Router::new()
            .route("/produtos", get(listing))
            .route("/oauth/token", post(token_endpoint))
            .with_state(LocalErp {
                recorded: recorded.clone(),
                throttled,
            });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = ErpConfig {
            api_base: format!("http://{addr}"),
            token_url: format!("http://{addr}/oauth/token"),
            backoff: Duration::from_millis(40),
            min_interval: Duration::from_millis(5),
            ..config()
        };
        (config, recorded)
    }

    fn token_expiring_in(seconds: i64) -> ErpToken {
        ErpToken {
            access_token: SecretString::from("current"),
            refresh_token: SecretString::from("r"),
            access_token_expires_at: chrono::Utc::now().timestamp() + seconds,
        }
    }

    #[tokio::test]
    async fn test_rate_limited_call_retried_with_linear_backoff() {
        let (config, recorded) = local_erp(2).await;
        let client = ErpClient::new(config, None).unwrap();
        client.set_token(token_expiring_in(3600)).await;

        let items = client.list_page(1, 100).await.unwrap();
        assert_eq!(items.len(), 1);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.calls.len(), 3);
        let gaps: Vec<Duration> = recorded
            .calls
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .collect();
        assert!(gaps[0] >= Duration::from_millis(40));
        assert!(gaps[1] >= Duration::from_millis(80));
        assert_eq!(recorded.refreshes, 0);
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_after_max_attempts() {
        let (config, recorded) = local_erp(usize::MAX).await;
        let client = ErpClient::new(config, None).unwrap();
        client.set_token(token_expiring_in(3600)).await;

        let err = client.list_page(1, 100).await.unwrap_err();

        assert!(matches!(err, ErpError::RateLimited { attempts: 3 }));
        assert_eq!(recorded.lock().unwrap().calls.len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_hand_back_last_response() {
        let (config, recorded) = local_erp(usize::MAX).await;
        let client = ErpClient::new(config, None).unwrap();
        client.set_token(token_expiring_in(3600)).await;

        let url = client.endpoint("produtos").unwrap();
        let response = client.send(&url).await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(recorded.lock().unwrap().calls.len(), 3);
    }

    #[tokio::test]
    async fn test_token_refreshed_ahead_of_expiry() {
        let (config, recorded) = local_erp(0).await;
        let client = ErpClient::new(config, None).unwrap();
        client.set_token(token_expiring_in(120)).await;

        client.list_page(1, 100).await.unwrap();
        client.list_page(2, 100).await.unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.refreshes, 1);
        assert_eq!(recorded.bearers, vec!["Bearer fresh", "Bearer fresh"]);
    }
}
