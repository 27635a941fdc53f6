//! Stop catalog over the administration REST API.
//!
//! Read-only: `GET {base}/stops` and `GET {base}/stops/{id}`, both with the
//! session token as a bearer credential.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::domain::foundation::StopId;
use crate::domain::queue::Stop;
use crate::ports::{CatalogError, StopCatalog, TokenStore};

/// `StopCatalog` backed by the REST API.
pub struct HttpStopCatalog {
    http_client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl HttpStopCatalog {
    /// Creates a catalog client.
    ///
    /// # Errors
    ///
    /// `CatalogError::Request` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Request(e.to_string()))?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn stops_url(&self) -> String {
        format!("{}/stops", self.base_url)
    }

    fn stop_url(&self, id: StopId) -> String {
        format!("{}/stops/{}", self.base_url, id)
    }

    /// Authenticated GET. `Ok(None)` on 404.
    async fn get(&self, url: &str) -> Result<Option<reqwest::Response>, CatalogError> {
        let token = self.tokens.token().await.ok_or(CatalogError::Unauthorized)?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| CatalogError::Request(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(CatalogError::Unauthorized)
            }
            status if !status.is_success() => {
                let error_text = response.text().await.unwrap_or_default();
                tracing::warn!(%url, %status, "stop API error");
                Err(CatalogError::Request(format!("{}: {}", status, error_text)))
            }
            _ => Ok(Some(response)),
        }
    }
}

#[async_trait]
impl StopCatalog for HttpStopCatalog {
    async fn list_stops(&self) -> Result<Vec<Stop>, CatalogError> {
        let url = self.stops_url();
        let response = self
            .get(&url)
            .await?
            .ok_or_else(|| CatalogError::Request(format!("{} not found", url)))?;
        response
            .json::<Vec<Stop>>()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))
    }

    async fn get_stop(&self, id: StopId) -> Result<Stop, CatalogError> {
        let response = self
            .get(&self.stop_url(id))
            .await?
            .ok_or(CatalogError::NotFound(id))?;
        response
            .json::<Stop>()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryTokenStore;

    fn catalog(base: &str, tokens: InMemoryTokenStore) -> HttpStopCatalog {
        HttpStopCatalog::new(base, Duration::from_millis(500), Arc::new(tokens)).unwrap()
    }

    #[test]
    fn urls_ignore_trailing_slash() {
        let c = catalog("http://api.local/v1/", InMemoryTokenStore::new());
        assert_eq!(c.stops_url(), "http://api.local/v1/stops");
        assert_eq!(c.stop_url(StopId::new(5).unwrap()), "http://api.local/v1/stops/5");
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized_without_request() {
        let c = catalog("http://127.0.0.1:1", InMemoryTokenStore::new());
        assert!(matches!(c.list_stops().await, Err(CatalogError::Unauthorized)));
    }

    #[tokio::test]
    async fn unreachable_api_is_a_request_error() {
        let c = catalog("http://127.0.0.1:1", InMemoryTokenStore::with_token("t"));
        assert!(matches!(c.list_stops().await, Err(CatalogError::Request(_))));
    }

    #[tokio::test]
    async fn single_stop_lookup_shares_auth_and_transport_errors() {
        let id = StopId::new(9).unwrap();

        let c = catalog("http://127.0.0.1:1", InMemoryTokenStore::new());
        assert!(matches!(c.get_stop(id).await, Err(CatalogError::Unauthorized)));

        let c = catalog("http://127.0.0.1:1", InMemoryTokenStore::with_token("t"));
        assert!(matches!(c.get_stop(id).await, Err(CatalogError::Request(_))));
    }
}
