//! HTTP client for the Blaze FHIR server
//!
//! [`BlazeClient`] owns the active base URL and a pool of `reqwest` clients,
//! one per distinct base URL. The FHIR interactions themselves live in
//! [`operations`].

mod error;
pub mod operations;
mod query;

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

pub use error::ClientError;
pub use query::QueryParams;

use crate::config::ServerConfig;

/// FHIR JSON media type used for both `Accept` and `Content-Type`
pub const FHIR_JSON: &str = "application/fhir+json";

/// Status and decoded body of a successful response
#[derive(Debug, Clone)]
pub struct FhirResponse {
    pub status: StatusCode,
    /// Decoded JSON body, `Value::Null` when the body is empty
    pub body: Value,
}

/// Lazily populated map from base URL to HTTP client.
///
/// Entries are only removed by [`ClientPool::close`].
pub struct ClientPool {
    timeout: Duration,
    clients: RwLock<HashMap<String, reqwest::Client>>,
}

impl ClientPool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Get the client for `base_url`, creating it on first use.
    pub async fn get(&self, base_url: &str) -> Result<reqwest::Client, ClientError> {
        if let Some(client) = self.clients.read().await.get(base_url) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(base_url) {
            return Ok(client.clone());
        }

        let client = self.build(base_url)?;
        debug!("Created HTTP client for {}", base_url);
        clients.insert(base_url.to_string(), client.clone());
        Ok(client)
    }

    fn build(&self, base_url: &str) -> Result<reqwest::Client, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FHIR_JSON));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|source| ClientError::Transport {
                url: base_url.to_string(),
                source,
            })
    }

    /// Number of pooled clients
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    /// Drop every pooled client. Calling this again is a no-op.
    ///
    /// Requests still in flight on a dropped client may fail with
    /// [`ClientError::Transport`].
    pub async fn close(&self) -> usize {
        let mut clients = self.clients.write().await;
        let closed = clients.len();
        clients.clear();
        closed
    }
}

/// Client for a Blaze FHIR server with a switchable base URL
pub struct BlazeClient {
    base_url: RwLock<String>,
    pool: ClientPool,
}

impl BlazeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: RwLock::new(normalize_base_url(&base_url.into())),
            pool: ClientPool::new(timeout),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.blaze_base_url.clone(), config.timeout())
    }

    /// The base URL used by requests that do not name one explicitly
    pub async fn base_url(&self) -> String {
        self.base_url.read().await.clone()
    }

    /// Replace the active base URL and return the previous one.
    ///
    /// Requests already in flight keep the URL they started with.
    pub async fn set_base_url(&self, url: &str) -> String {
        let url = normalize_base_url(url);
        let mut current = self.base_url.write().await;
        info!("Switching Blaze base URL from {} to {}", *current, url);
        std::mem::replace(&mut *current, url)
    }

    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }

    /// Close all pooled HTTP clients.
    pub async fn close(&self) {
        let closed = self.pool.close().await;
        if closed > 0 {
            info!("Closed {} pooled HTTP client(s)", closed);
        }
    }

    /// Send a request against the active base URL.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &QueryParams,
        body: Option<&Value>,
    ) -> Result<FhirResponse, ClientError> {
        let base_url = self.base_url().await;
        self.request_at(&base_url, method, path, query, body).await
    }

    /// Send a request against an explicit base URL.
    ///
    /// `path` is absolute relative to the base, e.g. `/Patient/123`.
    #[instrument(skip(self, query, body), fields(query_len = query.len()))]
    pub async fn request_at(
        &self,
        base_url: &str,
        method: Method,
        path: &str,
        query: &QueryParams,
        body: Option<&Value>,
    ) -> Result<FhirResponse, ClientError> {
        let base_url = normalize_base_url(base_url);
        let url = format!("{base_url}{path}");
        let client = self.pool.get(&base_url).await?;

        let mut request = client.request(method, &url);
        if !query.is_empty() {
            request = request.query(query.pairs());
        }
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(|source| ClientError::Transport {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        let url = response.url().to_string();
        let text = response
            .text()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        debug!("{} {}", status, url);

        if !status.is_success() {
            return Err(ClientError::http_status(status, url, text));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|source| ClientError::Decode { url, source })?
        };

        Ok(FhirResponse { status, body })
    }

    /// Send a request against the active base URL and return only the body.
    pub async fn request_json(
        &self,
        method: Method,
        path: &str,
        query: &QueryParams,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        Ok(self.request(method, path, query, body).await?.body)
    }
}

/// Strip surrounding whitespace and trailing slashes.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:8080/fhir/"),
            "http://localhost:8080/fhir"
        );
        assert_eq!(normalize_base_url(" http://blaze// "), "http://blaze");
        assert_eq!(normalize_base_url("http://blaze"), "http://blaze");
    }

    #[tokio::test]
    async fn test_set_base_url_returns_previous() {
        let client = BlazeClient::new("http://first:8080/fhir", Duration::from_secs(5));
        let previous = client.set_base_url("http://second:8080/fhir/").await;

        assert_eq!(previous, "http://first:8080/fhir");
        assert_eq!(client.base_url().await, "http://second:8080/fhir");
    }

    #[tokio::test]
    async fn test_pool_reuses_and_closes() {
        let pool = ClientPool::new(Duration::from_secs(5));
        pool.get("http://a/fhir").await.unwrap();
        pool.get("http://a/fhir").await.unwrap();
        pool.get("http://b/fhir").await.unwrap();
        assert_eq!(pool.len().await, 2);

        assert_eq!(pool.close().await, 2);
        assert!(pool.is_empty().await);
        assert_eq!(pool.close().await, 0);

        pool.get("http://a/fhir").await.unwrap();
        assert_eq!(pool.len().await, 1);
    }
}
