use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Serialize;
use std::time::Duration;

use crate::error::{BenchError, Result};

/// HTTP client shared by every request of a run.
///
/// Wraps one `reqwest::Client`, so all clones share a single connection pool. The pool
/// has no cap on simultaneous connections; every in-flight request gets its own.
#[derive(Clone, Debug)]
pub struct BenchHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Fixed header set sent with every request
    headers: HeaderMap,

    /// Per-request timeout (0 = none), kept for error reporting
    request_timeout_secs: u64,
}

impl BenchHttpClient {
    /// Create a new HTTP client
    pub fn new(api_key: Option<&str>, request_timeout_secs: u64) -> Result<Self> {
        let mut builder = Client::builder().pool_max_idle_per_host(usize::MAX);

        if request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(request_timeout_secs));
        }

        let client = builder
            .build()
            .map_err(|e| BenchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            headers: build_headers(api_key)?,
            request_timeout_secs,
        })
    }

    /// Get the underlying reqwest client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
    }

    /// POST a JSON body. Single attempt; any status is returned to the caller.
    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Response> {
        tracing::trace!(url = %url, "Sending HTTP request");

        self.client
            .post(url)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| BenchError::from_reqwest(e, self.request_timeout_secs))
    }
}

/// `Content-Type: application/json`, plus `Authorization: Bearer <key>` when a
/// credential is configured.
pub fn build_headers(api_key: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|e| BenchError::ClientBuild(format!("invalid API key header: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}
