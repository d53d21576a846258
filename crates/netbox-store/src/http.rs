//! HTTP client wrapper for the NetBox API
//!
//! Every request and its body read race the caller's cancellation token; a
//! fired token drops the exchange and surfaces as `NetBoxStoreError::Cancelled`.

use crate::error::NetBoxStoreError;
use crate::models::PaginatedResponse;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// HTTP client wrapper with authentication
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

// Keeps the API token out of logs
impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    ///
    /// # Arguments
    /// * `base_url` - NetBox base URL (e.g., "http://netbox:80")
    /// * `token` - API token for authentication
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, NetBoxStoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path; absolute URLs (pagination links) pass through
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
    }

    /// Send a request and read its body unless the token fires first
    async fn send(
        &self,
        cancel: &CancellationToken,
        request: RequestBuilder,
    ) -> Result<(StatusCode, String), NetBoxStoreError> {
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, NetBoxStoreError>((status, body))
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(NetBoxStoreError::Cancelled),
            result = exchange => result,
        }
    }

    /// Decode a successful response body, classifying failures by status
    fn decode<T: DeserializeOwned>(
        (status, body): (StatusCode, String),
        context: &str,
    ) -> Result<T, NetBoxStoreError> {
        if !status.is_success() {
            return Err(NetBoxStoreError::from_status(status, context, &body));
        }
        serde_json::from_str(&body).map_err(|e| {
            NetBoxStoreError::Api(format!(
                "error decoding response body: {} - Response (first 500 chars): {}",
                e,
                body.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Fetch all pages of a paginated listing, following `next` links
    pub async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<Vec<T>, NetBoxStoreError> {
        let mut all_results = Vec::new();
        let mut url = self.build_url(path);

        loop {
            debug!("Fetching page: {}", url);
            let response = self.send(cancel, self.authorized(self.client.get(&url))).await?;
            let page: PaginatedResponse<T> = Self::decode(response, "Failed to fetch page")?;
            all_results.extend(page.results);

            match page.next {
                Some(next_url) => url = self.build_url(&next_url),
                None => break,
            }
        }

        Ok(all_results)
    }

    /// GET a single object; 404 becomes `None`
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<Option<T>, NetBoxStoreError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self.send(cancel, self.authorized(self.client.get(&url))).await?;
        match Self::decode(response, &format!("GET {}", path)) {
            Ok(value) => Ok(Some(value)),
            Err(NetBoxStoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, NetBoxStoreError> {
        let url = self.build_url(path);
        debug!("POST {} with body: {}", url, body);

        let request = self.authorized(self.client.post(&url)).json(body);
        let response = self.send(cancel, request).await?;
        Self::decode(response, &format!("POST {}", path))
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, NetBoxStoreError> {
        let url = self.build_url(path);
        debug!("PATCH {} with body: {}", url, body);

        let request = self.authorized(self.client.patch(&url)).json(body);
        let response = self.send(cancel, request).await?;
        Self::decode(response, &format!("PATCH {}", path))
    }

    /// Lightweight authenticated request against `/api/status/`
    pub async fn check_status(&self, cancel: &CancellationToken) -> Result<(), NetBoxStoreError> {
        let response = self.send(cancel, self.authorized(self.client.get(self.build_url("/api/status/")))).await?;
        let _: serde_json::Value = Self::decode(response, "GET /api/status/")?;
        Ok(())
    }

    /// Build query string from filters
    pub fn build_query_string(filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
