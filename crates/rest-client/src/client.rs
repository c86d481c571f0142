//! Generic REST client wrapper around reqwest.

use crate::error::RestError;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, Response};
use std::time::Duration;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait suggested to the caller when a 429 carries no `Retry-After`.
const DEFAULT_RETRY_AFTER_MS: u64 = 60_000;

/// Generic REST client for making HTTP requests.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    /// Create a new REST client with the given base URL.
    ///
    /// # Arguments
    /// * `base_url` - Base URL for all requests (e.g., "https://testnet.binance.vision")
    /// * `timeout` - Request timeout duration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RestError::RequestBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a new REST client with default timeout.
    pub fn with_default_timeout(base_url: &str) -> Result<Self, RestError> {
        Self::new(base_url, DEFAULT_TIMEOUT)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and return the response body of a 2xx reply.
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - Request path (e.g., "/api/v3/order")
    /// * `query` - Optional query string (without leading '?')
    /// * `headers` - Additional headers
    ///
    /// Parameters always travel in the query string, also for POST/PUT/DELETE.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<String, RestError> {
        let url = self.build_url(path, query);
        tracing::debug!(method = %method, path = %path, "HTTP request");

        let mut request = self.client.request(method, &url);
        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Build a full URL from path and optional query string.
    fn build_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base_url, path, q),
            _ => format!("{}{}", self.base_url, path),
        }
    }

    /// Turn a response into its body, or an error for non-2xx statuses.
    async fn handle_response(&self, response: Response) -> Result<String, RestError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.text().await?);
        }

        if status.as_u16() == 429 {
            let retry_after_ms = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(DEFAULT_RETRY_AFTER_MS);

            tracing::warn!(retry_after_ms, "Rate limited");
            return Err(RestError::RateLimited { retry_after_ms });
        }

        let body = response.text().await.unwrap_or_default();
        Err(RestError::HttpError {
            status: status.as_u16(),
            message: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_no_query() {
        let client = RestClient::with_default_timeout("https://api.example.com").unwrap();
        assert_eq!(
            client.build_url("/api/v1/time", None),
            "https://api.example.com/api/v1/time"
        );
    }

    #[test]
    fn test_build_url_with_query() {
        let client = RestClient::with_default_timeout("https://api.example.com").unwrap();
        assert_eq!(
            client.build_url("/api/v1/order", Some("symbol=BTCUSDT&side=BUY")),
            "https://api.example.com/api/v1/order?symbol=BTCUSDT&side=BUY"
        );
    }

    #[test]
    fn test_build_url_strips_trailing_slash() {
        let client = RestClient::with_default_timeout("https://api.example.com/").unwrap();
        assert_eq!(
            client.build_url("/api/v1/time", None),
            "https://api.example.com/api/v1/time"
        );
    }

    #[test]
    fn test_build_url_empty_query() {
        let client = RestClient::with_default_timeout("https://api.example.com").unwrap();
        assert_eq!(
            client.build_url("/api/v1/time", Some("")),
            "https://api.example.com/api/v1/time"
        );
    }
}
