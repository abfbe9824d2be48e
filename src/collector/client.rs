//! HTTP client for the paginated job-search API
//!
//! The client issues one GET per page and classifies the outcome; retry
//! policy lives in the collector, not here. Authentication is a static API
//! key header. The base URL is configurable so integration tests can point
//! the client at a mock server.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};

use crate::config::ApiConfig;
use crate::models::{CollectionMetadata, CollectionQuery};
use crate::utils::error::FetchError;

/// Header carrying the static API key
const API_KEY_HEADER: &str = "X-Api-Key";

/// One successfully fetched page
#[derive(Debug)]
pub struct PageFetch {
    /// The raw response document, untouched
    pub payload: serde_json::Value,
    pub metadata: CollectionMetadata,
}

/// Search API client
pub struct SearchApiClient {
    client: Client,
    base_url: String,
}

impl SearchApiClient {
    /// Create a client from API configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created and
    /// `FetchError::InvalidUrl` if the API key is not a valid header value.
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        Self::with_timeout(config, Duration::from_secs(config.request_timeout_secs))
    }

    /// Create a client with an explicit timeout
    pub fn with_timeout(config: &ApiConfig, timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(&config.api_key)
            .map_err(|_| FetchError::InvalidUrl("API key is not a valid header value".into()))?;
        headers.insert(API_KEY_HEADER, key_value);

        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Fetch one page of search results.
    ///
    /// Outcome classification:
    /// - HTTP 200 with a JSON body: returned as a [`PageFetch`]
    /// - HTTP 429: `FetchError::RateLimited`
    /// - request timeout: `FetchError::Timeout`
    /// - anything else: `FetchError::ServerError` with the status code
    pub async fn fetch_page(&self, query: &CollectionQuery) -> Result<PageFetch, FetchError> {
        let started = Instant::now();

        let page = query.page.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("query", query.query.as_str()),
                ("page", page.as_str()),
                ("num_pages", "1"),
                ("country", query.country.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Http(e)
                }
            })?;

        let status = response.status();
        let response_time_ms = started.elapsed().as_millis() as u64;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedBody(e.to_string()))?;

        let job_count = payload
            .get("data")
            .and_then(|v| v.as_array())
            .map(|a| a.len())
            .unwrap_or(0);

        Ok(PageFetch {
            payload,
            metadata: CollectionMetadata {
                job_count,
                response_time_ms,
                status_code: status.as_u16(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn api_config(base_url: &str) -> ApiConfig {
        let mut config = Config::default().api;
        config.base_url = base_url.to_string();
        config.api_key = "test-key".to_string();
        config
    }

    #[test]
    fn test_client_creation() {
        let client = SearchApiClient::new(&api_config("http://localhost:9999"));
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_rejects_bad_api_key() {
        let mut config = api_config("http://localhost:9999");
        config.api_key = "bad\nkey".to_string();
        assert!(matches!(
            SearchApiClient::new(&config),
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
