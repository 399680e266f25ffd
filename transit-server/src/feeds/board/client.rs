//! Departure board HTTP client.
//!
//! Handles authentication, request concurrency and conversion to feed types.

use std::sync::Arc;

use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderValue};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::feeds::http::{join, parse_base, parse_json, read_body};
use crate::feeds::{DepartureBoard, DepartureLookup, FeedError, LookupWindow};

use super::convert::convert_board;
use super::types::BoardResponse;

/// Default base URL for the board API.
const DEFAULT_BASE_URL: &str = "https://dbf.finalrewind.org/api";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Configuration for the board client.
#[derive(Debug, Clone)]
pub struct BoardClientConfig {
    /// API key, sent as `x-apikey` when not empty
    pub api_key: String,
    /// Base URL for the API
    pub base_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl BoardClientConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 20,
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for BoardClientConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Departure board API client.
///
/// Uses a semaphore to limit concurrent requests and avoid rate limiting.
#[derive(Debug, Clone)]
pub struct BoardClient {
    http: reqwest::Client,
    base_url: Url,
    semaphore: Arc<Semaphore>,
}

impl BoardClient {
    /// Create a new board client with the given configuration.
    pub fn new(config: BoardClientConfig) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();

        if !config.api_key.is_empty() {
            let api_key = HeaderValue::from_str(&config.api_key)
                .map_err(|_| FeedError::NotConfigured("invalid API key format".to_string()))?;
            headers.insert("x-apikey", api_key);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: parse_base(&config.base_url)?,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
        })
    }

    /// Fetch the raw board response.
    pub async fn fetch(
        &self,
        station: &str,
        window: LookupWindow,
    ) -> Result<BoardResponse, FeedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FeedError::NotConfigured("semaphore closed".to_string()))?;

        let url = join(&self.base_url, &["departures", station]);
        debug!(%station, ?window, "fetching departure board");

        let response = self
            .http
            .get(url)
            .query(&[
                ("lookbehind", window.lookbehind_mins.to_string()),
                ("lookahead", window.lookahead_mins.to_string()),
                ("with_related", u8::from(window.with_related).to_string()),
            ])
            .send()
            .await?;

        let body = read_body(response, &format!("station {station}")).await?;
        parse_json(&body)
    }
}

impl DepartureBoard for BoardClient {
    async fn departures(
        &self,
        station: &str,
        window: LookupWindow,
    ) -> Result<DepartureLookup, FeedError> {
        let board = self.fetch(station, window).await?;

        if let Some(error) = board.error.as_ref().filter(|e| !e.is_empty()) {
            return Err(FeedError::Upstream(error.clone()));
        }

        convert_board(&board).map_err(|e| FeedError::Json {
            message: e.to_string(),
            body: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = BoardClientConfig::new("test-key")
            .with_base_url("http://localhost:8080")
            .with_max_concurrent(10)
            .with_timeout(60);

        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn config_defaults() {
        let config = BoardClientConfig::default();

        assert_eq!(config.api_key, "");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.timeout_secs, 20);
    }

    #[test]
    fn client_creation() {
        assert!(BoardClient::new(BoardClientConfig::new("test-key")).is_ok());
        assert!(BoardClient::new(BoardClientConfig::default()).is_ok());
        assert!(BoardClient::new(BoardClientConfig::new("bad\nkey")).is_err());
        assert!(BoardClient::new(BoardClientConfig::new("k").with_base_url("nope")).is_err());
    }

    #[tokio::test]
    async fn station_name_is_one_path_segment() {
        use axum::Router;
        use axum::extract::Path;
        use axum::routing::get;
        use std::sync::{Arc, Mutex};

        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let app = Router::new().route(
            "/api/departures/:station",
            get({
                let seen = Arc::clone(&seen);
                move |Path(station): Path<String>| async move {
                    seen.lock().unwrap().push(station);
                    r#"{"trains": []}"#
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let client = BoardClient::new(
            BoardClientConfig::new("k").with_base_url(format!("http://{addr}/api/")),
        )
        .unwrap();
        let board = client
            .fetch("Köln Messe/Deutz", LookupWindow::new(10, 10))
            .await
            .unwrap();

        assert!(board.trains.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec!["Köln Messe/Deutz".to_string()]);
    }
}
