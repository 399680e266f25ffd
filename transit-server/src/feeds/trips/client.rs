//! Trip service HTTP client.
//!
//! One client covers three endpoints that usually live on different hosts:
//! trip search/route, wagon composition, and station metadata.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::{Composition, StationId, StationMetadata, TrainLabel, composition_timestamp};
use crate::feeds::http::{join, parse_base, parse_json, read_body};
use crate::feeds::{FeedError, TripMatch, TripRoute, TripSource};

use super::convert::{convert_summary, convert_trip};
use super::types::{TripResponse, TripsResponse};

const DEFAULT_BASE_URL: &str = "https://v6.db.transport.rest";
const DEFAULT_COMPOSITION_URL: &str = "https://ist-wr.noncd.db.de/wagenreihung/1.0";
const DEFAULT_STATION_META_URL: &str = "https://stations.finalrewind.org";
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Configuration for the trip client.
#[derive(Debug, Clone)]
pub struct TripClientConfig {
    /// Trip search and route endpoint
    pub base_url: String,
    /// Wagon composition endpoint
    pub composition_url: String,
    /// Station metadata endpoint
    pub station_meta_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl TripClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_composition_url(mut self, url: impl Into<String>) -> Self {
        self.composition_url = url.into();
        self
    }

    pub fn with_station_meta_url(mut self, url: impl Into<String>) -> Self {
        self.station_meta_url = url.into();
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for TripClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            composition_url: DEFAULT_COMPOSITION_URL.to_string(),
            station_meta_url: DEFAULT_STATION_META_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 20,
        }
    }
}

/// Trip service client.
#[derive(Debug, Clone)]
pub struct TripClient {
    http: reqwest::Client,
    base_url: Url,
    composition_url: Url,
    station_meta_url: Url,
    semaphore: Arc<Semaphore>,
}

impl TripClient {
    pub fn new(config: TripClientConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: parse_base(&config.base_url)?,
            composition_url: parse_base(&config.composition_url)?,
            station_meta_url: parse_base(&config.station_meta_url)?,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
        })
    }

    async fn get(&self, url: Url, query: &[(&str, String)], what: &str) -> Result<String, FeedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FeedError::NotConfigured("semaphore closed".to_string()))?;

        debug!(%url, "fetching");
        let response = self.http.get(url).query(query).send().await?;
        read_body(response, what).await
    }
}

impl TripSource for TripClient {
    async fn find_trips(
        &self,
        label: &TrainLabel,
        date: NaiveDate,
    ) -> Result<Vec<TripMatch>, FeedError> {
        let body = self
            .get(
                join(&self.base_url, &["trips"]),
                &[
                    ("query", label.number_name()),
                    ("when", format!("{}T00:00", date.format("%Y-%m-%d"))),
                ],
                &format!("trips for {}", label.number_name()),
            )
            .await?;

        let resp: TripsResponse = parse_json(&body)?;
        Ok(resp.trips.iter().map(convert_summary).collect())
    }

    async fn trip_route(&self, trip_id: &str) -> Result<TripRoute, FeedError> {
        let body = self
            .get(
                join(&self.base_url, &["trips", trip_id]),
                &[
                    ("polyline", "true".to_string()),
                    ("stopovers", "true".to_string()),
                    ("remarks", "true".to_string()),
                ],
                &format!("trip {trip_id}"),
            )
            .await?;

        let resp: TripResponse = parse_json(&body)?;
        Ok(convert_trip(&resp.trip))
    }

    async fn composition(
        &self,
        train_no: &str,
        sched_departure: DateTime<Utc>,
        station: StationId,
    ) -> Result<Composition, FeedError> {
        let ts = composition_timestamp(sched_departure);
        let body = self
            .get(
                join(&self.composition_url, &[train_no, ts.as_str()]),
                &[("eva", station.to_string())],
                &format!("composition of {train_no} at {station}"),
            )
            .await?;

        let raw: serde_json::Value = parse_json(&body)?;
        Composition::from_raw(raw).map_err(|e| FeedError::json(e, &body))
    }

    async fn station_metadata(
        &self,
        station: StationId,
    ) -> Result<Option<StationMetadata>, FeedError> {
        let eva = station.to_string();
        let result = self
            .get(
                join(&self.station_meta_url, &["stations", eva.as_str()]),
                &[],
                &format!("station {station}"),
            )
            .await;

        match result {
            Ok(body) => parse_json(&body).map(Some),
            Err(FeedError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
