//! Caching layer for feed responses.
//!
//! Check-out polling and retry storms hit the same boards over and over.
//! Board snapshots are cached briefly and keyed by minute bucket so that a
//! cached "now" window does not drift; realtime route data is cached even
//! more briefly. Slow-changing data (compositions, station metadata, trip
//! search hits) lives longer. Errors are never cached.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use moka::future::Cache as MokaCache;

use crate::domain::{Composition, StationId, StationMetadata, TrainLabel};

use super::{DepartureBoard, DepartureLookup, FeedError, LookupWindow, TripMatch, TripRoute, TripSource};

/// Cache key for boards: (station query, window, minute bucket).
type BoardKey = (String, LookupWindow, i64);

/// Configuration for the feed caches.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for departure board snapshots.
    pub board_ttl: Duration,

    /// TTL for realtime trip routes.
    pub route_ttl: Duration,

    /// TTL for wagon compositions.
    pub composition_ttl: Duration,

    /// TTL for station metadata.
    pub station_ttl: Duration,

    /// TTL for trip search results.
    pub trip_match_ttl: Duration,

    /// Maximum number of entries per cache.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            board_ttl: Duration::from_secs(90),
            route_ttl: Duration::from_secs(30),
            composition_ttl: Duration::from_secs(10 * 60),
            station_ttl: Duration::from_secs(24 * 60 * 60),
            trip_match_ttl: Duration::from_secs(10 * 60),
            max_capacity: 1000,
        }
    }
}

fn cache<K, V>(ttl: Duration, capacity: u64) -> MokaCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    MokaCache::builder()
        .time_to_live(ttl)
        .max_capacity(capacity)
        .build()
}

/// Departure board with caching.
///
/// Wraps any `DepartureBoard` and caches successful lookups.
pub struct CachedBoard<B> {
    inner: B,
    boards: MokaCache<BoardKey, Arc<DepartureLookup>>,
}

impl<B: DepartureBoard> CachedBoard<B> {
    pub fn new(inner: B, config: &CacheConfig) -> Self {
        Self {
            inner,
            boards: cache(config.board_ttl, config.max_capacity),
        }
    }

    /// Access the underlying board for lookups that bypass the cache.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

fn minute_bucket(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(60)
}

impl<B: DepartureBoard> DepartureBoard for CachedBoard<B> {
    async fn departures(
        &self,
        station: &str,
        window: LookupWindow,
    ) -> Result<DepartureLookup, FeedError> {
        let key = (station.to_string(), window, minute_bucket(Utc::now()));

        if let Some(cached) = self.boards.get(&key).await {
            return Ok((*cached).clone());
        }

        let lookup = self.inner.departures(station, window).await?;
        self.boards.insert(key, Arc::new(lookup.clone())).await;

        Ok(lookup)
    }
}

/// Trip source with caching.
pub struct CachedTrips<T> {
    inner: T,
    matches: MokaCache<(String, NaiveDate), Arc<Vec<TripMatch>>>,
    routes: MokaCache<String, Arc<TripRoute>>,
    compositions: MokaCache<(String, i64, StationId), Arc<Composition>>,
    stations: MokaCache<StationId, Option<Arc<StationMetadata>>>,
}

impl<T: TripSource> CachedTrips<T> {
    pub fn new(inner: T, config: &CacheConfig) -> Self {
        Self {
            inner,
            matches: cache(config.trip_match_ttl, config.max_capacity),
            routes: cache(config.route_ttl, config.max_capacity),
            compositions: cache(config.composition_ttl, config.max_capacity),
            stations: cache(config.station_ttl, config.max_capacity),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: TripSource> TripSource for CachedTrips<T> {
    async fn find_trips(
        &self,
        label: &TrainLabel,
        date: NaiveDate,
    ) -> Result<Vec<TripMatch>, FeedError> {
        let key = (label.number_name(), date);
        if let Some(cached) = self.matches.get(&key).await {
            return Ok((*cached).clone());
        }

        let found = self.inner.find_trips(label, date).await?;
        self.matches.insert(key, Arc::new(found.clone())).await;
        Ok(found)
    }

    async fn trip_route(&self, trip_id: &str) -> Result<TripRoute, FeedError> {
        if let Some(cached) = self.routes.get(trip_id).await {
            return Ok((*cached).clone());
        }

        let route = self.inner.trip_route(trip_id).await?;
        self.routes
            .insert(trip_id.to_string(), Arc::new(route.clone()))
            .await;
        Ok(route)
    }

    async fn composition(
        &self,
        train_no: &str,
        sched_departure: DateTime<Utc>,
        station: StationId,
    ) -> Result<Composition, FeedError> {
        let key = (train_no.to_string(), sched_departure.timestamp(), station);
        if let Some(cached) = self.compositions.get(&key).await {
            return Ok((*cached).clone());
        }

        let composition = self
            .inner
            .composition(train_no, sched_departure, station)
            .await?;
        self.compositions
            .insert(key, Arc::new(composition.clone()))
            .await;
        Ok(composition)
    }

    async fn station_metadata(
        &self,
        station: StationId,
    ) -> Result<Option<StationMetadata>, FeedError> {
        if let Some(cached) = self.stations.get(&station).await {
            return Ok(cached.map(|m| (*m).clone()));
        }

        let meta = self.inner.station_metadata(station).await?;
        self.stations
            .insert(station, meta.clone().map(Arc::new))
            .await;
        Ok(meta)
    }
}
