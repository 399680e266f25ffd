//! In-memory feeds for development and testing.
//!
//! `MockBoard` serves programmed lookups (or JSON fixtures in the board
//! API format) as if they were live. `MockTrips` does the same for the trip
//! source. Both can be reprogrammed while in use, which is how tests model a
//! train that has not arrived yet and then does.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{Composition, StationId, StationMetadata, TrainLabel};

use super::board::{BoardResponse, convert_board};
use super::{DepartureBoard, DepartureLookup, FeedError, LookupWindow, TripMatch, TripRoute, TripSource};

/// Departure board serving programmed lookups.
#[derive(Default)]
pub struct MockBoard {
    /// Lookups keyed by station id and by station name.
    lookups: Mutex<HashMap<String, DepartureLookup>>,
    /// Lookups served when related stations are requested.
    related: Mutex<HashMap<String, DepartureLookup>>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl MockBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{eva}.json` files in the board API format from a directory.
    pub fn from_dir(data_dir: impl AsRef<Path>) -> Result<Self, FeedError> {
        let data_dir = data_dir.as_ref();
        let board = Self::new();

        let entries = std::fs::read_dir(data_dir).map_err(|e| {
            FeedError::NotConfigured(format!("failed to read mock data directory: {e}"))
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| FeedError::NotConfigured(format!("failed to read directory entry: {e}")))?
                .path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let json = std::fs::read_to_string(&path).map_err(|e| {
                FeedError::NotConfigured(format!("failed to read {}: {e}", path.display()))
            })?;
            let response: BoardResponse = serde_json::from_str(&json)
                .map_err(|e| FeedError::json(e, &json))?;
            let lookup = convert_board(&response).map_err(|e| {
                FeedError::NotConfigured(format!("failed to convert {}: {e}", path.display()))
            })?;
            board.set(lookup);
        }

        if board.lock_lookups().is_empty() {
            return Err(FeedError::NotConfigured(format!(
                "no mock board files found in {}",
                data_dir.display()
            )));
        }

        Ok(board)
    }

    fn lock_lookups(&self) -> std::sync::MutexGuard<'_, HashMap<String, DepartureLookup>> {
        self.lookups.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve `lookup` for queries by its station's id or name.
    pub fn set(&self, lookup: DepartureLookup) {
        let mut lookups = self.lock_lookups();
        lookups.insert(lookup.station.id.to_string(), lookup.clone());
        lookups.insert(lookup.station.name.clone(), lookup);
    }

    /// Serve `lookup` for related-station queries of its station.
    pub fn set_related(&self, lookup: DepartureLookup) {
        let mut related = self.related.lock().unwrap_or_else(|e| e.into_inner());
        related.insert(lookup.station.id.to_string(), lookup.clone());
        related.insert(lookup.station.name.clone(), lookup);
    }

    /// Make every query for `station` fail.
    pub fn fail(&self, station: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(station.to_string());
    }

    /// Stop failing queries for `station`.
    pub fn recover(&self, station: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(station);
    }

    /// Number of lookups served (including failed ones).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, station: &str, window: LookupWindow) -> Result<DepartureLookup, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(station)
        {
            return Err(FeedError::Upstream(format!("mock failure for {station}")));
        }

        if window.with_related {
            let related = self.related.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(lookup) = related.get(station) {
                return Ok(lookup.clone());
            }
        }

        self.lock_lookups()
            .get(station)
            .cloned()
            .ok_or_else(|| FeedError::NotFound(format!("no mock data for station {station}")))
    }
}

impl DepartureBoard for MockBoard {
    async fn departures(
        &self,
        station: &str,
        window: LookupWindow,
    ) -> Result<DepartureLookup, FeedError> {
        self.lookup(station, window)
    }
}

#[derive(Default)]
struct TripData {
    matches: HashMap<String, Vec<TripMatch>>,
    routes: HashMap<String, TripRoute>,
    compositions: HashMap<String, Composition>,
    stations: HashMap<StationId, StationMetadata>,
}

/// Trip source serving programmed data. Unknown keys are `NotFound`.
#[derive(Default)]
pub struct MockTrips {
    data: Mutex<TripData>,
    calls: AtomicUsize,
}

impl MockTrips {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> std::sync::MutexGuard<'_, TripData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Trips returned for searches by `number_name` (e.g. "ICE 703").
    pub fn set_trips(&self, number_name: &str, matches: Vec<TripMatch>) {
        self.data().matches.insert(number_name.to_string(), matches);
    }

    pub fn set_route(&self, trip_id: &str, route: TripRoute) {
        self.data().routes.insert(trip_id.to_string(), route);
    }

    /// Composition served for `train_no`, regardless of time and station.
    pub fn set_composition(&self, train_no: &str, composition: Composition) {
        self.data()
            .compositions
            .insert(train_no.to_string(), composition);
    }

    pub fn set_station_metadata(&self, id: StationId, meta: StationMetadata) {
        self.data().stations.insert(id, meta);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl TripSource for MockTrips {
    async fn find_trips(
        &self,
        label: &TrainLabel,
        _date: NaiveDate,
    ) -> Result<Vec<TripMatch>, FeedError> {
        self.count();
        let key = label.number_name();
        self.data()
            .matches
            .get(&key)
            .cloned()
            .ok_or(FeedError::NotFound(key))
    }

    async fn trip_route(&self, trip_id: &str) -> Result<TripRoute, FeedError> {
        self.count();
        self.data()
            .routes
            .get(trip_id)
            .cloned()
            .ok_or_else(|| FeedError::NotFound(format!("trip {trip_id}")))
    }

    async fn composition(
        &self,
        train_no: &str,
        _sched_departure: DateTime<Utc>,
        _station: StationId,
    ) -> Result<Composition, FeedError> {
        self.count();
        self.data()
            .compositions
            .get(train_no)
            .cloned()
            .ok_or_else(|| FeedError::NotFound(format!("composition of {train_no}")))
    }

    async fn station_metadata(
        &self,
        station: StationId,
    ) -> Result<Option<StationMetadata>, FeedError> {
        self.count();
        self.data()
            .stations
            .get(&station)
            .cloned()
            .map(Some)
            .ok_or_else(|| FeedError::NotFound(format!("station {station}")))
    }
}
