//! Upstream feed clients.
//!
//! Two independent providers feed the engine:
//!
//! - a live **departure board**, station-scoped, which lists trains passing a
//!   station in a time window together with their remaining route by name
//! - a **trip source** for everything secondary: trip ids, per-stop times,
//!   polylines, wagon composition and station metadata
//!
//! Both are unreliable. Every call may fail or time out, and every field of
//! a successful answer may be missing. Callers never treat absence of data as
//! fatal.

pub mod board;
mod cache;
mod error;
mod http;
pub mod mock;
pub mod trips;

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    Composition, GeoPoint, Message, RouteStop, Station, StationId, StationMetadata, TrainId,
    TrainLabel,
};

pub use cache::{CacheConfig, CachedBoard, CachedTrips};
pub use error::FeedError;

/// Time window for a board lookup, relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupWindow {
    pub lookbehind_mins: u32,
    pub lookahead_mins: u32,
    /// Also list trains at administratively distinct but equivalent stations
    pub with_related: bool,
}

impl LookupWindow {
    pub const fn new(lookbehind_mins: u32, lookahead_mins: u32) -> Self {
        Self {
            lookbehind_mins,
            lookahead_mins,
            with_related: false,
        }
    }

    pub const fn with_related(mut self) -> Self {
        self.with_related = true;
        self
    }
}

/// A train as seen on one station's departure board.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainCandidate {
    pub train_id: TrainId,
    pub label: TrainLabel,
    /// Station the train was observed at (may be a related station)
    pub station: Station,
    pub platform: Option<String>,
    pub sched_arrival: Option<DateTime<Utc>>,
    pub rt_arrival: Option<DateTime<Utc>>,
    pub sched_departure: Option<DateTime<Utc>>,
    pub rt_departure: Option<DateTime<Utc>>,
    /// The stop at this station is cancelled for arriving passengers
    pub arrival_cancelled: bool,
    /// The stop at this station is cancelled for departing passengers
    pub departure_cancelled: bool,
    /// Stops before this station, in order
    pub route_pre: Vec<String>,
    /// Stops after this station, in order
    pub route_post: Vec<String>,
    pub messages: Vec<Message>,
}

impl TrainCandidate {
    /// Realtime arrival if known, else scheduled.
    pub fn arrival(&self) -> Option<DateTime<Utc>> {
        self.rt_arrival.or(self.sched_arrival)
    }

    /// Realtime departure if known, else scheduled.
    pub fn departure(&self) -> Option<DateTime<Utc>> {
        self.rt_departure.or(self.sched_departure)
    }

    /// Name of the first stop on the route.
    pub fn origin(&self) -> &str {
        self.route_pre
            .first()
            .map(String::as_str)
            .unwrap_or(&self.station.name)
    }

    /// Full route as stops, with this station's times filled in.
    pub fn route(&self) -> Vec<RouteStop> {
        let mut stops: Vec<RouteStop> = self.route_pre.iter().map(RouteStop::named).collect();
        stops.push(RouteStop {
            name: self.station.name.clone(),
            id: Some(self.station.id),
            sched_arrival: self.sched_arrival,
            rt_arrival: self.rt_arrival,
            sched_departure: self.sched_departure,
            rt_departure: self.rt_departure,
            arrival_delay: delay_mins(self.sched_arrival, self.rt_arrival),
            departure_delay: delay_mins(self.sched_departure, self.rt_departure),
            is_cancelled: self.arrival_cancelled && self.departure_cancelled,
            ..RouteStop::default()
        });
        stops.extend(self.route_post.iter().map(RouteStop::named));
        stops
    }

    /// True if `name` is a later stop on this train's route.
    pub fn calls_after(&self, name: &str) -> bool {
        self.route_post.iter().any(|s| s == name)
    }
}

fn delay_mins(sched: Option<DateTime<Utc>>, rt: Option<DateTime<Utc>>) -> Option<i32> {
    Some((rt? - sched?).num_minutes() as i32)
}

/// Result of a board lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct DepartureLookup {
    /// The station the query resolved to
    pub station: Station,
    /// Related stations included in `results`, if requested
    pub related: Vec<Station>,
    pub results: Vec<TrainCandidate>,
}

impl DepartureLookup {
    pub fn empty(station: Station) -> Self {
        Self {
            station,
            related: Vec::new(),
            results: Vec::new(),
        }
    }

    /// All occurrences of a train, in board order.
    pub fn occurrences<'a>(
        &'a self,
        train_id: &TrainId,
    ) -> impl Iterator<Item = &'a TrainCandidate> {
        self.results.iter().filter(move |c| &c.train_id == train_id)
    }
}

/// A trip found by the secondary trip search.
#[derive(Debug, Clone, PartialEq)]
pub struct TripMatch {
    pub trip_id: String,
    pub origin: String,
    pub origin_id: Option<StationId>,
    pub departure: Option<DateTime<Utc>>,
}

/// Refined route of a trip.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TripRoute {
    pub stops: Vec<RouteStop>,
    pub messages: Vec<Message>,
    pub polyline: Option<Vec<GeoPoint>>,
}

/// A live departure board.
///
/// `station` is an id or an exact station name.
pub trait DepartureBoard: Send + Sync + 'static {
    fn departures(
        &self,
        station: &str,
        window: LookupWindow,
    ) -> impl Future<Output = Result<DepartureLookup, FeedError>> + Send;
}

/// The secondary trip-search and metadata provider.
pub trait TripSource: Send + Sync + 'static {
    /// Trips running under `label` on the given local date.
    fn find_trips(
        &self,
        label: &TrainLabel,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<TripMatch>, FeedError>> + Send;

    /// Per-stop times, messages and path of a trip.
    fn trip_route(
        &self,
        trip_id: &str,
    ) -> impl Future<Output = Result<TripRoute, FeedError>> + Send;

    /// Wagon order of a train at a station.
    fn composition(
        &self,
        train_no: &str,
        sched_departure: DateTime<Utc>,
        station: StationId,
    ) -> impl Future<Output = Result<Composition, FeedError>> + Send;

    /// Platform layout of a station, if the provider has one.
    fn station_metadata(
        &self,
        station: StationId,
    ) -> impl Future<Output = Result<Option<StationMetadata>, FeedError>> + Send;
}
