//! The active in-transit session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Composition, Message, MonthKey, RouteStop, Station, TrainId, TrainLabel, TravelerId};

/// Who may see a traveler's status.
///
/// Ordered from most to least restrictive; the discriminant is the stored
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private = 10,
    Unlisted = 30,
    Followers = 60,
    LoggedIn = 80,
    Public = 100,
}

impl Visibility {
    pub fn level(self) -> i64 {
        self as i64
    }

    /// Map a stored level back. Unknown levels round down to the next
    /// defined one, so a corrupt value never widens visibility.
    pub fn from_level(level: i64) -> Self {
        match level {
            l if l >= 100 => Visibility::Public,
            l if l >= 80 => Visibility::LoggedIn,
            l if l >= 60 => Visibility::Followers,
            l if l >= 30 => Visibility::Unlisted,
            _ => Visibility::Private,
        }
    }
}

/// Data attached by the enrichment pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnrichmentData {
    /// Trip id in the secondary feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    /// Reference into the shared polyline table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polyline_id: Option<i64>,
    /// Formation at the departure station
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition_dep: Option<Composition>,
    /// Formation at the arrival station
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition_arr: Option<Composition>,
    /// Set when the train runs with the marker vehicle group
    #[serde(default)]
    pub pride: bool,
}

/// Data the traveler edits directly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Overrides the traveler's default visibility for this trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

/// A traveler's current trip.
///
/// Arrival fields stay `None` until a check-out attempt names a destination,
/// and arrival times stay `None` until a feed reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitSession {
    pub traveler: TravelerId,
    pub train_id: TrainId,
    pub train: TrainLabel,

    pub departure: Station,
    pub dep_platform: Option<String>,
    pub sched_departure: Option<DateTime<Utc>>,
    pub real_departure: Option<DateTime<Utc>>,

    pub arrival: Option<Station>,
    pub arr_platform: Option<String>,
    pub sched_arrival: Option<DateTime<Utc>>,
    pub real_arrival: Option<DateTime<Utc>>,

    #[serde(default)]
    pub route: Vec<RouteStop>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub enrichment: EnrichmentData,
    #[serde(default)]
    pub user_data: UserData,

    /// Departure (or, once finalized, the onward trip) was cancelled
    #[serde(default)]
    pub cancelled: bool,
    /// Where the traveler ended up when the trip was cut short
    #[serde(default)]
    pub cancelled_destination: Option<String>,

    pub checked_in_at: DateTime<Utc>,
}

impl TransitSession {
    /// Real departure if known, else scheduled.
    pub fn departure_time(&self) -> Option<DateTime<Utc>> {
        self.real_departure.or(self.sched_departure)
    }

    /// Real arrival if known, else scheduled.
    pub fn arrival_time(&self) -> Option<DateTime<Utc>> {
        self.real_arrival.or(self.sched_arrival)
    }

    /// Month the trip is filed under for statistics.
    pub fn month(&self) -> MonthKey {
        MonthKey::of(self.departure_time().unwrap_or(self.checked_in_at))
    }

    /// Same physical trip: same train id from the same departure station.
    pub fn is_same_trip(&self, other: &TransitSession) -> bool {
        self.train_id == other.train_id && self.departure.id == other.departure.id
    }

    /// Record the arrival station a check-out attempt resolved.
    ///
    /// Switching to a different station drops arrival data that belonged to
    /// the previous one.
    pub fn set_arrival_station(&mut self, station: Station) {
        if self.arrival.as_ref().map(|s| s.id) != Some(station.id) {
            self.arr_platform = None;
            self.sched_arrival = None;
            self.real_arrival = None;
            self.enrichment.composition_arr = None;
        }
        self.arrival = Some(station);
    }

    /// Index of the departure stop within the route.
    pub fn departure_index(&self) -> Option<usize> {
        self.route
            .iter()
            .position(|s| s.is_station(Some(self.departure.id), &self.departure.name))
    }

    /// Index of the arrival stop within the route, searched after the
    /// departure stop so loops do not match the wrong visit.
    pub fn arrival_index(&self) -> Option<usize> {
        let arrival = self.arrival.as_ref()?;
        let start = self.departure_index().map(|i| i + 1).unwrap_or(0);
        self.route
            .iter()
            .skip(start)
            .position(|s| s.is_station(Some(arrival.id), &arrival.name))
            .map(|i| i + start)
    }
}
