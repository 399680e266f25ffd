//! Route stop types.
//!
//! A `RouteStop` is one station on a train's route, as embedded in a
//! session or journey. Board data only knows stop names; the trip source
//! later fills in ids, coordinates and per-stop times.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StationId;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// A station on a route with scheduled and realtime times.
///
/// # Time Semantics
///
/// - `sched_*` is the timetable ("planned") time
/// - `rt_*` is the realtime estimate or actual time
/// - Delays are minutes, positive when late
///
/// Every field except the name is optional: the two feeds disagree on what
/// they know, and a later merge must be able to tell "unknown" from "known".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteStop {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sched_arrival: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt_arrival: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sched_departure: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt_departure: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_delay: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_delay: Option<i32>,
    #[serde(default)]
    pub is_cancelled: bool,
    #[serde(default)]
    pub is_additional: bool,
}

impl RouteStop {
    /// A stop known only by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the best available arrival time (realtime if available, else scheduled).
    pub fn expected_arrival(&self) -> Option<DateTime<Utc>> {
        self.rt_arrival.or(self.sched_arrival)
    }

    /// Returns the best available departure time (realtime if available, else scheduled).
    pub fn expected_departure(&self) -> Option<DateTime<Utc>> {
        self.rt_departure.or(self.sched_departure)
    }

    /// Realtime arrival, or scheduled arrival shifted by the reported delay.
    ///
    /// Some stops carry a delay without an explicit realtime timestamp.
    pub fn inferred_arrival(&self) -> Option<DateTime<Utc>> {
        self.rt_arrival.or_else(|| {
            let sched = self.sched_arrival?;
            let delay = self.arrival_delay.unwrap_or(0);
            Some(sched + chrono::Duration::minutes(delay as i64))
        })
    }

    /// True if this stop is the station given by id or name.
    ///
    /// Ids win when both sides have one; names are the fallback because
    /// board data has no ids.
    pub fn is_station(&self, id: Option<StationId>, name: &str) -> bool {
        match (self.id, id) {
            (Some(a), Some(b)) => a == b,
            _ => self.name == name,
        }
    }
}

/// A free-text message attached to a train (delay reasons, disruptions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 15, h, m, 0).unwrap()
    }

    #[test]
    fn expected_times_prefer_realtime() {
        let mut stop = RouteStop::named("Essen Hbf");
        stop.sched_arrival = Some(at(10, 20));
        assert_eq!(stop.expected_arrival(), Some(at(10, 20)));

        stop.rt_arrival = Some(at(10, 27));
        assert_eq!(stop.expected_arrival(), Some(at(10, 27)));

        assert_eq!(stop.expected_departure(), None);
    }

    #[test]
    fn inferred_arrival_applies_delay() {
        let mut stop = RouteStop::named("Essen Hbf");
        assert_eq!(stop.inferred_arrival(), None);

        stop.sched_arrival = Some(at(10, 20));
        assert_eq!(stop.inferred_arrival(), Some(at(10, 20)));

        stop.arrival_delay = Some(4);
        assert_eq!(stop.inferred_arrival(), Some(at(10, 24)));

        stop.rt_arrival = Some(at(10, 30));
        assert_eq!(stop.inferred_arrival(), Some(at(10, 30)));
    }

    #[test]
    fn station_identity_prefers_ids() {
        let mut stop = RouteStop::named("Essen Hbf");
        assert!(stop.is_station(None, "Essen Hbf"));
        assert!(stop.is_station(Some(StationId::new(8000098)), "Essen Hbf"));

        stop.id = Some(StationId::new(8000098));
        assert!(stop.is_station(Some(StationId::new(8000098)), "Essen"));
        assert!(!stop.is_station(Some(StationId::new(8000080)), "Essen Hbf"));
    }

    #[test]
    fn sparse_serialization() {
        let stop = RouteStop::named("Bochum Hbf");
        let json = serde_json::to_string(&stop).unwrap();
        assert_eq!(
            json,
            r#"{"name":"Bochum Hbf","is_cancelled":false,"is_additional":false}"#
        );
        let back: RouteStop = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stop);
    }
}
