//! Check-ins reported by a third-party service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Journey, TransitSession};
use crate::feeds::TrainCandidate;

/// Transport categories that map onto the departure board.
pub const RAIL_CATEGORIES: [&str; 5] = [
    "nationalExpress",
    "national",
    "regionalExp",
    "regional",
    "suburban",
];

/// A check-in the traveler made on the third-party service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCheckin {
    /// Status id on the third-party service; ids only grow
    pub status_id: i64,
    /// Departure station, by EVA number or exact name
    pub departure_station: String,
    /// Arrival station name
    pub arrival_station: String,
    /// Line name as shown to passengers, e.g. `S 1` or `ICE 703`
    pub line: String,
    pub category: String,
    pub scheduled_departure: DateTime<Utc>,
    #[serde(default)]
    pub message: Option<String>,
    /// When the status was posted
    pub created_at: DateTime<Utc>,
}

impl ExternalCheckin {
    pub fn is_rail(&self) -> bool {
        RAIL_CATEGORIES.contains(&self.category.as_str())
    }

    /// True if `candidate` is the train this check-in describes.
    pub fn matches(&self, candidate: &TrainCandidate) -> bool {
        candidate.label.line_name() == self.line
            && candidate.sched_departure == Some(self.scheduled_departure)
            && candidate.calls_after(&self.arrival_station)
    }
}

/// Why a reported check-in was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Posted too long ago
    Stale,
    /// Status id was handled by an earlier run
    AlreadyProcessed,
    /// Bus, ferry, plane and so on
    NotRail,
    /// The traveler checked in here already
    AlreadyTraveling,
}

/// Result of importing one reported check-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Checked in; the arrival is pending or not yet known
    CheckedIn { session: TransitSession },
    /// Checked in and the train has arrived already
    Completed { journey: Journey },
    Skipped { reason: SkipReason },
    /// Nothing changed; the reason was written to the sync log
    Failed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Station, StationId, TrainId, TrainLabel};
    use chrono::TimeZone;

    fn event() -> ExternalCheckin {
        ExternalCheckin {
            status_id: 41,
            departure_station: "8000080".into(),
            arrival_station: "Essen Hbf".into(),
            line: "S 1".into(),
            category: "suburban".into(),
            scheduled_departure: Utc.with_ymd_and_hms(2024, 10, 15, 10, 0, 0).unwrap(),
            message: None,
            created_at: Utc.with_ymd_and_hms(2024, 10, 15, 9, 58, 0).unwrap(),
        }
    }

    fn s1() -> TrainCandidate {
        TrainCandidate {
            train_id: TrainId::new("s1"),
            label: TrainLabel::new("S", "30123", Some("1".into())),
            station: Station::new(StationId::new(8000080), "Dortmund Hbf"),
            platform: None,
            sched_arrival: None,
            rt_arrival: None,
            sched_departure: Some(Utc.with_ymd_and_hms(2024, 10, 15, 10, 0, 0).unwrap()),
            rt_departure: None,
            arrival_cancelled: false,
            departure_cancelled: false,
            route_pre: Vec::new(),
            route_post: vec!["Bochum Hbf".into(), "Essen Hbf".into()],
            messages: Vec::new(),
        }
    }

    #[test]
    fn categories() {
        let mut e = event();
        assert!(e.is_rail());
        e.category = "bus".into();
        assert!(!e.is_rail());
        e.category = "Suburban".into();
        assert!(!e.is_rail());
    }

    #[test]
    fn matching_needs_line_time_and_destination() {
        let e = event();
        assert!(e.matches(&s1()));

        let mut other_line = s1();
        other_line.label = TrainLabel::new("S", "30123", Some("2".into()));
        assert!(!e.matches(&other_line));

        let mut later = s1();
        later.sched_departure = Some(e.scheduled_departure + chrono::Duration::minutes(20));
        assert!(!e.matches(&later));

        let mut short = s1();
        short.route_post.pop();
        assert!(!e.matches(&short));
    }

    #[test]
    fn parses_camel_case() {
        let json = r#"{
            "statusId": 7,
            "departureStation": "Dortmund Hbf",
            "arrivalStation": "Essen Hbf",
            "line": "RE 1",
            "category": "regionalExp",
            "scheduledDeparture": "2024-10-15T10:00:00Z",
            "createdAt": "2024-10-15T09:55:00Z"
        }"#;
        let e: ExternalCheckin = serde_json::from_str(json).unwrap();
        assert_eq!(e.status_id, 7);
        assert_eq!(e.message, None);
        assert!(e.is_rail());
    }
}
