//! Finding the traveler's train on a board.

use chrono::{DateTime, Utc};

use crate::domain::{RouteStop, Station, TrainId, TransitSession};
use crate::feeds::{DepartureLookup, TrainCandidate};

/// The occurrence of `train_id` the traveler is getting off.
///
/// A train may pass the same station twice. The first occurrence arriving
/// strictly after `departed` wins; without one, any occurrence of the train
/// does. Both the board and the train id can be ambiguous, so this is a
/// best-effort choice.
pub fn select_occurrence<'a>(
    lookup: &'a DepartureLookup,
    train_id: &TrainId,
    departed: Option<DateTime<Utc>>,
) -> Option<&'a TrainCandidate> {
    let after = departed.and_then(|dep| {
        lookup
            .occurrences(train_id)
            .find(|c| c.sched_arrival.is_some_and(|arr| arr > dep))
    });
    after.or_else(|| lookup.occurrences(train_id).next())
}

/// The occurrence of `train_id` the traveler is boarding.
pub fn select_departure<'a>(lookup: &'a DepartureLookup, train_id: &TrainId) -> Option<&'a TrainCandidate> {
    lookup
        .occurrences(train_id)
        .find(|c| c.sched_departure.is_some())
        .or_else(|| lookup.occurrences(train_id).next())
}

/// The stop for `station` after the departure stop in the session's own
/// route, used when no board shows the train any more.
pub fn stop_in_route<'a>(
    session: &'a TransitSession,
    station: Option<&Station>,
    query: &str,
) -> Option<&'a RouteStop> {
    let start = session.departure_index().map(|i| i + 1).unwrap_or(0);
    session.route.iter().skip(start).find(|stop| match station {
        Some(s) => stop.is_station(Some(s.id), &s.name),
        None => stop.name == query || stop.id.is_some_and(|id| id.to_string() == query),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::fixtures;
    use crate::domain::{StationId, TrainLabel};
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 15, h, m, 0).unwrap()
    }

    fn occurrence(train: &str, arrival: Option<DateTime<Utc>>) -> TrainCandidate {
        TrainCandidate {
            train_id: TrainId::new(train),
            label: TrainLabel::new("S", "30123", Some("1".into())),
            station: Station::new(StationId::new(8000098), "Essen Hbf"),
            platform: None,
            sched_arrival: arrival,
            rt_arrival: None,
            sched_departure: arrival,
            rt_departure: None,
            arrival_cancelled: false,
            departure_cancelled: false,
            route_pre: Vec::new(),
            route_post: Vec::new(),
            messages: Vec::new(),
        }
    }

    fn board(results: Vec<TrainCandidate>) -> DepartureLookup {
        DepartureLookup {
            results,
            ..DepartureLookup::empty(Station::new(StationId::new(8000098), "Essen Hbf"))
        }
    }

    #[test]
    fn loop_train_picks_the_later_visit() {
        let lookup = board(vec![
            occurrence("s1", Some(at(7, 40))),
            occurrence("other", Some(at(8, 30))),
            occurrence("s1", Some(at(8, 50))),
        ]);
        let id = TrainId::new("s1");

        let chosen = select_occurrence(&lookup, &id, Some(at(8, 0))).unwrap();
        assert_eq!(chosen.sched_arrival, Some(at(8, 50)));

        // Nothing after the departure: fall back to any occurrence
        let chosen = select_occurrence(&lookup, &id, Some(at(9, 0))).unwrap();
        assert_eq!(chosen.sched_arrival, Some(at(7, 40)));

        assert!(select_occurrence(&lookup, &TrainId::new("nope"), None).is_none());
    }

    #[test]
    fn departure_prefers_an_occurrence_with_departure_time() {
        let mut terminating = occurrence("s1", Some(at(7, 40)));
        terminating.sched_departure = None;
        let lookup = board(vec![terminating, occurrence("s1", Some(at(8, 50)))]);
        let chosen = select_departure(&lookup, &TrainId::new("s1")).unwrap();
        assert_eq!(chosen.sched_departure, Some(at(8, 50)));
    }

    #[test]
    fn route_fallback_only_looks_ahead() {
        let session = fixtures::session();
        assert_eq!(
            stop_in_route(&session, None, "Essen Hbf").map(|s| s.name.as_str()),
            Some("Essen Hbf")
        );
        // Hamm is before the departure stop
        assert!(stop_in_route(&session, None, "Hamm (Westf) Hbf").is_none());

        let bochum = Station::new(StationId::new(8000041), "Bochum Hbf");
        assert_eq!(
            stop_in_route(&session, Some(&bochum), "8000041").map(|s| s.name.as_str()),
            Some("Bochum Hbf")
        );
    }
}
