//! Conversion from trip service DTOs to feed types.

use chrono::{DateTime, Utc};

use crate::domain::{GeoPoint, Message, RouteStop, StationId};
use crate::feeds::{TripMatch, TripRoute};

use super::types::{FeatureCollection, Remark, Stopover, TripDetails, TripSummary};

fn parse_iso(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn parse_station_id(s: Option<&str>) -> Option<StationId> {
    s.and_then(|s| StationId::parse(s).ok())
}

pub fn convert_summary(summary: &TripSummary) -> TripMatch {
    TripMatch {
        trip_id: summary.id.clone(),
        origin: summary
            .origin
            .as_ref()
            .map(|o| o.name.clone())
            .unwrap_or_default(),
        origin_id: summary
            .origin
            .as_ref()
            .and_then(|o| parse_station_id(o.id.as_deref())),
        departure: parse_iso(summary.planned_departure.as_deref()),
    }
}

pub fn convert_stopover(s: &Stopover) -> RouteStop {
    RouteStop {
        name: s.stop.name.clone(),
        id: parse_station_id(s.stop.id.as_deref()),
        location: s.stop.location.map(|l| GeoPoint {
            lat: l.latitude,
            lon: l.longitude,
        }),
        sched_arrival: parse_iso(s.planned_arrival.as_deref()),
        rt_arrival: parse_iso(s.arrival.as_deref()),
        sched_departure: parse_iso(s.planned_departure.as_deref()),
        rt_departure: parse_iso(s.departure.as_deref()),
        arrival_delay: s.arrival_delay.map(|d| (d / 60) as i32),
        departure_delay: s.departure_delay.map(|d| (d / 60) as i32),
        is_cancelled: s.cancelled,
        is_additional: s.additional_stop,
    }
}

/// Only status and warning remarks are worth showing; hints are boilerplate.
fn convert_remark(r: &Remark) -> Option<Message> {
    match r.kind.as_deref() {
        Some("status") | Some("warning") => Some(Message {
            timestamp: parse_iso(r.valid_from.as_deref()),
            text: r.text.clone().filter(|t| !t.is_empty())?,
        }),
        _ => None,
    }
}

fn convert_polyline(fc: &FeatureCollection) -> Option<Vec<GeoPoint>> {
    let points: Vec<GeoPoint> = fc
        .features
        .iter()
        .filter_map(|f| match f.geometry.coordinates.as_slice() {
            [lon, lat, ..] => Some(GeoPoint {
                lat: *lat,
                lon: *lon,
            }),
            _ => None,
        })
        .collect();

    // A single point is not a path
    (points.len() >= 2).then_some(points)
}

pub fn convert_trip(trip: &TripDetails) -> TripRoute {
    TripRoute {
        stops: trip.stopovers.iter().map(convert_stopover).collect(),
        messages: trip.remarks.iter().filter_map(convert_remark).collect(),
        polyline: trip.polyline.as_ref().and_then(convert_polyline),
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::TripResponse;
    use super::*;

    const TRIP: &str = r#"{
        "trip": {
            "stopovers": [
                {
                    "stop": {"id": "8000080", "name": "Dortmund Hbf", "location": {"latitude": 51.517, "longitude": 7.459}},
                    "plannedDeparture": "2024-10-15T10:00:00+02:00",
                    "departure": "2024-10-15T10:04:00+02:00",
                    "departureDelay": 240
                },
                {
                    "stop": {"id": "8000098", "name": "Essen Hbf"},
                    "plannedArrival": "2024-10-15T10:22:00+02:00",
                    "arrivalDelay": null,
                    "cancelled": true
                }
            ],
            "polyline": {
                "type": "FeatureCollection",
                "features": [
                    {"geometry": {"type": "Point", "coordinates": [7.459, 51.517]}},
                    {"geometry": {"type": "Point", "coordinates": [7.014, 51.451]}}
                ]
            },
            "remarks": [
                {"type": "hint", "text": "Bordrestaurant"},
                {"type": "status", "text": "Ersatzverkehr", "validFrom": "2024-10-15T09:00:00+02:00"}
            ]
        }
    }"#;

    #[test]
    fn converts_trip() {
        let resp: TripResponse = serde_json::from_str(TRIP).unwrap();
        let route = convert_trip(&resp.trip);

        assert_eq!(route.stops.len(), 2);
        let dortmund = &route.stops[0];
        assert_eq!(dortmund.id, Some(StationId::new(8000080)));
        assert_eq!(dortmund.departure_delay, Some(4));
        assert_eq!(
            dortmund.rt_departure.unwrap().to_rfc3339(),
            "2024-10-15T08:04:00+00:00"
        );
        assert!(dortmund.location.is_some());

        let essen = &route.stops[1];
        assert!(essen.is_cancelled);
        assert_eq!(essen.arrival_delay, None);
        assert_eq!(essen.rt_arrival, None);

        assert_eq!(route.messages.len(), 1);
        assert_eq!(route.messages[0].text, "Ersatzverkehr");

        let line = route.polyline.unwrap();
        assert_eq!(line.len(), 2);
        assert_eq!(line[1].lat, 51.451);
    }

    #[test]
    fn summary_with_non_numeric_origin() {
        let summary: TripSummary = serde_json::from_str(
            r#"{"id": "1|2|3", "origin": {"id": "A=1@O=Foo", "name": "Foo"}, "plannedDeparture": "2024-10-15T06:12:00+02:00"}"#,
        )
        .unwrap();
        let m = convert_summary(&summary);
        assert_eq!(m.origin, "Foo");
        assert_eq!(m.origin_id, None);
        assert!(m.departure.is_some());
    }
}
