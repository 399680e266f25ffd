//! Merging a refined route into the one recorded at check-in.

use crate::domain::{RouteStop, Station};

/// Combine the stored route with a refined one from the trip source.
///
/// The refined stop list wins, but a field the stored stop already had is
/// never replaced by `None`. Stops are paired by station and in order: a
/// refined stop only pairs with stored stops after the last paired one, so
/// a route visiting a station twice pairs each visit once.
pub fn merge_route(existing: &[RouteStop], refined: &[RouteStop]) -> Vec<RouteStop> {
    if refined.is_empty() {
        return existing.to_vec();
    }

    let mut next = 0;
    let mut merged = Vec::with_capacity(refined.len());

    for stop in refined {
        let mut stop = stop.clone();

        let paired = existing
            .iter()
            .enumerate()
            .skip(next)
            .find(|(_, old)| old.name == stop.name || old.is_station(stop.id, &stop.name));

        if let Some((i, old)) = paired {
            next = i + 1;
            stop.id = stop.id.or(old.id);
            stop.location = stop.location.or(old.location);
            stop.sched_arrival = stop.sched_arrival.or(old.sched_arrival);
            stop.rt_arrival = stop.rt_arrival.or(old.rt_arrival);
            stop.sched_departure = stop.sched_departure.or(old.sched_departure);
            stop.rt_departure = stop.rt_departure.or(old.rt_departure);
            stop.arrival_delay = stop.arrival_delay.or(old.arrival_delay);
            stop.departure_delay = stop.departure_delay.or(old.departure_delay);
        }

        merged.push(stop);
    }

    merged
}

/// A refined route is only usable if it still contains the stations the
/// session is anchored to.
pub fn covers(route: &[RouteStop], departure: &Station, arrival: Option<&Station>) -> bool {
    let Some(dep) = route
        .iter()
        .position(|s| s.is_station(Some(departure.id), &departure.name))
    else {
        return false;
    };

    match arrival {
        Some(arr) => route[dep + 1..]
            .iter()
            .any(|s| s.is_station(Some(arr.id), &arr.name)),
        None => true,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::GeoPoint;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    const NAMES: [&str; 5] = ["Hamm", "Dortmund", "Bochum", "Essen", "Duisburg"];

    fn time(mins: Option<u16>) -> Option<DateTime<Utc>> {
        mins.map(|m| Utc.with_ymd_and_hms(2024, 10, 15, 6, 0, 0).unwrap() + chrono::Duration::minutes(m.into()))
    }

    fn stop_strategy() -> impl Strategy<Value = RouteStop> {
        let times = (
            proptest::option::of(0u16..600),
            proptest::option::of(0u16..600),
            proptest::option::of(0u16..600),
            proptest::option::of(0u16..600),
        );
        let extras = (
            proptest::option::of(-5i32..90),
            proptest::option::of(-5i32..90),
            proptest::option::of((47.0f64..55.0, 6.0f64..15.0)),
        );
        (0..NAMES.len(), times, extras).prop_map(
            |(name, (arr, rt_arr, dep, rt_dep), (arr_delay, dep_delay, location))| RouteStop {
                sched_arrival: time(arr),
                rt_arrival: time(rt_arr),
                sched_departure: time(dep),
                rt_departure: time(rt_dep),
                arrival_delay: arr_delay,
                departure_delay: dep_delay,
                location: location.map(|(lat, lon)| GeoPoint { lat, lon }),
                ..RouteStop::named(NAMES[name])
            },
        )
    }

    fn route_strategy() -> impl Strategy<Value = Vec<RouteStop>> {
        prop::collection::vec(stop_strategy(), 0..8)
    }

    proptest! {
        #[test]
        fn merge_never_drops_known_times(existing in route_strategy(), refined in route_strategy()) {
            let merged = merge_route(&existing, &refined);

            if refined.is_empty() {
                prop_assert_eq!(&merged, &existing);
            } else {
                prop_assert_eq!(merged.len(), refined.len());
            }

            // Every field set on a refined stop stays set
            for (m, r) in merged.iter().zip(&refined) {
                prop_assert_eq!(&m.name, &r.name);
                prop_assert!(r.sched_arrival.is_none() || m.sched_arrival == r.sched_arrival);
                prop_assert!(r.rt_arrival.is_none() || m.rt_arrival == r.rt_arrival);
                prop_assert!(r.sched_departure.is_none() || m.sched_departure == r.sched_departure);
                prop_assert!(r.rt_departure.is_none() || m.rt_departure == r.rt_departure);
            }

            // Every existing stop that was paired keeps its known fields
            let mut next = 0;
            for m in &merged {
                if let Some(i) = (next..existing.len()).find(|&i| existing[i].name == m.name) {
                    next = i + 1;
                    let old = &existing[i];
                    prop_assert!(old.sched_arrival.is_none() || m.sched_arrival.is_some());
                    prop_assert!(old.rt_arrival.is_none() || m.rt_arrival.is_some());
                    prop_assert!(old.sched_departure.is_none() || m.sched_departure.is_some());
                    prop_assert!(old.rt_departure.is_none() || m.rt_departure.is_some());
                    prop_assert!(old.arrival_delay.is_none() || m.arrival_delay.is_some());
                    prop_assert!(old.departure_delay.is_none() || m.departure_delay.is_some());
                    prop_assert!(old.location.is_none() || m.location.is_some());
                }
            }
        }
    }
}
