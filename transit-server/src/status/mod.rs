//! Read-side projection of a traveler's current state.
//!
//! Nothing here writes. The projector turns the stored session (or the
//! latest journey) into a display snapshot: countdowns, progress, the rest
//! of the route and which way the train will move on the platform.

mod direction;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{
    Direction, JourneyId, Message, RouteStop, Station, StationMetadata, TrainId, TrainLabel,
    TransitSession, TravelerId, Visibility,
};
use crate::store::{Store, StoreError, journeys, sessions, stations, travelers};

pub use direction::{arrival_direction, departure_direction};

/// Snapshot of a trip in progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveStatus {
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
    /// Seconds until departure, negative once departed
    pub departure_countdown: Option<i64>,
    /// Seconds until arrival, negative once arrived
    pub arrival_countdown: Option<i64>,
    /// Elapsed share of the trip in `[0, 1]`
    pub completion: Option<f64>,
    /// Stops after the departure station
    pub route_after: Vec<RouteStop>,
    pub messages: Vec<Message>,
    pub cancelled: bool,
    pub dep_direction: Option<Direction>,
    pub arr_direction: Option<Direction>,
    pub pride: bool,
    pub polyline_id: Option<i64>,
    pub comment: Option<String>,
    pub visibility: Visibility,
}

/// The most recent finalized trip, shown while no trip is in progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestJourney {
    pub journey_id: JourneyId,
    pub train: TrainLabel,
    pub departure: Station,
    pub arrival: Option<Station>,
    pub departure_time: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub cancelled_destination: Option<String>,
    pub checked_out_at: DateTime<Utc>,
    /// Platform layout of the arrival station, when known
    pub arrival_station: Option<StationMetadata>,
    pub comment: Option<String>,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TravelerStatus {
    Idle,
    InTransit(ActiveStatus),
    Arrived(LatestJourney),
}

impl TravelerStatus {
    pub fn visibility(&self) -> Option<Visibility> {
        match self {
            TravelerStatus::Idle => None,
            TravelerStatus::InTransit(s) => Some(s.visibility),
            TravelerStatus::Arrived(j) => Some(j.visibility),
        }
    }

    /// Strip what the public may not see.
    ///
    /// Returns `None` if the status is hidden altogether.
    pub fn into_public(self) -> Option<Self> {
        let visible = self.visibility().is_none_or(|v| v >= Visibility::Unlisted);
        if !visible {
            return None;
        }
        Some(match self {
            TravelerStatus::InTransit(mut s) => {
                if s.visibility < Visibility::Public {
                    s.comment = None;
                }
                TravelerStatus::InTransit(s)
            }
            TravelerStatus::Arrived(mut j) => {
                if j.visibility < Visibility::Public {
                    j.comment = None;
                }
                TravelerStatus::Arrived(j)
            }
            idle => idle,
        })
    }
}

/// Signed seconds from `now` until `ts`.
pub fn countdown(ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    Some((ts? - now).num_seconds())
}

/// Elapsed share of the trip, clamped to `[0, 1]`. A zero-length trip is
/// complete.
pub fn completion(
    departure: Option<DateTime<Utc>>,
    arrival: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<f64> {
    let (dep, arr) = (departure?, arrival?);
    let total = (arr - dep).num_seconds();
    if total <= 0 {
        return Some(1.0);
    }
    let elapsed = (now - dep).num_seconds() as f64;
    Some((elapsed / total as f64).clamp(0.0, 1.0))
}

/// Project an active session.
pub fn active_status(
    session: &TransitSession,
    default_visibility: Visibility,
    dep_meta: Option<&StationMetadata>,
    arr_meta: Option<&StationMetadata>,
    now: DateTime<Utc>,
) -> ActiveStatus {
    let route_after = match session.departure_index() {
        Some(i) => session.route[i + 1..].to_vec(),
        None => Vec::new(),
    };

    ActiveStatus {
        train_id: session.train_id.clone(),
        train: session.train.clone(),
        departure: session.departure.clone(),
        dep_platform: session.dep_platform.clone(),
        sched_departure: session.sched_departure,
        real_departure: session.real_departure,
        arrival: session.arrival.clone(),
        arr_platform: session.arr_platform.clone(),
        sched_arrival: session.sched_arrival,
        real_arrival: session.real_arrival,
        departure_countdown: countdown(session.departure_time(), now),
        arrival_countdown: countdown(session.arrival_time(), now),
        completion: completion(session.departure_time(), session.arrival_time(), now),
        route_after,
        messages: session.messages.clone(),
        cancelled: session.cancelled,
        dep_direction: departure_direction(session, dep_meta),
        arr_direction: arrival_direction(session, arr_meta),
        pride: session.enrichment.pride,
        polyline_id: session.enrichment.polyline_id,
        comment: session.user_data.comment.clone(),
        visibility: session.user_data.visibility.unwrap_or(default_visibility),
    }
}

/// Builds status snapshots from the store.
#[derive(Debug, Clone)]
pub struct StatusProjector {
    store: Store,
}

impl StatusProjector {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Full status for the traveler themselves. `None` for unknown travelers.
    pub async fn for_traveler(
        &self,
        traveler: TravelerId,
        now: DateTime<Utc>,
    ) -> Result<Option<TravelerStatus>, StoreError> {
        let mut conn = self.store.conn().await?;
        let Some(account) = travelers::get(&mut conn, traveler).await? else {
            return Ok(None);
        };
        let default_visibility = account.default_visibility;

        if let Some(session) = sessions::get(&mut conn, traveler).await? {
            let dep_meta = stations::get(&mut conn, session.departure.id).await?;
            let arr_meta = match &session.arrival {
                Some(arrival) => stations::get(&mut conn, arrival.id).await?,
                None => None,
            };
            return Ok(Some(TravelerStatus::InTransit(active_status(
                &session,
                default_visibility,
                dep_meta.as_ref(),
                arr_meta.as_ref(),
                now,
            ))));
        }

        let Some(journey) = journeys::latest(&mut conn, traveler).await? else {
            return Ok(Some(TravelerStatus::Idle));
        };
        let arrival_station = match &journey.trip.arrival {
            Some(arrival) => stations::get(&mut conn, arrival.id).await?,
            None => None,
        };
        let trip = &journey.trip;

        Ok(Some(TravelerStatus::Arrived(LatestJourney {
            journey_id: journey.id,
            train: trip.train.clone(),
            departure: trip.departure.clone(),
            arrival: trip.arrival.clone(),
            departure_time: trip.departure_time(),
            arrival_time: trip.arrival_time(),
            cancelled: trip.cancelled,
            cancelled_destination: trip.cancelled_destination.clone(),
            checked_out_at: journey.checked_out_at,
            arrival_station,
            comment: trip.user_data.comment.clone(),
            visibility: trip.user_data.visibility.unwrap_or(default_visibility),
        })))
    }

    /// Status as anyone may see it, looked up by traveler name.
    ///
    /// `None` if the traveler does not exist or hides their status.
    pub async fn for_public(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TravelerStatus>, StoreError> {
        let traveler = {
            let mut conn = self.store.conn().await?;
            travelers::by_name(&mut conn, name).await?
        };
        let Some(traveler) = traveler else {
            return Ok(None);
        };

        let status = self.for_traveler(traveler.id, now).await?;
        Ok(status.and_then(TravelerStatus::into_public))
    }
}
