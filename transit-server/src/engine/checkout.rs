//! Check-out and finalization.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::domain::{Journey, RouteStop, Station, StationId, TransitSession, TravelerId};
use crate::enrich::{EnrichRequest, Phase};
use crate::feeds::{DepartureBoard, DepartureLookup, TrainCandidate, TripSource};
use crate::notify::{Notifier, NotifyReason};
use crate::store::{journeys, sessions, stats};

use super::matching::{select_occurrence, stop_in_route};
use super::{Engine, EngineError, log_failure, same_state};

/// Result of a check-out attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// The trip is now a journey.
    Arrived { journey: Journey },
    /// The trip is now a journey marked cancelled.
    Cancelled { journey: Journey },
    /// The arrival station is saved; the train is not there yet.
    NotYetArrived,
    /// Forced check-out without an active session.
    NothingToDo,
}

/// Parameters of a check-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Arrival station, by id or exact name
    pub station: String,
    /// Departure station the caller believes the session has
    pub expected_departure: Option<StationId>,
    /// Arrival station the caller believes the session has
    pub expected_arrival: Option<StationId>,
    /// Finalize even without confirmation that the train arrived
    pub force: bool,
}

impl CheckoutRequest {
    pub fn new(station: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            expected_departure: None,
            expected_arrival: None,
            force: false,
        }
    }

    pub fn with_expected_departure(mut self, id: StationId) -> Self {
        self.expected_departure = Some(id);
        self
    }

    pub fn with_expected_arrival(mut self, id: StationId) -> Self {
        self.expected_arrival = Some(id);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Reject if the caller's view of the session is stale.
    fn check_expected(&self, session: &TransitSession) -> Result<(), EngineError> {
        if self
            .expected_departure
            .is_some_and(|id| id != session.departure.id)
        {
            return Err(EngineError::RaceCondition);
        }
        let arrival = session.arrival.as_ref().map(|s| s.id);
        if self.expected_arrival.is_some_and(|id| arrival != Some(id)) {
            return Err(EngineError::RaceCondition);
        }
        Ok(())
    }
}

/// What the gather phase found out about the arrival.
#[derive(Debug, Clone, Default)]
pub(crate) struct CheckoutPlan {
    /// Resolved arrival station
    pub station: Option<Station>,
    /// The train's occurrence on the arrival board
    pub occurrence: Option<TrainCandidate>,
    /// The arrival stop from the session's own route, when no board shows
    /// the train
    pub provisional: Option<RouteStop>,
}

impl CheckoutPlan {
    pub(crate) fn from_lookup(
        session: &TransitSession,
        lookup: Option<&DepartureLookup>,
        query: &str,
    ) -> Self {
        let occurrence = lookup
            .and_then(|l| select_occurrence(l, &session.train_id, session.sched_departure))
            .cloned();
        let station = occurrence
            .as_ref()
            .map(|o| o.station.clone())
            .or_else(|| lookup.map(|l| l.station.clone()));

        let provisional = match occurrence {
            Some(_) => None,
            None => stop_in_route(session, station.as_ref(), query).cloned(),
        };
        let station = station.or_else(|| {
            let stop = provisional.as_ref()?;
            Some(Station::new(stop.id?, stop.name.clone()))
        });

        Self {
            station,
            occurrence,
            provisional,
        }
    }
}

/// What the apply phase did.
#[derive(Debug)]
pub(crate) enum Decision {
    /// Session became this journey and was deleted
    Finalized(Journey),
    /// Session updated, train not arrived yet
    Pending(TransitSession),
    /// Session updated, but the board has no arrival time
    Unknown(TransitSession),
}

impl Decision {
    pub(crate) fn into_outcome(self) -> CheckoutOutcome {
        match self {
            Decision::Finalized(journey) if journey.is_cancelled() => {
                CheckoutOutcome::Cancelled { journey }
            }
            Decision::Finalized(journey) => CheckoutOutcome::Arrived { journey },
            Decision::Pending(_) | Decision::Unknown(_) => CheckoutOutcome::NotYetArrived,
        }
    }
}

/// Decide on a locked session. Must run inside the transaction that took
/// the lock.
pub(crate) async fn apply_checkout(
    conn: &mut SqliteConnection,
    mut session: TransitSession,
    plan: &CheckoutPlan,
    force: bool,
    now: DateTime<Utc>,
) -> Result<Decision, EngineError> {
    if let Some(station) = &plan.station {
        session.set_arrival_station(station.clone());
    }

    if let Some(occurrence) = &plan.occurrence {
        if occurrence.platform.is_some() {
            session.arr_platform = occurrence.platform.clone();
        }
        session.sched_arrival = occurrence.sched_arrival.or(session.sched_arrival);
        session.real_arrival = occurrence.rt_arrival.or(session.real_arrival);
        if !occurrence.messages.is_empty() {
            session.messages = occurrence.messages.clone();
        }
    } else if let Some(stop) = &plan.provisional {
        session.sched_arrival = stop.sched_arrival.or(session.sched_arrival);
        session.real_arrival = stop.inferred_arrival().or(session.real_arrival);
    }

    let arrival = plan.occurrence.as_ref().map(TrainCandidate::arrival);
    if arrival == Some(None) && !force {
        sessions::update(conn, &session, now).await?;
        return Ok(Decision::Unknown(session));
    }

    let has_arrived = arrival.flatten().is_some_and(|t| t < now);
    if has_arrived || force {
        return Ok(Decision::Finalized(finalize(conn, session, now).await?));
    }

    if plan.occurrence.as_ref().is_some_and(|o| o.arrival_cancelled) {
        session.cancelled = true;
        session.cancelled_destination = session.arrival.as_ref().map(|s| s.name.clone());
        return Ok(Decision::Finalized(finalize(conn, session, now).await?));
    }

    sessions::update(conn, &session, now).await?;
    Ok(Decision::Pending(session))
}

/// Turn the session into a journey.
async fn finalize(
    conn: &mut SqliteConnection,
    session: TransitSession,
    now: DateTime<Utc>,
) -> Result<Journey, EngineError> {
    let journey = journeys::insert_from_session(conn, &session, now).await?;
    sessions::delete(conn, session.traveler).await?;
    stats::invalidate(conn, session.traveler, session.month()).await?;
    Ok(journey)
}

impl<B, T, N> Engine<B, T, N>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    /// Check `traveler` out at `request.station`.
    ///
    /// Returns `ArrivalUnknown` when the board lists the train without an
    /// arrival time; the arrival station is saved anyway so a later attempt
    /// (or the poller) can finish the job.
    pub async fn checkout(
        &self,
        traveler: TravelerId,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, EngineError> {
        let result = self.checkout_at(traveler, &request, Utc::now()).await;
        if let Err(e) = &result {
            log_failure(traveler, "checkout", e);
        }
        result
    }

    async fn checkout_at(
        &self,
        traveler: TravelerId,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<CheckoutOutcome, EngineError> {
        let Some(session) = self.read_session(traveler).await? else {
            return if request.force {
                Ok(CheckoutOutcome::NothingToDo)
            } else {
                Err(EngineError::NotTraveling)
            };
        };
        request.check_expected(&session)?;

        let plan = self
            .plan_checkout(&session, &request.station, request.force)
            .await?;

        let mut tx = self.store.begin().await?;
        let current = sessions::lock(&mut tx, traveler).await?;
        let current = match current {
            Some(current) if same_state(Some(&current), Some(&session)) => current,
            _ => return Err(EngineError::RaceCondition),
        };
        let decision = apply_checkout(&mut tx, current, &plan, request.force, now).await?;
        tx.commit().await?;

        match decision {
            Decision::Finalized(journey) => {
                info!(
                    %traveler,
                    journey = %journey.id,
                    train = %journey.trip.train,
                    cancelled = journey.is_cancelled(),
                    forced = request.force,
                    "checked out"
                );
                self.after_commit(
                    traveler,
                    vec![NotifyReason::Checkout],
                    Some(EnrichRequest::new(journey.trip.clone(), Phase::Checkout)),
                );
                Ok(Decision::Finalized(journey).into_outcome())
            }
            Decision::Pending(session) => {
                debug!(%traveler, train = %session.train, "not arrived yet");
                self.after_commit(
                    traveler,
                    vec![NotifyReason::Update],
                    Some(EnrichRequest::new(session, Phase::Checkout)),
                );
                Ok(CheckoutOutcome::NotYetArrived)
            }
            Decision::Unknown(session) => {
                let station = session
                    .arrival
                    .as_ref()
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| request.station.clone());
                self.after_commit(
                    traveler,
                    vec![NotifyReason::Update],
                    Some(EnrichRequest::new(session, Phase::Checkout)),
                );
                Err(EngineError::ArrivalUnknown { station })
            }
        }
    }

    /// Gather phase of a check-out: the regular board, then related
    /// stations, then the session's own route.
    ///
    /// With `force` a failing board is tolerated.
    pub(crate) async fn plan_checkout(
        &self,
        session: &TransitSession,
        station: &str,
        force: bool,
    ) -> Result<CheckoutPlan, EngineError> {
        let first = match self.lookup(station, self.config.checkout_window()).await {
            Ok(lookup) => Some(lookup),
            Err(e) if force => {
                warn!(%station, error = %e, "board unavailable, forcing check-out");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let plan = CheckoutPlan::from_lookup(session, first.as_ref(), station);
        if plan.occurrence.is_some() {
            return Ok(plan);
        }

        match self.lookup(station, self.config.retry_window()).await {
            Ok(related) => {
                let retry = CheckoutPlan::from_lookup(session, Some(&related), station);
                if retry.occurrence.is_some() || plan.station.is_none() {
                    return Ok(retry);
                }
            }
            Err(e) => debug!(%station, error = %e, "related-station lookup failed"),
        }
        Ok(plan)
    }
}
