//! Check-in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::domain::{EnrichmentData, TrainId, TransitSession, TravelerId, UserData};
use crate::enrich::{EnrichRequest, Phase};
use crate::feeds::{DepartureBoard, TrainCandidate, TripSource};
use crate::notify::{Notifier, NotifyReason};
use crate::store::sessions;

use super::checkout::{CheckoutOutcome, CheckoutPlan, apply_checkout};
use super::matching::select_departure;
use super::{Engine, EngineError, log_failure, same_state};

/// Result of a successful check-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckinOutcome {
    /// A new session was created. `replaced` is set when a session for a
    /// different train had to be finalized first.
    CheckedIn {
        session: TransitSession,
        replaced: Option<CheckoutOutcome>,
    },
    /// The traveler is already checked into this train at this station.
    AlreadyCheckedIn,
}

/// A fresh session for boarding `candidate`.
pub(crate) fn new_session(
    traveler: TravelerId,
    candidate: &TrainCandidate,
    now: DateTime<Utc>,
) -> TransitSession {
    TransitSession {
        traveler,
        train_id: candidate.train_id.clone(),
        train: candidate.label.clone(),
        departure: candidate.station.clone(),
        dep_platform: candidate.platform.clone(),
        sched_departure: candidate.sched_departure,
        real_departure: candidate.rt_departure,
        arrival: None,
        arr_platform: None,
        sched_arrival: None,
        real_arrival: None,
        route: candidate.route(),
        messages: candidate.messages.clone(),
        enrichment: EnrichmentData::default(),
        user_data: UserData::default(),
        cancelled: candidate.departure_cancelled,
        cancelled_destination: None,
        checked_in_at: now,
    }
}

impl<B, T, N> Engine<B, T, N>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    /// Check `traveler` into `train_id` departing from `station`.
    ///
    /// An existing session for a different train is finalized first, as if
    /// checked out with force at `station`. Checking into the same train at
    /// the same station again changes nothing.
    pub async fn checkin(
        &self,
        traveler: TravelerId,
        station: &str,
        train_id: &TrainId,
    ) -> Result<CheckinOutcome, EngineError> {
        let result = self.checkin_at(traveler, station, train_id, Utc::now()).await;
        if let Err(e) = &result {
            log_failure(traveler, "checkin", e);
        }
        result
    }

    async fn checkin_at(
        &self,
        traveler: TravelerId,
        station: &str,
        train_id: &TrainId,
        now: DateTime<Utc>,
    ) -> Result<CheckinOutcome, EngineError> {
        let lookup = self.lookup(station, self.config.checkin_window()).await?;
        let candidate =
            select_departure(&lookup, train_id).ok_or_else(|| EngineError::TrainNotFound {
                station: station.to_string(),
                train_id: train_id.clone(),
            })?;
        let session = new_session(traveler, candidate, now);

        let existing = self.read_session(traveler).await?;
        if existing.as_ref().is_some_and(|e| e.is_same_trip(&session)) {
            return Ok(CheckinOutcome::AlreadyCheckedIn);
        }
        // The board we already have is good enough to close the old trip
        let plan = existing
            .as_ref()
            .map(|old| CheckoutPlan::from_lookup(old, Some(&lookup), station));

        let mut tx = self.store.begin().await?;
        let current = sessions::lock(&mut tx, traveler).await?;
        if !same_state(current.as_ref(), existing.as_ref()) {
            return Err(EngineError::RaceCondition);
        }

        let replaced = match (current, plan) {
            (Some(old), Some(plan)) => {
                Some(apply_checkout(&mut tx, old, &plan, true, now).await?)
            }
            _ => None,
        };
        sessions::insert(&mut tx, &session, now).await?;
        tx.commit().await?;

        info!(
            %traveler,
            train = %session.train,
            station = %session.departure,
            cancelled = session.cancelled,
            "checked in"
        );

        let mut reasons = Vec::new();
        let replaced = replaced.map(|decision| {
            reasons.push(NotifyReason::Checkout);
            decision.into_outcome()
        });
        reasons.push(NotifyReason::Checkin);
        self.after_commit(
            traveler,
            reasons,
            Some(EnrichRequest::new(session.clone(), Phase::Checkin)),
        );

        Ok(CheckinOutcome::CheckedIn { session, replaced })
    }
}
