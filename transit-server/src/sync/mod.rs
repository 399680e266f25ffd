//! Import of check-ins made on a third-party service.
//!
//! A reported check-in becomes a native check-in immediately followed by a
//! check-out at the reported destination, committed together. Every
//! outcome worth telling the traveler about lands in the sync log, keyed by
//! the external status id.

mod event;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::TravelerId;
use crate::engine::{CheckoutPlan, Decision, Engine, EngineError, apply_checkout, new_session};
use crate::enrich::{EnrichRequest, Phase};
use crate::feeds::{DepartureBoard, LookupWindow, TripSource};
use crate::notify::{Notifier, NotifyReason};
use crate::store::sessions;
use crate::store::travelers::{self, SyncLogEntry};

pub use event::{ExternalCheckin, RAIL_CATEGORIES, SkipReason, SyncOutcome};

/// Reported check-ins older than this are not imported.
const MAX_AGE_MINS: i64 = 15;

/// Board window around the reported departure.
const DEPARTURE_WINDOW: LookupWindow = LookupWindow::new(60, 40);

pub struct SyncAdapter<B, T, N> {
    engine: Engine<B, T, N>,
}

impl<B, T, N> Clone for SyncAdapter<B, T, N> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<B, T, N> SyncAdapter<B, T, N>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    pub fn new(engine: Engine<B, T, N>) -> Self {
        Self { engine }
    }

    /// Import one reported check-in.
    ///
    /// Only persistence failures are errors; a check-in that cannot be
    /// matched to a train is a [`SyncOutcome::Failed`] and is tried again the
    /// next time the service reports it.
    pub async fn import(
        &self,
        traveler: TravelerId,
        event: &ExternalCheckin,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, EngineError> {
        if now - event.created_at > chrono::Duration::minutes(MAX_AGE_MINS) {
            debug!(%traveler, status = event.status_id, "reported check-in is stale");
            return Ok(skipped(SkipReason::Stale));
        }
        {
            let mut conn = self.engine.store().conn().await?;
            let latest = travelers::sync_state(&mut conn, traveler).await?;
            if latest.is_some_and(|latest| event.status_id <= latest) {
                return Ok(skipped(SkipReason::AlreadyProcessed));
            }
        }
        if !event.is_rail() {
            debug!(%traveler, category = %event.category, "reported check-in is not a train");
            return Ok(skipped(SkipReason::NotRail));
        }
        if self.engine.read_session(traveler).await?.is_some() {
            return self.already_traveling(traveler, event, now).await;
        }

        let lookup = match self
            .engine
            .lookup(&event.departure_station, DEPARTURE_WINDOW)
            .await
        {
            Ok(lookup) => lookup,
            Err(e) => {
                let message = format!(
                    "Departure board for {} unavailable: {e}",
                    event.departure_station
                );
                return self.fail(traveler, event, message, now).await;
            }
        };
        let Some(candidate) = lookup.results.iter().find(|c| event.matches(c)) else {
            let message = format!(
                "No {} at {} departing {} towards {}",
                event.line,
                lookup.station.name,
                event.scheduled_departure.format("%H:%M"),
                event.arrival_station
            );
            return self.fail(traveler, event, message, now).await;
        };

        let mut session = new_session(traveler, candidate, now);
        session.user_data.comment = event.message.clone().filter(|m| !m.trim().is_empty());
        let plan = match self
            .engine
            .plan_checkout(&session, &event.arrival_station, false)
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                warn!(%traveler, station = %event.arrival_station, error = %e, "arrival board unavailable");
                CheckoutPlan::from_lookup(&session, None, &event.arrival_station)
            }
        };

        let mut tx = self.engine.store().begin().await?;
        if sessions::lock(&mut tx, traveler).await?.is_some() {
            tx.rollback().await?;
            return self.already_traveling(traveler, event, now).await;
        }
        sessions::insert(&mut tx, &session, now).await?;
        let decision = apply_checkout(&mut tx, session, &plan, false, now).await?;

        let message = describe(&decision, &event.arrival_station);
        let entry = SyncLogEntry {
            status_id: event.status_id,
            message,
            is_error: false,
            logged_at: now,
        };
        travelers::log_sync(&mut tx, traveler, &entry).await?;
        travelers::mark_synced(&mut tx, traveler, event.status_id).await?;
        tx.commit().await?;

        info!(%traveler, status = event.status_id, line = %event.line, "imported check-in");

        Ok(match decision {
            Decision::Finalized(journey) => {
                self.engine.after_commit(
                    traveler,
                    vec![NotifyReason::Checkin, NotifyReason::Checkout],
                    Some(EnrichRequest::new(journey.trip.clone(), Phase::Checkout)),
                );
                SyncOutcome::Completed { journey }
            }
            Decision::Pending(session) | Decision::Unknown(session) => {
                self.engine.after_commit(
                    traveler,
                    vec![NotifyReason::Checkin],
                    Some(EnrichRequest::new(session.clone(), Phase::Checkin)),
                );
                SyncOutcome::CheckedIn { session }
            }
        })
    }

    async fn already_traveling(
        &self,
        traveler: TravelerId,
        event: &ExternalCheckin,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, EngineError> {
        debug!(%traveler, status = event.status_id, "already checked in, skipping import");
        let entry = SyncLogEntry {
            status_id: event.status_id,
            message: "Not imported: already checked in".to_string(),
            is_error: false,
            logged_at: now,
        };
        let mut conn = self.engine.store().conn().await?;
        travelers::log_sync(&mut conn, traveler, &entry).await?;
        Ok(skipped(SkipReason::AlreadyTraveling))
    }

    async fn fail(
        &self,
        traveler: TravelerId,
        event: &ExternalCheckin,
        message: String,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, EngineError> {
        warn!(%traveler, status = event.status_id, %message, "check-in import failed");
        let entry = SyncLogEntry {
            status_id: event.status_id,
            message: message.clone(),
            is_error: true,
            logged_at: now,
        };
        let mut conn = self.engine.store().conn().await?;
        travelers::log_sync(&mut conn, traveler, &entry).await?;
        Ok(SyncOutcome::Failed { message })
    }
}

fn skipped(reason: SkipReason) -> SyncOutcome {
    SyncOutcome::Skipped { reason }
}

fn describe(decision: &Decision, destination: &str) -> String {
    match decision {
        Decision::Finalized(journey) => format!(
            "Checked in to {} and out at {}",
            journey.trip.train,
            journey.trip.arrival.as_ref().map_or(destination, |s| s.name.as_str())
        ),
        Decision::Pending(session) => format!("Checked in to {} towards {destination}", session.train),
        Decision::Unknown(session) => format!(
            "Checked in to {} towards {destination}, arrival time not known yet",
            session.train
        ),
    }
}
