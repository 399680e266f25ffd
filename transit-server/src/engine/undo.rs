//! Undo of a check-in or a check-out.

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::domain::{JourneyId, TransitSession, TravelerId};
use crate::feeds::{DepartureBoard, TripSource};
use crate::notify::{Notifier, NotifyReason};
use crate::store::{journeys, sessions, stats};

use super::{Engine, EngineError, log_failure};

/// What to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoTarget {
    /// The check-in of the active session
    InTransit,
    /// The check-out that produced this journey
    Journey(JourneyId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UndoOutcome {
    /// The active session was discarded
    SessionDeleted,
    /// The journey is an active session again
    Restored { session: TransitSession },
}

impl<B, T, N> Engine<B, T, N>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    /// Undo a check-in (drop the session) or a check-out (turn the journey
    /// back into the session it came from).
    ///
    /// Only the latest journey can be undone, and not if it was edited by
    /// hand.
    pub async fn undo(
        &self,
        traveler: TravelerId,
        target: UndoTarget,
    ) -> Result<UndoOutcome, EngineError> {
        let result = self.undo_inner(traveler, target).await;
        if let Err(e) = &result {
            log_failure(traveler, "undo", e);
        }
        result
    }

    async fn undo_inner(
        &self,
        traveler: TravelerId,
        target: UndoTarget,
    ) -> Result<UndoOutcome, EngineError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let current = sessions::lock(&mut tx, traveler).await?;

        let outcome = match target {
            UndoTarget::InTransit => {
                if current.is_none() {
                    return Err(EngineError::NotTraveling);
                }
                sessions::delete(&mut tx, traveler).await?;
                UndoOutcome::SessionDeleted
            }
            UndoTarget::Journey(id) => {
                let journey = journeys::get(&mut tx, traveler, id)
                    .await?
                    .ok_or(EngineError::JourneyNotFound(id))?;
                if journey.edited.is_edited() {
                    return Err(EngineError::AlreadyEdited(id));
                }
                let latest = journeys::latest(&mut tx, traveler).await?;
                if latest.map(|j| j.id) != Some(id) {
                    return Err(EngineError::JourneyNotFound(id));
                }
                if current.is_some() {
                    return Err(EngineError::AlreadyTraveling);
                }

                let session = journeys::pop_latest(&mut tx, traveler, id)
                    .await?
                    .into_session();
                sessions::insert(&mut tx, &session, now).await?;
                stats::invalidate(&mut tx, traveler, session.month()).await?;
                UndoOutcome::Restored { session }
            }
        };
        tx.commit().await?;

        info!(%traveler, ?target, "undone");
        self.after_commit(traveler, vec![NotifyReason::Undo], None);
        Ok(outcome)
    }
}
