//! Engine error taxonomy.

use serde::Serialize;

use crate::domain::{JourneyId, TrainId};
use crate::feeds::FeedError;
use crate::store::StoreError;

/// Why an engine operation did not complete.
///
/// Every failure leaves the store exactly as it was before the call, except
/// `ArrivalUnknown`, which is reported after the resolved arrival station has
/// been saved.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("train {train_id} not found at {station}")]
    TrainNotFound { station: String, train_id: TrainId },

    #[error("not checked in")]
    NotTraveling,

    /// Undo of a journey while another trip is in progress
    #[error("already checked in; check out first")]
    AlreadyTraveling,

    /// The session changed between lookup and commit, or the caller's view
    /// of it is stale
    #[error("session was changed by another request")]
    RaceCondition,

    /// The train is known but has not reported an arrival time yet
    #[error("arrival at {station} is not known yet")]
    ArrivalUnknown { station: String },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] FeedError),

    #[error("journey {0} has been edited and cannot be undone")]
    AlreadyEdited(JourneyId),

    #[error("journey {0} not found")]
    JourneyNotFound(JourneyId),

    #[error("persistence failure: {0}")]
    PersistenceFailure(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::JourneyEdited(id) => EngineError::AlreadyEdited(id),
            StoreError::JourneyNotFound(id) => EngineError::JourneyNotFound(id),
            other => EngineError::PersistenceFailure(other),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::PersistenceFailure(StoreError::Database(err))
    }
}

/// Machine-readable error kind, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TrainNotFound,
    NotTraveling,
    AlreadyTraveling,
    RaceCondition,
    ArrivalUnknown,
    UpstreamUnavailable,
    AlreadyEdited,
    JourneyNotFound,
    PersistenceFailure,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::TrainNotFound { .. } => ErrorKind::TrainNotFound,
            EngineError::NotTraveling => ErrorKind::NotTraveling,
            EngineError::AlreadyTraveling => ErrorKind::AlreadyTraveling,
            EngineError::RaceCondition => ErrorKind::RaceCondition,
            EngineError::ArrivalUnknown { .. } => ErrorKind::ArrivalUnknown,
            EngineError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            EngineError::AlreadyEdited(_) => ErrorKind::AlreadyEdited,
            EngineError::JourneyNotFound(_) => ErrorKind::JourneyNotFound,
            EngineError::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
        }
    }

    /// Safe to retry the same call later.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::ArrivalUnknown { .. } | EngineError::UpstreamUnavailable(_)
        )
    }
}
