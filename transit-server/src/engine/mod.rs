//! Check-in / check-out state machine.
//!
//! A traveler is in one of four states:
//!
//! - **Idle**: no session
//! - **Active**: a session whose departure runs
//! - **ActiveCancelled**: a session whose departure itself was cancelled
//! - **Finalized**: the session became a journey and is gone
//!
//! Every operation runs in two phases. The *gather* phase talks to the
//! departure board and reads the session without locking. The *apply* phase
//! is one transaction: it takes the session's write lock, re-reads the
//! session, and fails with [`EngineError::RaceCondition`] if the train,
//! departure station or arrival station changed since the gather phase.
//! Nothing is written unless the whole decision commits.
//!
//! Notifications and enrichment run in detached tasks after the commit and
//! never affect an operation's result.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use transit_server::domain::{TrainId, TravelerId};
//! use transit_server::engine::{CheckoutRequest, Engine, EngineConfig};
//! use transit_server::enrich::Enricher;
//! use transit_server::feeds::mock::{MockBoard, MockTrips};
//! use transit_server::notify::NoopNotifier;
//! use transit_server::store::Store;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::in_memory().await?;
//! let enricher = Enricher::new(store.clone(), Arc::new(MockTrips::new()), Duration::from_secs(5));
//! let engine = Engine::new(
//!     store,
//!     Arc::new(MockBoard::new()),
//!     enricher,
//!     Arc::new(NoopNotifier),
//!     EngineConfig::default(),
//! );
//!
//! let traveler = TravelerId(1);
//! engine.checkin(traveler, "Dortmund Hbf", &TrainId::new("-5016-2410151000-1")).await?;
//! engine.checkout(traveler, CheckoutRequest::new("Essen Hbf")).await?;
//! # Ok(())
//! # }
//! ```

mod checkin;
mod checkout;
mod config;
mod error;
mod matching;
mod undo;


use std::sync::Arc;

use tracing::error;

use crate::domain::{TransitSession, TravelerId};
use crate::enrich::{EnrichRequest, Enricher};
use crate::feeds::{DepartureBoard, DepartureLookup, FeedError, LookupWindow};
use crate::notify::{Notifier, NotifyReason};
use crate::store::{Store, sessions};

pub use checkin::CheckinOutcome;
pub use checkout::{CheckoutOutcome, CheckoutRequest};
pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind};
pub use undo::{UndoOutcome, UndoTarget};

pub(crate) use checkin::new_session;
pub(crate) use checkout::{CheckoutPlan, Decision, apply_checkout};

/// The check-in / check-out engine.
pub struct Engine<B, T, N> {
    store: Store,
    board: Arc<B>,
    enricher: Enricher<T>,
    notifier: Arc<N>,
    config: EngineConfig,
}

impl<B, T, N> Clone for Engine<B, T, N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            board: Arc::clone(&self.board),
            enricher: self.enricher.clone(),
            notifier: Arc::clone(&self.notifier),
            config: self.config.clone(),
        }
    }
}

impl<B, T, N> Engine<B, T, N>
where
    B: DepartureBoard,
    T: crate::feeds::TripSource,
    N: Notifier,
{
    pub fn new(
        store: Store,
        board: Arc<B>,
        enricher: Enricher<T>,
        notifier: Arc<N>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            board,
            enricher,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The same engine with a different board deadline, for background
    /// callers that must not wait as long as a user would.
    pub fn with_feed_timeout(mut self, secs: u64) -> Self {
        self.config.feed_timeout_secs = secs;
        self
    }

    /// Board lookup under the configured deadline.
    pub(crate) async fn lookup(
        &self,
        station: &str,
        window: LookupWindow,
    ) -> Result<DepartureLookup, FeedError> {
        let timeout = self.config.feed_timeout();
        tokio::time::timeout(timeout, self.board.departures(station, window))
            .await
            .map_err(|_| FeedError::Timeout(timeout))?
    }

    /// Unlocked read for the gather phase.
    pub(crate) async fn read_session(
        &self,
        traveler: TravelerId,
    ) -> Result<Option<TransitSession>, EngineError> {
        let mut conn = self.store.conn().await?;
        Ok(sessions::get(&mut conn, traveler).await?)
    }

    /// Fire notifications (in order) and enrichment without waiting.
    pub(crate) fn after_commit(
        &self,
        traveler: TravelerId,
        reasons: Vec<NotifyReason>,
        enrich: Option<EnrichRequest>,
    ) {
        if !reasons.is_empty() {
            let notifier = Arc::clone(&self.notifier);
            tokio::spawn(async move {
                for reason in reasons {
                    notifier.notify(traveler, reason).await;
                }
            });
        }
        if let Some(request) = enrich {
            self.enricher.spawn(request);
        }
    }
}

/// True if two reads of a traveler's session describe the same trip and
/// arrival station.
fn same_state(a: Option<&TransitSession>, b: Option<&TransitSession>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.is_same_trip(b)
                && a.arrival.as_ref().map(|s| s.id) == b.arrival.as_ref().map(|s| s.id)
        }
        _ => false,
    }
}

fn log_failure(traveler: TravelerId, operation: &'static str, err: &EngineError) {
    if let EngineError::PersistenceFailure(e) = err {
        error!(%traveler, operation, error = %e, "persistence failure, transaction rolled back");
    }
}
