//! Background re-attempts of pending check-outs.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::{CheckoutOutcome, CheckoutRequest, Engine, EngineError};
use crate::feeds::{DepartureBoard, TripSource};
use crate::notify::Notifier;
use crate::store::sessions;

/// Re-check every active session with a known destination each `interval`.
///
/// Board calls use `engine`'s feed timeout, so pass an engine built with
/// the background deadline. Runs until the task is dropped.
pub async fn run_poller<B, T, N>(engine: Engine<B, T, N>, interval: Duration)
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick is immediate
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match poll_once(&engine).await {
            Ok(0) => {}
            Ok(finished) => info!(finished, "poller finalized sessions"),
            Err(e) => warn!(error = %e, "poller could not list active sessions"),
        }
    }
}

/// One pass over the active sessions. Returns how many were finalized.
pub async fn poll_once<B, T, N>(engine: &Engine<B, T, N>) -> Result<usize, EngineError>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    let active = {
        let mut conn = engine.store().conn().await?;
        sessions::list_active(&mut conn).await?
    };

    let mut finished = 0;
    for session in active {
        let Some(arrival) = session.arrival else {
            continue;
        };
        let request = CheckoutRequest::new(arrival.id.to_string()).with_expected_arrival(arrival.id);
        match engine.checkout(session.traveler, request).await {
            Ok(CheckoutOutcome::Arrived { .. } | CheckoutOutcome::Cancelled { .. }) => finished += 1,
            Ok(_) => {}
            Err(e) if e.is_recoverable() => {
                debug!(traveler = %session.traveler, station = %arrival, error = %e, "still waiting")
            }
            Err(e) => {
                warn!(traveler = %session.traveler, station = %arrival, error = %e, "poller check-out failed")
            }
        }
    }
    Ok(finished)
}
