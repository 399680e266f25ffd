//! Application state for the web layer.

use crate::engine::Engine;
use crate::status::StatusProjector;
use crate::sync::SyncAdapter;

/// Shared application state.
///
/// Generic over the feeds so the same router serves live feeds, fixture
/// boards and test mocks.
pub struct AppState<B, T, N> {
    pub engine: Engine<B, T, N>,
    pub status: StatusProjector,
    pub sync: SyncAdapter<B, T, N>,
}

impl<B, T, N> Clone for AppState<B, T, N> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            status: self.status.clone(),
            sync: self.sync.clone(),
        }
    }
}

impl<B, T, N> AppState<B, T, N>
where
    B: crate::feeds::DepartureBoard,
    T: crate::feeds::TripSource,
    N: crate::notify::Notifier,
{
    /// Create a new app state around `engine`.
    pub fn new(engine: Engine<B, T, N>) -> Self {
        let status = StatusProjector::new(engine.store().clone());
        let sync = SyncAdapter::new(engine.clone());
        Self {
            engine,
            status,
            sync,
        }
    }
}
