//! Engine configuration.

use std::time::Duration;

use crate::feeds::LookupWindow;

/// Board windows and timeouts used by the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Check-in lookup: minutes into the past.
    pub checkin_lookbehind_mins: u32,

    /// Check-in lookup: minutes into the future.
    pub checkin_lookahead_mins: u32,

    /// Check-out lookup. Wide, since the arrival can be delayed a lot.
    pub checkout_lookbehind_mins: u32,
    pub checkout_lookahead_mins: u32,

    /// Second check-out attempt, including related stations.
    pub retry_lookbehind_mins: u32,
    pub retry_lookahead_mins: u32,

    /// Deadline for board calls on the decision path (seconds).
    pub feed_timeout_secs: u64,
}

impl EngineConfig {
    /// Create a configuration with default windows and the given timeout.
    pub fn new(feed_timeout_secs: u64) -> Self {
        Self {
            feed_timeout_secs,
            ..Self::default()
        }
    }

    pub fn checkin_window(&self) -> LookupWindow {
        LookupWindow::new(self.checkin_lookbehind_mins, self.checkin_lookahead_mins)
    }

    pub fn checkout_window(&self) -> LookupWindow {
        LookupWindow::new(self.checkout_lookbehind_mins, self.checkout_lookahead_mins)
    }

    pub fn retry_window(&self) -> LookupWindow {
        LookupWindow::new(self.retry_lookbehind_mins, self.retry_lookahead_mins).with_related()
    }

    /// Returns the feed timeout as a Duration.
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            checkin_lookbehind_mins: 30,
            checkin_lookahead_mins: 60,
            checkout_lookbehind_mins: 120,
            checkout_lookahead_mins: 180,
            retry_lookbehind_mins: 120,
            retry_lookahead_mins: 360,
            feed_timeout_secs: 20,
        }
    }
}
