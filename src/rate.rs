use tokio::time::Duration;

use crate::profile::{Profile, ProfileRates};

/// Length of one pacing window.
pub const PACING_WINDOW: Duration = Duration::from_secs(1);

/// What a worker should do during the next pacing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Profile is off: hold no connection and do no work.
    Idle,
    /// Number of successful operations to perform in the window.
    Operations(u64),
}

/// Splits a profile's aggregate target across a fixed number of workers.
///
/// The budget is recomputed from the profile every window and never cached,
/// so a profile change takes effect at the next window boundary.
#[derive(Debug, Clone)]
pub struct RateController {
    rates: ProfileRates,
    worker_count: usize,
    window: Duration,
}

impl RateController {
    pub fn new(rates: ProfileRates, worker_count: usize) -> Self {
        Self {
            rates,
            worker_count: worker_count.max(1),
            window: PACING_WINDOW,
        }
    }

    /// Overrides the window length. Only tests shrink it.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Per-worker budget for `profile`: `max(1, floor(target / workers))`.
    pub fn budget(&self, profile: Profile) -> Budget {
        match self.rates.target_throughput(profile) {
            None => Budget::Idle,
            Some(target) => Budget::Operations((target / self.worker_count as u64).max(1)),
        }
    }

    /// Sleep needed to finish the window after `elapsed`, or `None` when the
    /// window has already been used up. An overrun is never carried forward.
    pub fn remaining_in_window(&self, elapsed: Duration) -> Option<Duration> {
        self.window
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}
