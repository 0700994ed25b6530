//! Pool supervisor.
//!
//! Owns the fixed set of workers and the profile source. It builds the
//! shared profile cell and the stop signal, injects them into every unit,
//! and later shuts everything down with a bounded wait. It never sits on the
//! data path.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::{info, warn};

use crate::backend::Backend;
use crate::metrics::CURRENT_PROFILE;
use crate::mix::MixTable;
use crate::poller::{PollError, PollerConfig, ProfilePoller};
use crate::profile::{profile_channel, Profile, ProfileRates, ProfileReader};
use crate::rate::RateController;
use crate::shutdown::{shutdown_channel, ShutdownTrigger};
use crate::worker::{run_worker, WorkerConfig, WorkerTimings};

/// Where the profile comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSource {
    /// Poll the control plane (multi-worker, externally driven mode).
    Poll(PollerConfig),
    /// Use one profile for the whole run (single-loop mode).
    Fixed(Profile),
}

/// Pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_count: usize,
    pub rates: ProfileRates,
    pub mix: MixTable,
    pub timings: WorkerTimings,
    pub source: ProfileSource,
}

/// Outcome of a bounded shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// Units that exited on their own.
    pub finished: usize,
    /// Units still running at the deadline and aborted.
    pub aborted: usize,
}

/// A started pool.
pub struct LoadPool {
    trigger: ShutdownTrigger,
    profile: ProfileReader,
    workers: Vec<JoinHandle<()>>,
    poller: Option<JoinHandle<()>>,
}

impl LoadPool {
    /// Spawns the profile source and `worker_count` workers (ids `1..=N`).
    pub fn start<B: Backend>(config: PoolConfig, backend: Arc<B>) -> Result<Self, PollError> {
        let (trigger, shutdown) = shutdown_channel();
        let (publisher, profile) = profile_channel();

        let poller = match config.source {
            ProfileSource::Poll(poller_config) => {
                let poller = ProfilePoller::new(poller_config, publisher)?;
                Some(tokio::spawn(poller.run(shutdown.clone())))
            }
            ProfileSource::Fixed(fixed) => {
                publisher.publish(fixed);
                CURRENT_PROFILE.set(fixed.level());
                info!(profile = %fixed, "Using fixed load profile");
                None
            }
        };

        let rate = Arc::new(RateController::new(config.rates, config.worker_count));
        let mix = Arc::new(config.mix);

        info!(
            workers = config.worker_count,
            polled = poller.is_some(),
            "Starting load pool"
        );

        let workers = (1..=config.worker_count)
            .map(|worker_id| {
                tokio::spawn(run_worker(WorkerConfig {
                    worker_id,
                    backend: Arc::clone(&backend),
                    profile: profile.clone(),
                    rate: Arc::clone(&rate),
                    mix: Arc::clone(&mix),
                    timings: config.timings,
                    shutdown: shutdown.clone(),
                }))
            })
            .collect();

        Ok(Self {
            trigger,
            profile,
            workers,
            poller,
        })
    }

    /// Profile currently visible to the workers.
    pub fn current_profile(&self) -> Profile {
        self.profile.current()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Signals every unit to stop and waits up to `grace` for all of them.
    pub async fn shutdown(self, grace: Duration) -> ShutdownReport {
        info!(grace_ms = grace.as_millis() as u64, "Stopping load pool");
        self.trigger.trigger();

        let deadline = Instant::now() + grace;
        let mut report = ShutdownReport::default();

        for mut handle in self.workers.into_iter().chain(self.poller) {
            match time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => report.finished += 1,
                Ok(Err(e)) => {
                    warn!(error = %e, "Pool unit ended abnormally");
                    report.finished += 1;
                }
                Err(_) => {
                    handle.abort();
                    report.aborted += 1;
                }
            }
        }

        if report.aborted > 0 {
            warn!(
                aborted = report.aborted,
                "Some pool units did not stop within the grace period"
            );
        }
        info!(finished = report.finished, "Load pool stopped");
        report
    }
}
