use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::errors::FailureClass;
use crate::metrics::{
    CONNECTS_TOTAL, CONNECT_FAILURES_TOTAL, OPEN_CONNECTIONS, OPERATIONS_TOTAL,
    OPERATION_DURATION_SECONDS, OPERATION_FAILURES_TOTAL,
};
use crate::mix::MixTable;
use crate::profile::{Profile, ProfileReader};
use crate::rate::{Budget, RateController};
use crate::shutdown::Shutdown;

/// Sleep intervals used by the worker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTimings {
    /// Re-check interval while the profile is off.
    pub idle_poll: Duration,
    /// Wait after a failed connect.
    pub connect_backoff: Duration,
    /// Wait after a reconnect-class failure before connecting again.
    pub reconnect_backoff: Duration,
    /// Pause before retrying after a retryable failure.
    pub retry_delay: Duration,
    /// Pause after an unclassified failure.
    pub unclassified_delay: Duration,
}

impl Default for WorkerTimings {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_millis(500),
            connect_backoff: Duration::from_secs(2),
            reconnect_backoff: Duration::from_millis(500),
            retry_delay: Duration::from_millis(1),
            unclassified_delay: Duration::from_millis(1),
        }
    }
}

/// Everything a worker needs, shared or owned.
pub struct WorkerConfig<B: Backend> {
    /// 1-based identity, used for logs only.
    pub worker_id: usize,
    pub backend: Arc<B>,
    pub profile: ProfileReader,
    pub rate: Arc<RateController>,
    pub mix: Arc<MixTable>,
    pub timings: WorkerTimings,
    pub shutdown: Shutdown,
}

/// Worker lifecycle. The connection lives inside `Running`, so it cannot be
/// held in any other state.
pub enum WorkerState<C> {
    Idle,
    Connecting,
    Running(C),
    Backoff(Duration),
    Stopped,
}

impl<C> WorkerState<C> {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Connecting => "connecting",
            WorkerState::Running(_) => "running",
            WorkerState::Backoff(_) => "backoff",
            WorkerState::Stopped => "stopped",
        }
    }
}

/// How a pacing window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowOutcome {
    /// Budget consumed or window time used up.
    Completed { succeeded: u64 },
    /// The connection must be discarded.
    Reconnect,
    /// Stop signal observed mid-window.
    Stopped,
}

/// Runs one worker until the stop signal fires.
pub async fn run_worker<B: Backend>(config: WorkerConfig<B>) {
    Worker::new(config).run().await
}

struct Worker<B: Backend> {
    config: WorkerConfig<B>,
    rng: StdRng,
    last_profile: Option<Profile>,
}

impl<B: Backend> Worker<B> {
    fn new(config: WorkerConfig<B>) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
            last_profile: None,
        }
    }

    async fn run(mut self) {
        let worker_id = self.config.worker_id;
        debug!(worker_id, "Worker starting");

        let mut state = WorkerState::Idle;
        loop {
            if self.config.shutdown.is_triggered() {
                if let WorkerState::Running(conn) = state {
                    self.disconnect(conn, "stop signal").await;
                }
                break;
            }

            let from = state.name();
            state = match state {
                WorkerState::Idle => self.idle().await,
                WorkerState::Connecting => self.connect().await,
                WorkerState::Running(conn) => self.run_window(conn).await,
                WorkerState::Backoff(delay) => {
                    if self.config.shutdown.sleep(delay).await {
                        WorkerState::Connecting
                    } else {
                        WorkerState::Stopped
                    }
                }
                WorkerState::Stopped => break,
            };
            if state.name() != from {
                debug!(worker_id, from, to = state.name(), "Worker state changed");
            }
        }

        info!(worker_id, "Worker stopped");
    }

    /// Notes a profile change once per transition.
    fn observe(&mut self, profile: Profile) {
        if self.last_profile == Some(profile) {
            return;
        }
        self.last_profile = Some(profile);
        match self.config.rate.budget(profile) {
            Budget::Idle => info!(
                worker_id = self.config.worker_id,
                profile = %profile,
                "Profile off, worker idle"
            ),
            Budget::Operations(ops) => info!(
                worker_id = self.config.worker_id,
                profile = %profile,
                ops_per_sec = ops,
                "Profile active"
            ),
        }
    }

    async fn idle(&mut self) -> WorkerState<B::Conn> {
        let profile = self.config.profile.current();
        self.observe(profile);

        if profile.is_active() {
            return WorkerState::Connecting;
        }
        if self.config.shutdown.sleep(self.config.timings.idle_poll).await {
            WorkerState::Idle
        } else {
            WorkerState::Stopped
        }
    }

    async fn connect(&mut self) -> WorkerState<B::Conn> {
        let profile = self.config.profile.current();
        self.observe(profile);
        if !profile.is_active() {
            return WorkerState::Idle;
        }

        match self.config.backend.connect().await {
            Ok(conn) => {
                CONNECTS_TOTAL.inc();
                OPEN_CONNECTIONS.inc();
                info!(worker_id = self.config.worker_id, "Connected to backend");
                WorkerState::Running(conn)
            }
            Err(e) => {
                CONNECT_FAILURES_TOTAL.inc();
                let retry_in = self.config.timings.connect_backoff;
                warn!(
                    worker_id = self.config.worker_id,
                    error = %e,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "Backend connect failed"
                );
                WorkerState::Backoff(retry_in)
            }
        }
    }

    async fn disconnect(&self, conn: B::Conn, reason: &'static str) {
        self.config.backend.close(conn).await;
        OPEN_CONNECTIONS.dec();
        info!(
            worker_id = self.config.worker_id,
            reason, "Disconnected from backend"
        );
    }

    /// One pacing window on a held connection.
    async fn run_window(&mut self, mut conn: B::Conn) -> WorkerState<B::Conn> {
        let window_start = Instant::now();

        // The profile is read once per window.
        let profile = self.config.profile.current();
        self.observe(profile);
        let budget = match self.config.rate.budget(profile) {
            Budget::Idle => {
                self.disconnect(conn, "profile off").await;
                return WorkerState::Idle;
            }
            Budget::Operations(ops) => ops,
        };

        match self.execute_budget(&mut conn, profile, budget, window_start).await {
            WindowOutcome::Completed { succeeded } => {
                let elapsed = window_start.elapsed();
                if succeeded < budget {
                    debug!(
                        worker_id = self.config.worker_id,
                        succeeded,
                        budget,
                        "Window ended before budget was met"
                    );
                }
                if let Some(remaining) = self.config.rate.remaining_in_window(elapsed) {
                    if !self.config.shutdown.sleep(remaining).await {
                        self.disconnect(conn, "stop signal").await;
                        return WorkerState::Stopped;
                    }
                }
                WorkerState::Running(conn)
            }
            WindowOutcome::Reconnect => {
                self.disconnect(conn, "connection error").await;
                WorkerState::Backoff(self.config.timings.reconnect_backoff)
            }
            WindowOutcome::Stopped => {
                self.disconnect(conn, "stop signal").await;
                WorkerState::Stopped
            }
        }
    }

    /// Executes up to `budget` successful operations. Failed attempts are not
    /// counted. The window also closes once its length has elapsed, so a
    /// stream of failures cannot hold the worker on a stale profile.
    async fn execute_budget(
        &mut self,
        conn: &mut B::Conn,
        profile: Profile,
        budget: u64,
        window_start: Instant,
    ) -> WindowOutcome {
        let worker_id = self.config.worker_id;
        let window = self.config.rate.window();
        let mut succeeded = 0u64;

        while succeeded < budget {
            if self.config.shutdown.is_triggered() {
                return WindowOutcome::Stopped;
            }
            if window_start.elapsed() >= window {
                break;
            }

            let Some(kind) = self.config.mix.pick(profile, &mut self.rng) else {
                break;
            };

            let op_start = Instant::now();
            let result = self.config.backend.execute(conn, kind).await;
            OPERATION_DURATION_SECONDS.observe(op_start.elapsed().as_secs_f64());

            let err = match result {
                Ok(()) => {
                    OPERATIONS_TOTAL.with_label_values(&[kind.label()]).inc();
                    succeeded += 1;
                    continue;
                }
                Err(e) => e,
            };

            let class = FailureClass::classify(&err);
            OPERATION_FAILURES_TOTAL
                .with_label_values(&[class.label()])
                .inc();

            let pause = match class {
                FailureClass::Retryable => {
                    debug!(
                        worker_id,
                        operation = %kind,
                        error = %err,
                        "Transient conflict, retrying"
                    );
                    self.config.timings.retry_delay
                }
                FailureClass::Reconnect => {
                    warn!(
                        worker_id,
                        operation = %kind,
                        error = %err,
                        "Backend error, closing connection and reconnecting"
                    );
                    return WindowOutcome::Reconnect;
                }
                FailureClass::Unclassified => {
                    error!(
                        worker_id,
                        operation = %kind,
                        error = %err,
                        "Unexpected error"
                    );
                    self.config.timings.unclassified_delay
                }
            };

            if !self.config.shutdown.sleep(pause).await {
                return WindowOutcome::Stopped;
            }
        }

        WindowOutcome::Completed { succeeded }
    }
}
