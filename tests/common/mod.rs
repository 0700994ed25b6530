//! Shared test support: an in-memory backend whose failures are scripted.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Duration;

use rust_dbload::backend::{Backend, OperationKind};
use rust_dbload::errors::BackendError;
use rust_dbload::mix::MixTable;
use rust_dbload::profile::{ProfileRates, ProfileReader};
use rust_dbload::rate::RateController;
use rust_dbload::shutdown::Shutdown;
use rust_dbload::worker::{WorkerConfig, WorkerTimings};

/// Counters observed by the tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackendStats {
    pub connect_attempts: usize,
    pub connects: usize,
    pub closes: usize,
    pub attempts: usize,
    pub successes: usize,
    pub open: usize,
}

#[derive(Default)]
struct Inner {
    stats: BackendStats,
    connect_failures: VecDeque<BackendError>,
    execute_failures: VecDeque<BackendError>,
    kinds: Vec<OperationKind>,
}

/// Backend that never touches the network. Queued failures are returned in
/// order before calls start succeeding again.
#[derive(Default)]
pub struct ScriptedBackend {
    inner: Mutex<Inner>,
    hang_on_execute: AtomicBool,
}

#[derive(Debug)]
pub struct ScriptedConn {
    pub id: usize,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_connects(&self, errors: impl IntoIterator<Item = BackendError>) {
        self.inner.lock().unwrap().connect_failures.extend(errors);
    }

    pub fn fail_executes(&self, errors: impl IntoIterator<Item = BackendError>) {
        self.inner.lock().unwrap().execute_failures.extend(errors);
    }

    /// Makes every later `execute` call block forever.
    pub fn hang_on_execute(&self) {
        self.hang_on_execute.store(true, Ordering::SeqCst);
    }

    pub fn stats(&self) -> BackendStats {
        self.inner.lock().unwrap().stats.clone()
    }

    pub fn executed_kinds(&self) -> Vec<OperationKind> {
        self.inner.lock().unwrap().kinds.clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    type Conn = ScriptedConn;

    async fn connect(&self) -> Result<ScriptedConn, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.stats.connect_attempts += 1;
        if let Some(err) = inner.connect_failures.pop_front() {
            return Err(err);
        }
        inner.stats.connects += 1;
        inner.stats.open += 1;
        Ok(ScriptedConn {
            id: inner.stats.connects,
        })
    }

    async fn execute(
        &self,
        _conn: &mut ScriptedConn,
        kind: OperationKind,
    ) -> Result<(), BackendError> {
        if self.hang_on_execute.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.stats.attempts += 1;
        if let Some(err) = inner.execute_failures.pop_front() {
            return Err(err);
        }
        inner.stats.successes += 1;
        inner.kinds.push(kind);
        Ok(())
    }

    async fn close(&self, _conn: ScriptedConn) {
        let mut inner = self.inner.lock().unwrap();
        inner.stats.closes += 1;
        inner.stats.open -= 1;
    }
}

/// Short backoffs so paused-clock tests stay readable.
pub fn fast_timings() -> WorkerTimings {
    WorkerTimings {
        idle_poll: Duration::from_millis(100),
        connect_backoff: Duration::from_millis(100),
        reconnect_backoff: Duration::from_millis(50),
        retry_delay: Duration::from_millis(1),
        unclassified_delay: Duration::from_millis(1),
    }
}

pub fn rates(low: u64, med: u64, high: u64) -> ProfileRates {
    ProfileRates { low, med, high }
}

pub fn worker_config(
    worker_id: usize,
    backend: Arc<ScriptedBackend>,
    profile: ProfileReader,
    rate: RateController,
    timings: WorkerTimings,
    shutdown: Shutdown,
) -> WorkerConfig<ScriptedBackend> {
    WorkerConfig {
        worker_id,
        backend,
        profile,
        rate: Arc::new(rate),
        mix: Arc::new(MixTable::default()),
        timings,
        shutdown,
    }
}
