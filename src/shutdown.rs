//! Pool-wide stop signal.
//!
//! Backed by a `watch` channel so that a unit subscribing after the signal
//! fired still observes it. Every sleep in the pool goes through
//! [`Shutdown::sleep`], which bounds stop latency to one in-flight call.

use tokio::sync::watch;
use tokio::time::{self, Duration};

/// Fires the stop signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Observes the stop signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Creates a connected trigger/listener pair.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    /// Signals every listener. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal fires (or the trigger is dropped).
    pub async fn wait(&mut self) {
        // An Err means the trigger is gone, which is treated as a stop too.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleeps for `duration` unless stopped first.
    ///
    /// Returns `true` when the full duration elapsed, `false` on stop.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_triggered() {
            return false;
        }
        tokio::select! {
            _ = time::sleep(duration) => !self.is_triggered(),
            _ = self.wait() => false,
        }
    }
}
