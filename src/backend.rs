//! Backend connector seam.
//!
//! Workers only ever talk to the database through [`Backend`]. The production
//! implementation is [`crate::mysql::MySqlBackend`]; tests plug in scripted
//! backends to inject failures.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::BackendError;

/// One of the four opaque actions a worker can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Trivial round-trip, cheap enough to run thousands per second.
    #[serde(alias = "ping", alias = "lightweight-probe")]
    Probe,
    /// Bounded read join, result fully drained.
    #[serde(alias = "select", alias = "read-query")]
    Read,
    /// Insert of a new record.
    Insert,
    /// Update of the oldest not-yet-finalized record.
    Update,
}

impl OperationKind {
    /// Get the Prometheus label for this operation kind.
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Probe => "probe",
            OperationKind::Read => "read",
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
        }
    }

    pub fn all() -> [OperationKind; 4] {
        [
            OperationKind::Probe,
            OperationKind::Read,
            OperationKind::Insert,
            OperationKind::Update,
        ]
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opens connections and runs operations against the data backend.
///
/// A connection is owned by exactly one worker and is never shared, so the
/// trait hands connections out by value and borrows them mutably per call.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Conn: Send + 'static;

    /// Opens one connection.
    async fn connect(&self) -> Result<Self::Conn, BackendError>;

    /// Performs the side effect associated with `kind`.
    async fn execute(&self, conn: &mut Self::Conn, kind: OperationKind)
        -> Result<(), BackendError>;

    /// Releases a connection. Must tolerate already-broken connections;
    /// implementations swallow (and at most log) any error raised here.
    async fn close(&self, conn: Self::Conn);
}
