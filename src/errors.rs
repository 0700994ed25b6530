//! Backend error taxonomy and failure classification.
//!
//! Every failure a worker sees while talking to the backend is reduced to a
//! [`BackendError`] at the connector boundary, then mapped onto one of three
//! recovery classes by [`FailureClass::classify`]. The mapping is the single
//! place that decides whether a connection is kept, retried or torn down.

use std::fmt;

use thiserror::Error;

/// MySQL server error: deadlock found when trying to get lock.
pub const ER_LOCK_DEADLOCK: u16 = 1213;
/// MySQL server error: lock wait timeout exceeded.
pub const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
/// MySQL server error: server shutdown in progress.
pub const ER_SERVER_SHUTDOWN: u16 = 1053;
/// MySQL server error: connection was killed.
pub const ER_CONNECTION_KILLED: u16 = 1927;
/// MySQL client error: server has gone away.
pub const CR_SERVER_GONE_ERROR: u16 = 2006;
/// MySQL client error: lost connection during query.
pub const CR_SERVER_LOST: u16 = 2013;

/// SQLSTATE reported for serialization failures.
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

/// Failures surfaced by a [`crate::backend::Backend`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend is unreachable or rejected the connection.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The connection broke underneath an operation.
    #[error("connection lost: {0}")]
    Transport(String),

    /// The server rejected a statement.
    #[error("database error {}: {message}", .number.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()))]
    Database {
        number: Option<u16>,
        sqlstate: Option<String>,
        message: String,
    },

    /// Anything the connector could not attribute to the categories above.
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Convenience constructor for a server error carrying only its number.
    pub fn database(number: u16, message: impl Into<String>) -> Self {
        BackendError::Database {
            number: Some(number),
            sqlstate: None,
            message: message.into(),
        }
    }
}

/// Recovery policy for a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Transient conflict; retry on the same connection after a short pause.
    Retryable,

    /// The connection is unusable; discard it and reconnect.
    Reconnect,

    /// Unknown failure; log it, pause briefly, keep the connection.
    Unclassified,
}

impl FailureClass {
    /// Maps a backend error onto its recovery class.
    pub fn classify(error: &BackendError) -> Self {
        match error {
            BackendError::Connect(_) | BackendError::Transport(_) => FailureClass::Reconnect,
            BackendError::Database {
                number, sqlstate, ..
            } => {
                if let Some(class) = number.and_then(Self::from_error_number) {
                    class
                } else if sqlstate.as_deref() == Some(SQLSTATE_SERIALIZATION_FAILURE) {
                    FailureClass::Retryable
                } else {
                    FailureClass::Unclassified
                }
            }
            BackendError::Other(_) => FailureClass::Unclassified,
        }
    }

    /// Classifies a server error number, or `None` if the number carries no
    /// known policy.
    pub fn from_error_number(number: u16) -> Option<Self> {
        match number {
            ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT => Some(FailureClass::Retryable),
            ER_SERVER_SHUTDOWN | ER_CONNECTION_KILLED | CR_SERVER_GONE_ERROR | CR_SERVER_LOST => {
                Some(FailureClass::Reconnect)
            }
            _ => None,
        }
    }

    /// Get the Prometheus label for this failure class.
    pub fn label(&self) -> &'static str {
        match self {
            FailureClass::Retryable => "retryable",
            FailureClass::Reconnect => "reconnect",
            FailureClass::Unclassified => "unclassified",
        }
    }

    /// Get a human-readable description of this failure class.
    pub fn description(&self) -> &'static str {
        match self {
            FailureClass::Retryable => "Transient lock/serialization conflicts",
            FailureClass::Reconnect => "Broken connections",
            FailureClass::Unclassified => "Other/Unknown errors",
        }
    }

    /// Get all failure classes in a consistent order.
    pub fn all() -> Vec<FailureClass> {
        vec![
            FailureClass::Retryable,
            FailureClass::Reconnect,
            FailureClass::Unclassified,
        ]
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
