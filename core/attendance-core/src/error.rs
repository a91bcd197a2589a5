//! Error types for attendance-core operations.
//!
//! Mutations addressed to an identity with no ledger record are not errors:
//! redundant and late notifications from several upstream sources are
//! expected and are dropped silently.

use std::fmt;
use std::path::PathBuf;

use crate::session::SessionState;

/// Session lifecycle request that was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Start => f.write_str("start"),
            Transition::Stop => f.write_str("stop"),
        }
    }
}

/// All errors that can occur in attendance-core operations.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    // ─────────────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Cannot {attempted} an event while the session is {state}")]
    InvalidTransition {
        state: SessionState,
        attempted: Transition,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration read failed: {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file malformed: {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using AttendanceError.
pub type Result<T> = std::result::Result<T, AttendanceError>;

impl From<AttendanceError> for String {
    fn from(err: AttendanceError) -> String {
        err.to_string()
    }
}
