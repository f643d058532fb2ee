//! Client error types.

use std::time::Duration;

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// No connection became available within the acquisition timeout.
    /// Recoverable by caller retry/backoff.
    #[error("pool exhausted: no connection available within {waited:?}")]
    PoolExhausted {
        /// How long the caller waited before giving up.
        waited: Duration,
    },

    /// Network-level failure. Retried internally for idempotent
    /// operations, surfaced otherwise.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store rejected the command. Never retried blindly.
    #[error("server error {code}: {message}")]
    Server {
        /// Server-reported error code (see `docdb_proto::error_codes`).
        code: u32,
        /// Server-reported message.
        message: String,
    },

    /// Malformed request or response. Always fatal to the operation.
    #[error("protocol error: {0}")]
    Protocol(#[from] docdb_proto::Error),

    /// The session cannot accept further operations.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The client has been shut down.
    #[error("client is closed")]
    Closed,
}

impl Error {
    /// Whether this is a network-level failure that a retry might fix.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Get the server error code, if this is a server error.
    pub fn server_code(&self) -> Option<u32> {
        match self {
            Error::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Session state errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session was committed and is terminal.
    #[error("session already committed")]
    Committed,

    /// The session was aborted and is terminal.
    #[error("session already aborted")]
    Aborted,

    /// The session exceeded its timeout and is terminal.
    #[error("session timed out")]
    TimedOut,

    /// A transaction operation was issued with no open transaction.
    #[error("no open transaction")]
    NoTransaction,

    /// `start_transaction` was called while one is already open.
    #[error("transaction already open")]
    TransactionOpen,
}
