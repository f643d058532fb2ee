//! Session and transaction wire tokens.
//!
//! Every request issued through a session carries a [`SessionToken`]
//! explicitly; there is no ambient or connection-bound session state.

use rkyv::{Archive, Deserialize, Serialize};

/// A session identifier: 16 opaque bytes chosen by the client.
pub type SessionId = [u8; 16];

/// The causal-consistency token attached to requests issued in a session.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct SessionToken {
    /// Session identifier.
    pub session_id: SessionId,
    /// The server logical time this session has observed; the server must
    /// not answer from a state older than this.
    pub after_op_time: Option<u64>,
    /// Pinned snapshot time. When set, reads observe the store as of this
    /// logical time regardless of later writes.
    pub snapshot_time: Option<u64>,
    /// Transaction context, present while a transaction is open.
    pub txn: Option<TxnContext>,
    /// Retryable-write token: the server suppresses duplicate execution of
    /// a `(session_id, write_number)` pair.
    pub write_number: Option<u64>,
}

impl SessionToken {
    /// Create a bare token for a session.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            after_op_time: None,
            snapshot_time: None,
            txn: None,
            write_number: None,
        }
    }

    /// Set the causal-consistency floor.
    pub fn with_after_op_time(mut self, op_time: u64) -> Self {
        self.after_op_time = Some(op_time);
        self
    }

    /// Pin a snapshot time.
    pub fn with_snapshot_time(mut self, op_time: u64) -> Self {
        self.snapshot_time = Some(op_time);
        self
    }

    /// Attach a transaction context.
    pub fn with_txn(mut self, txn: TxnContext) -> Self {
        self.txn = Some(txn);
        self
    }

    /// Attach a retryable-write token.
    pub fn with_write_number(mut self, write_number: u64) -> Self {
        self.write_number = Some(write_number);
        self
    }

    /// Whether this token is inside an open transaction.
    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }
}

/// Transaction context carried by in-transaction requests.
///
/// Operations tagged with the same transaction number are staged by the
/// server and applied atomically at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct TxnContext {
    /// Transaction number, unique per session and strictly increasing.
    pub number: u64,
    /// True on the first operation of the transaction.
    pub start: bool,
}

impl TxnContext {
    /// Context for the first operation of a transaction.
    pub fn start(number: u64) -> Self {
        Self {
            number,
            start: true,
        }
    }

    /// Context for subsequent operations of a transaction.
    pub fn continued(number: u64) -> Self {
        Self {
            number,
            start: false,
        }
    }
}
