//! Request and response message types.

use crate::command::Command;
use crate::document::Document;
use crate::handshake::{Handshake, HandshakeResponse};
use crate::session::SessionToken;
use rkyv::{Archive, Deserialize, Serialize};

/// A request from client to server.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Request {
    /// Unique request identifier for correlation.
    pub id: u64,
    /// Session token, present when the request is issued through a session.
    pub session: Option<SessionToken>,
    /// The command to execute.
    pub command: Command,
}

impl Request {
    /// Create a sessionless request.
    pub fn new(id: u64, command: Command) -> Self {
        Self {
            id,
            session: None,
            command,
        }
    }

    /// Create a request carrying a session token.
    pub fn in_session(id: u64, token: SessionToken, command: Command) -> Self {
        Self {
            id,
            session: Some(token),
            command,
        }
    }

    /// Create a ping request.
    pub fn ping(id: u64) -> Self {
        Self::new(id, Command::Ping)
    }
}

/// Top-level envelope for everything a client sends.
///
/// Tagging the handshake lets a stateless server loop serve mixed traffic
/// without tracking per-connection negotiation state.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Connection negotiation.
    Handshake(Handshake),
    /// An operation request.
    Request(Request),
}

/// Top-level envelope for everything a server sends.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Reply to a handshake.
    Handshake(HandshakeResponse),
    /// Reply to a request.
    Response(Response),
}

/// A response from server to client.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Response {
    /// Request ID this response correlates to.
    pub id: u64,
    /// Response status.
    pub status: Status,
    /// Server logical time after this operation; drives causal consistency.
    pub op_time: u64,
    /// Response payload.
    pub payload: ResponsePayload,
}

/// Response status.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum Status {
    /// Request succeeded.
    Ok,
    /// Request failed with an error.
    Error {
        /// Error code for programmatic handling.
        code: u32,
        /// Human-readable error message.
        message: String,
    },
}

impl Status {
    /// Create a success status.
    pub fn ok() -> Self {
        Status::Ok
    }

    /// Create an error status.
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Status::Error {
            code,
            message: message.into(),
        }
    }

    /// Check if this is a success status.
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Check if this is an error status.
    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error { .. })
    }
}

/// Response payload variants.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// Documents from a find/aggregate/get-more.
    Documents(DocumentBatch),
    /// Outcome of a write command.
    Write(WriteResult),
    /// Count of matching documents.
    Count(u64),
    /// Pong response to ping.
    Pong,
    /// Empty payload (for errors and acknowledgements).
    Empty,
}

/// A batch of result documents plus an optional cursor handle for the rest.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct DocumentBatch {
    /// Documents in this batch.
    pub documents: Vec<Document>,
    /// Cursor handle when more results remain server-side.
    pub cursor_id: Option<u64>,
}

impl DocumentBatch {
    /// Create a final batch with no cursor.
    pub fn complete(documents: Vec<Document>) -> Self {
        Self {
            documents,
            cursor_id: None,
        }
    }

    /// Create a partial batch with a cursor for the remainder.
    pub fn partial(documents: Vec<Document>, cursor_id: u64) -> Self {
        Self {
            documents,
            cursor_id: Some(cursor_id),
        }
    }

    /// Number of documents in this batch.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Outcome of a write command.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct WriteResult {
    /// Number of documents inserted.
    pub inserted: u64,
    /// Number of documents matched by an update filter.
    pub matched: u64,
    /// Number of documents modified.
    pub modified: u64,
    /// Number of documents deleted.
    pub deleted: u64,
    /// Per-item errors (non-empty for partially failed unordered writes).
    pub errors: Vec<WriteError>,
}

impl WriteResult {
    /// Result recording inserted documents.
    pub fn inserted(count: u64) -> Self {
        Self {
            inserted: count,
            ..Default::default()
        }
    }

    /// Whether every item of the write succeeded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// An error for one item of a write command.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct WriteError {
    /// Index of the failed item within the command.
    pub index: u32,
    /// Error code (see [`error_codes`]).
    pub code: u32,
    /// Human-readable message.
    pub message: String,
}

impl WriteError {
    /// Create a write error.
    pub fn new(index: u32, code: u32, message: impl Into<String>) -> Self {
        Self {
            index,
            code,
            message: message.into(),
        }
    }
}

impl Response {
    /// Create a successful documents response.
    pub fn documents_ok(id: u64, op_time: u64, batch: DocumentBatch) -> Self {
        Self {
            id,
            status: Status::ok(),
            op_time,
            payload: ResponsePayload::Documents(batch),
        }
    }

    /// Create a successful write response.
    pub fn write_ok(id: u64, op_time: u64, result: WriteResult) -> Self {
        Self {
            id,
            status: Status::ok(),
            op_time,
            payload: ResponsePayload::Write(result),
        }
    }

    /// Create a successful count response.
    pub fn count_ok(id: u64, op_time: u64, count: u64) -> Self {
        Self {
            id,
            status: Status::ok(),
            op_time,
            payload: ResponsePayload::Count(count),
        }
    }

    /// Create a pong response.
    pub fn pong(id: u64, op_time: u64) -> Self {
        Self {
            id,
            status: Status::ok(),
            op_time,
            payload: ResponsePayload::Pong,
        }
    }

    /// Create an empty acknowledgement response.
    pub fn ack(id: u64, op_time: u64) -> Self {
        Self {
            id,
            status: Status::ok(),
            op_time,
            payload: ResponsePayload::Empty,
        }
    }

    /// Create an error response.
    pub fn error(id: u64, op_time: u64, code: u32, message: impl Into<String>) -> Self {
        Self {
            id,
            status: Status::error(code, message),
            op_time,
            payload: ResponsePayload::Empty,
        }
    }
}

/// Standard error codes.
pub mod error_codes {
    /// Unknown/internal error.
    pub const INTERNAL: u32 = 1;
    /// Invalid request format.
    pub const INVALID_REQUEST: u32 = 2;
    /// Collection or document not found.
    pub const NOT_FOUND: u32 = 3;
    /// A document with the same `_id` already exists.
    pub const DUPLICATE_KEY: u32 = 4;
    /// The referenced transaction is not open on the server.
    pub const NO_SUCH_TRANSACTION: u32 = 5;
    /// Transaction conflict with a concurrent writer.
    pub const WRITE_CONFLICT: u32 = 6;
    /// The referenced cursor is not open on the server.
    pub const CURSOR_NOT_FOUND: u32 = 7;
    /// Request timed out server-side.
    pub const TIMEOUT: u32 = 8;
    /// The referenced session has expired.
    pub const SESSION_EXPIRED: u32 = 9;
}
