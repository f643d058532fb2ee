//! DocDB protocol types and serialization.
//!
//! This crate defines the wire protocol for DocDB, using rkyv for
//! zero-copy serialization. Messages travel as command documents over a
//! length-prefixed binary framing.
//!
//! # Modules
//!
//! - [`document`] - Document and value types
//! - [`command`] - Operation request types (insert/find/update/delete/aggregate)
//! - [`session`] - Session and transaction wire tokens
//! - [`message`] - Request/response message wrappers
//! - [`handshake`] - Protocol negotiation types
//! - [`framing`] - Length-prefix framing
//! - [`error`] - Protocol error types

pub mod command;
pub mod document;
pub mod error;
pub mod framing;
pub mod handshake;
pub mod message;
pub mod session;

pub use error::Error;

// Re-export commonly used types at crate root
pub use command::{
    AggregateQuery, AggregateStage, Accumulator, AggregateFunction, Command, Condition, Filter,
    FindQuery, SortDirection, SortSpec,
};
pub use document::{Document, DocumentId, Field, Value, ID_FIELD};
pub use handshake::{Handshake, HandshakeResponse};
pub use message::{
    error_codes, ClientMessage, DocumentBatch, Request, Response, ResponsePayload, ServerMessage,
    Status, WriteError, WriteResult,
};
pub use session::{SessionId, SessionToken, TxnContext};

/// Protocol version for wire compatibility.
///
/// Included in handshake messages so client and server can verify they
/// speak the same protocol. Incremented on incompatible changes.
pub const PROTOCOL_VERSION: u32 = 1;
