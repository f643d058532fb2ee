//! Protocol-level failures.

use thiserror::Error;

/// Errors producing or consuming wire messages.
#[derive(Debug, Error)]
pub enum Error {
    /// A message could not be encoded for the wire.
    #[error("failed to encode message: {0}")]
    Serialization(String),

    /// Received bytes could not be decoded back into a message.
    #[error("failed to decode message: {0}")]
    Deserialization(String),

    /// The peer speaks an incompatible protocol revision.
    #[error("protocol version mismatch: expected v{expected}, peer offered v{actual}")]
    VersionMismatch {
        /// Version this side speaks.
        expected: u32,
        /// Version the peer offered.
        actual: u32,
    },

    /// A frame, or a declared payload length, exceeds the size limit.
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Offending size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// A message or frame violated the protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
