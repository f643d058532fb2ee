//! Protocol handshake types for connection negotiation.

use rkyv::{Archive, Deserialize, Serialize};

/// Client handshake message sent when establishing a connection.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Handshake {
    /// Protocol version the client supports.
    pub protocol_version: u32,
    /// Client identifier (for logging and debugging).
    pub client_id: String,
    /// Capabilities the client supports.
    pub capabilities: Vec<String>,
}

impl Handshake {
    /// Create a new handshake with the current protocol version.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            client_id: client_id.into(),
            capabilities: vec![],
        }
    }

    /// Create a handshake with a specific protocol version.
    pub fn with_version(protocol_version: u32, client_id: impl Into<String>) -> Self {
        Self {
            protocol_version,
            client_id: client_id.into(),
            capabilities: vec![],
        }
    }

    /// Add a capability to the handshake.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }
}

/// Server response to a client handshake.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// Whether the handshake was accepted.
    pub accepted: bool,
    /// Protocol version the server will use for this connection.
    pub protocol_version: u32,
    /// Current server logical time.
    pub op_time: u64,
    /// Server identifier.
    pub server_id: String,
    /// Capabilities the server supports.
    pub capabilities: Vec<String>,
    /// Error message if handshake was rejected.
    pub error: Option<String>,
}

impl HandshakeResponse {
    /// Create a successful handshake response.
    pub fn accept(protocol_version: u32, op_time: u64, server_id: impl Into<String>) -> Self {
        Self {
            accepted: true,
            protocol_version,
            op_time,
            server_id: server_id.into(),
            capabilities: vec![],
            error: None,
        }
    }

    /// Create a rejected handshake response.
    pub fn reject(error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            protocol_version: 0,
            op_time: 0,
            server_id: String::new(),
            capabilities: vec![],
            error: Some(error.into()),
        }
    }

    /// Add a capability to the response.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }
}

/// Standard capability identifiers.
pub mod capabilities {
    /// Multi-operation atomic transactions.
    pub const TRANSACTIONS: &str = "transactions";
    /// Snapshot-pinned read sessions.
    pub const SNAPSHOT_READS: &str = "snapshot-reads";
    /// Duplicate-suppressed retryable writes.
    pub const RETRYABLE_WRITES: &str = "retryable-writes";
    /// Server-side cursors for paged results.
    pub const CURSORS: &str = "cursors";
}

/// Check if a protocol version is compatible with the current version.
pub fn is_version_compatible(client_version: u32, server_version: u32) -> bool {
    // Exact match for now; version ranges can come later.
    client_version == server_version
}
