//! Client configuration.
//!
//! Each option is named, carries a documented default, and is supplied at
//! client construction.

use std::time::Duration;

/// Default TCP address for a DocDB server.
pub const DEFAULT_ADDRESS: &str = "tcp://127.0.0.1:27777";

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum message size (16 MB, matching the framing limit).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = docdb_proto::framing::MAX_MESSAGE_SIZE;

/// Default session timeout.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Connection-level configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (e.g. "tcp://127.0.0.1:27777" or "ipc:///tmp/docdb.sock").
    pub address: String,

    /// Per-request timeout on the wire.
    pub request_timeout: Duration,

    /// Maximum message size in bytes.
    pub max_message_size: usize,

    /// Client identifier for server-side tracking.
    pub client_id: String,
}

impl ClientConfig {
    /// Create a new configuration with the specified address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            client_id: generate_client_id(),
        }
    }

    /// Create a configuration for connecting to localhost on the default port.
    pub fn localhost() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the maximum message size.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the client identifier.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::localhost()
    }
}

/// Retry policy for operations that fail with transport errors.
///
/// Only idempotent operations (or writes carrying a retryable-write
/// token) are retried; server errors are never retried through this
/// policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per operation, including the first (default 3).
    pub max_attempts: u32,
    /// Base delay before a retry; doubles per attempt (default 100 ms).
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
        }
    }

    /// Set the total attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the base backoff delay.
    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// Delay before the given retry attempt (attempt 1 is the first retry).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
        }
    }
}

/// Causal-consistency level for sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Operations in a session observe that session's prior writes
    /// (the default).
    #[default]
    Causal,
    /// No ordering guarantee beyond what single operations provide.
    Eventual,
}

/// Per-session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum session lifetime, measured from creation. Once it
    /// elapses the session is terminal (default 30 minutes).
    pub timeout: Duration,
    /// Tag writes outside transactions with retryable-write tokens
    /// (default true).
    pub retryable_writes: bool,
    /// Pin all reads in the session to the snapshot established by the
    /// first read (default false).
    pub snapshot: bool,
}

impl SessionConfig {
    /// Set the session timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable retryable writes.
    pub fn with_retryable_writes(mut self, enabled: bool) -> Self {
        self.retryable_writes = enabled;
        self
    }

    /// Enable snapshot reads.
    pub fn with_snapshot(mut self, enabled: bool) -> Self {
        self.snapshot = enabled;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SESSION_TIMEOUT,
            retryable_writes: true,
            snapshot: false,
        }
    }
}

/// Generate a unique client identifier.
fn generate_client_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    format!("client-{:x}", timestamp)
}
