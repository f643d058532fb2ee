//! Connection management for the DocDB client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_nng::AsyncContext;
use nng::options::Options;
use nng::{Message, Protocol, Socket};

use docdb_proto::framing::{encode_frame, extract_payload};
use docdb_proto::message::ArchivedServerMessage;
use docdb_proto::{ClientMessage, Handshake, Request, Response, ServerMessage};

use crate::config::ClientConfig;
use crate::error::Error;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection not yet established.
    Disconnected,
    /// Socket connected, handshake not performed.
    Connected,
    /// Handshake completed successfully.
    Ready,
    /// Connection closed.
    Closed,
}

/// A connection to a DocDB server: one live transport channel.
pub struct Connection {
    socket: Socket,
    state: ConnectionState,
    config: ClientConfig,
    server_id: String,
    server_capabilities: Vec<String>,
    last_used: Instant,
    /// Set while a request/reply exchange is in flight. A connection whose
    /// exchange was cancelled mid-flight has indeterminate protocol state
    /// and must be discarded, not reused.
    in_flight: AtomicBool,
}

impl Connection {
    /// Establish a new connection to the server.
    pub async fn establish(config: ClientConfig) -> Result<Self, Error> {
        let socket = Socket::new(Protocol::Req0)
            .map_err(|e| Error::Transport(format!("failed to create socket: {}", e)))?;

        socket
            .set_opt::<nng::options::RecvMaxSize>(config.max_message_size)
            .map_err(|e| Error::Transport(format!("failed to set max message size: {}", e)))?;
        socket
            .set_opt::<nng::options::SendTimeout>(Some(config.request_timeout))
            .map_err(|e| Error::Transport(format!("failed to set send timeout: {}", e)))?;
        socket
            .set_opt::<nng::options::RecvTimeout>(Some(config.request_timeout))
            .map_err(|e| Error::Transport(format!("failed to set recv timeout: {}", e)))?;

        socket.dial(&config.address).map_err(|e| {
            Error::Transport(format!("failed to connect to {}: {}", config.address, e))
        })?;

        Ok(Self {
            socket,
            state: ConnectionState::Connected,
            config,
            server_id: String::new(),
            server_capabilities: Vec::new(),
            last_used: Instant::now(),
            in_flight: AtomicBool::new(false),
        })
    }

    /// Create an async context for this connection.
    fn create_context(&self) -> Result<AsyncContext<'_>, Error> {
        AsyncContext::try_from(&self.socket)
            .map_err(|e| Error::Transport(format!("failed to create async context: {}", e)))
    }

    /// Serialize and exchange one envelope over the socket.
    async fn exchange(&self, message: &ClientMessage) -> Result<ServerMessage, Error> {
        let payload = rkyv::to_bytes::<rkyv::rancor::Error>(message).map_err(|e| {
            Error::Protocol(docdb_proto::Error::Serialization(format!(
                "failed to serialize message: {}",
                e
            )))
        })?;

        if payload.len() > self.config.max_message_size {
            return Err(Error::Protocol(docdb_proto::Error::FrameTooLarge {
                size: payload.len(),
                limit: self.config.max_message_size,
            }));
        }

        let framed = encode_frame(&payload)?;
        let mut ctx = self.create_context()?;

        // The poison flag stays set if this future is dropped between here
        // and the matching store(false) below.
        self.in_flight.store(true, Ordering::SeqCst);

        let msg = Message::from(framed.as_slice());
        ctx.send(msg, Some(self.config.request_timeout))
            .await
            .map_err(|(_, e)| match e {
                nng::Error::TimedOut => Error::Transport("request timed out (send)".to_string()),
                _ => Error::Transport(format!("failed to send request: {}", e)),
            })?;

        let response_msg = ctx
            .receive(Some(self.config.request_timeout))
            .await
            .map_err(|e| match e {
                nng::Error::TimedOut => Error::Transport("request timed out (recv)".to_string()),
                _ => Error::Transport(format!("failed to receive response: {}", e)),
            })?;

        self.in_flight.store(false, Ordering::SeqCst);

        let response_payload = extract_payload(response_msg.as_slice())?;
        let archived = rkyv::access::<ArchivedServerMessage, rkyv::rancor::Error>(response_payload)
            .map_err(|e| {
                Error::Protocol(docdb_proto::Error::InvalidMessage(format!(
                    "failed to access server message: {}",
                    e
                )))
            })?;

        rkyv::deserialize::<ServerMessage, rkyv::rancor::Error>(archived).map_err(|e| {
            Error::Protocol(docdb_proto::Error::Deserialization(format!(
                "failed to deserialize server message: {}",
                e
            )))
        })
    }

    /// Perform the protocol handshake with the server.
    pub async fn handshake(&mut self) -> Result<(), Error> {
        if self.state != ConnectionState::Connected {
            return Err(Error::Transport(format!(
                "cannot handshake in state {:?}",
                self.state
            )));
        }

        let handshake = Handshake::new(&self.config.client_id);
        let reply = self.exchange(&ClientMessage::Handshake(handshake)).await?;

        let response = match reply {
            ServerMessage::Handshake(response) => response,
            ServerMessage::Response(_) => {
                return Err(Error::Protocol(docdb_proto::Error::InvalidMessage(
                    "expected handshake response".to_string(),
                )));
            }
        };

        if !response.accepted {
            self.state = ConnectionState::Closed;
            return Err(Error::Transport(format!(
                "handshake rejected: {}",
                response.error.unwrap_or_else(|| "unknown reason".to_string())
            )));
        }

        if response.protocol_version != docdb_proto::PROTOCOL_VERSION {
            self.state = ConnectionState::Closed;
            return Err(Error::Protocol(docdb_proto::Error::VersionMismatch {
                expected: docdb_proto::PROTOCOL_VERSION,
                actual: response.protocol_version,
            }));
        }

        self.server_id = response.server_id;
        self.server_capabilities = response.capabilities;
        self.state = ConnectionState::Ready;
        self.last_used = Instant::now();

        Ok(())
    }

    /// Send a request and receive its correlated response.
    pub async fn request(&self, request: &Request) -> Result<Response, Error> {
        if self.state != ConnectionState::Ready {
            return Err(Error::Transport(format!(
                "cannot send request in state {:?}",
                self.state
            )));
        }

        let reply = self
            .exchange(&ClientMessage::Request(request.clone()))
            .await?;

        let response = match reply {
            ServerMessage::Response(response) => response,
            ServerMessage::Handshake(_) => {
                return Err(Error::Protocol(docdb_proto::Error::InvalidMessage(
                    "expected operation response".to_string(),
                )));
            }
        };

        if response.id != request.id {
            return Err(Error::Protocol(docdb_proto::Error::InvalidMessage(format!(
                "response ID mismatch: expected {}, got {}",
                request.id, response.id
            ))));
        }

        Ok(response)
    }

    /// Close the connection.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        // Socket is dropped automatically
    }

    /// Check if the connection is ready for requests.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Whether an exchange was abandoned mid-flight, leaving the protocol
    /// state indeterminate.
    pub fn is_poisoned(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get the server ID from the handshake.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Get the server capabilities.
    pub fn server_capabilities(&self) -> &[String] {
        &self.server_capabilities
    }

    /// Check if the server supports a capability.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.server_capabilities.iter().any(|c| c == capability)
    }

    /// Record that the connection was just used.
    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    /// How long the connection has sat unused.
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.config.address)
            .field("state", &self.state)
            .field("client_id", &self.config.client_id)
            .field("server_id", &self.server_id)
            .field("poisoned", &self.is_poisoned())
            .finish()
    }
}
