//! # DocDB Client
//!
//! Async client for DocDB servers: a bounded connection pool, an
//! operation executor with transport-level retry, and causally-consistent
//! sessions with transactions.
//!
//! ## Quick Start
//!
//! ```ignore
//! use docdb_client::{Client, ClientOptions};
//! use docdb_proto::{Document, Filter, FindQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect(ClientOptions::new("tcp://127.0.0.1:27777")).await?;
//!
//!     // Sessionless operations go straight through the pool.
//!     client.insert_one("users", Document::new().set("name", "Alice")).await?;
//!     let batch = client.find(FindQuery::new("users")).await?;
//!
//!     // Sessions add causal consistency and transactions.
//!     let mut session = client.session()?;
//!     session.start_transaction()?;
//!     session.insert_one("accounts", Document::new().set("balance", 100_i64)).await?;
//!     session.commit().await?;
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`client`] - client façade owning pool, executor, and sessions
//! - [`pool`] - bounded connection pool with background maintenance
//! - [`connection`] - single connection: dial, handshake, request/reply
//! - [`executor`] - command dispatch and bounded retry
//! - [`session`] - sessions, causal tokens, transactions
//! - [`config`] - client, pool, retry, and session configuration
//! - [`error`] - client error types

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod pool;
pub mod session;

pub use client::{Client, ClientOptions};
pub use config::{ClientConfig, Consistency, RetryPolicy, SessionConfig};
pub use connection::{Connection, ConnectionState};
pub use error::{Error, SessionError};
pub use executor::{ExecuteOptions, Executor};
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use session::{Session, SessionState};

pub use docdb_proto as proto;
