//! DocDB client façade.
//!
//! The [`Client`] is the single entry point an application uses: it owns
//! the connection pool (through the executor), hands out sessions, and
//! owns lifecycle from connect to scoped shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use docdb_proto::{
    AggregateQuery, Command, Document, DocumentBatch, Field, Filter, FindQuery, WriteResult,
};

use crate::config::{ClientConfig, Consistency, RetryPolicy, SessionConfig};
use crate::error::Error;
use crate::executor::{expect_ack, expect_count, expect_documents, expect_write, Executor};
use crate::pool::{ConnectionPool, PoolConfig};
use crate::session::{Session, SessionShared};

/// Options for constructing a client.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Connection pool configuration (embeds the connection config).
    pub pool: PoolConfig,
    /// Retry policy for transport failures.
    pub retry: RetryPolicy,
    /// Causal-consistency level for sessions.
    pub consistency: Consistency,
    /// Defaults applied to new sessions.
    pub session: SessionConfig,
}

impl ClientOptions {
    /// Options for connecting to the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            pool: PoolConfig::new(address),
            ..Default::default()
        }
    }

    /// Set the pool configuration.
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the consistency level.
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Set the session defaults.
    pub fn with_session_config(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

/// A DocDB client.
///
/// # Example
///
/// ```ignore
/// use docdb_client::{Client, ClientOptions};
/// use docdb_proto::{Document, FindQuery};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::connect(ClientOptions::new("tcp://127.0.0.1:27777")).await?;
///
///     client.insert_one("users", Document::new().set("name", "Alice")).await?;
///     let users = client.find(FindQuery::new("users")).await?;
///     println!("found {} users", users.len());
///
///     client.close().await;
///     Ok(())
/// }
/// ```
pub struct Client {
    executor: Arc<Executor>,
    sessions: Mutex<Vec<Weak<SessionShared>>>,
    consistency: Consistency,
    session_config: SessionConfig,
    closed: AtomicBool,
}

impl Client {
    /// Connect to a DocDB server.
    pub async fn connect(options: ClientOptions) -> Result<Self, Error> {
        let pool = ConnectionPool::new(options.pool).await?;
        let executor = Arc::new(Executor::new(pool, options.retry));

        Ok(Self {
            executor,
            sessions: Mutex::new(Vec::new()),
            consistency: options.consistency,
            session_config: options.session,
            closed: AtomicBool::new(false),
        })
    }

    /// Connect to a server at the given address with default options.
    pub async fn connect_to(address: impl Into<String>) -> Result<Self, Error> {
        Self::connect(ClientOptions::new(address)).await
    }

    /// Connect to localhost on the default port.
    pub async fn connect_localhost() -> Result<Self, Error> {
        Self::connect(ClientOptions::new(ClientConfig::localhost().address)).await
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Create a new session with the client's session defaults.
    pub fn session(&self) -> Result<Session, Error> {
        self.session_with(self.session_config.clone())
    }

    /// Create a new session with explicit configuration.
    pub fn session_with(&self, config: SessionConfig) -> Result<Session, Error> {
        self.ensure_open()?;
        let session = Session::new(self.executor.clone(), config, self.consistency);
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|weak| weak.strong_count() > 0);
        sessions.push(Arc::downgrade(session.shared()));
        Ok(session)
    }

    /// Number of outstanding non-terminal sessions.
    pub fn open_sessions(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|weak| weak.strong_count() > 0);
        sessions
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|shared| !shared.state().is_terminal())
            .count()
    }

    /// Insert a single document.
    pub async fn insert_one(
        &self,
        collection: impl Into<String>,
        document: Document,
    ) -> Result<WriteResult, Error> {
        self.ensure_open()?;
        let response = self
            .executor
            .execute(None, Command::insert_one(collection, document))
            .await?;
        expect_write(response)
    }

    /// Insert documents. With `ordered = false` the server keeps inserting
    /// past per-document errors and reports them in the result.
    pub async fn insert(
        &self,
        collection: impl Into<String>,
        documents: Vec<Document>,
        ordered: bool,
    ) -> Result<WriteResult, Error> {
        self.ensure_open()?;
        let response = self
            .executor
            .execute(None, Command::insert(collection, documents, ordered))
            .await?;
        expect_write(response)
    }

    /// Find documents.
    pub async fn find(&self, query: FindQuery) -> Result<DocumentBatch, Error> {
        self.ensure_open()?;
        let response = self.executor.execute(None, Command::Find(query)).await?;
        expect_documents(response)
    }

    /// Continue reading from a cursor returned by a prior find/aggregate.
    pub async fn get_more(&self, cursor_id: u64, batch_size: u32) -> Result<DocumentBatch, Error> {
        self.ensure_open()?;
        let response = self
            .executor
            .execute(
                None,
                Command::GetMore {
                    cursor_id,
                    batch_size,
                },
            )
            .await?;
        expect_documents(response)
    }

    /// Update documents matching a filter.
    pub async fn update(
        &self,
        collection: impl Into<String>,
        filter: Filter,
        set: Vec<Field>,
        multi: bool,
    ) -> Result<WriteResult, Error> {
        self.ensure_open()?;
        let response = self
            .executor
            .execute(
                None,
                Command::Update {
                    collection: collection.into(),
                    filter,
                    set,
                    multi,
                },
            )
            .await?;
        expect_write(response)
    }

    /// Delete documents matching a filter.
    pub async fn delete(
        &self,
        collection: impl Into<String>,
        filter: Filter,
        multi: bool,
    ) -> Result<WriteResult, Error> {
        self.ensure_open()?;
        let response = self
            .executor
            .execute(
                None,
                Command::Delete {
                    collection: collection.into(),
                    filter,
                    multi,
                },
            )
            .await?;
        expect_write(response)
    }

    /// Count documents matching a filter.
    pub async fn count(
        &self,
        collection: impl Into<String>,
        filter: Filter,
    ) -> Result<u64, Error> {
        self.ensure_open()?;
        let response = self
            .executor
            .execute(None, Command::count(collection, filter))
            .await?;
        expect_count(response)
    }

    /// Run an aggregation pipeline.
    pub async fn aggregate(&self, query: AggregateQuery) -> Result<DocumentBatch, Error> {
        self.ensure_open()?;
        let response = self
            .executor
            .execute(None, Command::Aggregate(query))
            .await?;
        expect_documents(response)
    }

    /// Drop a collection and all its documents.
    pub async fn drop_collection(&self, collection: impl Into<String>) -> Result<(), Error> {
        self.ensure_open()?;
        let response = self
            .executor
            .execute(None, Command::drop(collection))
            .await?;
        expect_ack(response)
    }

    /// Ping the server to check connectivity.
    pub async fn ping(&self) -> Result<(), Error> {
        self.ensure_open()?;
        let response = self.executor.execute(None, Command::Ping).await?;
        expect_ack(response)
    }

    /// Scoped shutdown: abort all open sessions, then drain and close the
    /// pool. Completes even if individual aborts fail; errors are logged,
    /// never propagated mid-shutdown.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let outstanding: Vec<Arc<SessionShared>> = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions.drain(..).filter_map(|weak| weak.upgrade()).collect()
        };

        for shared in outstanding {
            if shared.mark_aborted() {
                if let Some(txn_number) = shared.take_open_txn() {
                    shared.abort_on_server(txn_number).await;
                }
                shared.end_on_server().await;
            }
        }

        self.executor.pool().close().await;
        tracing::debug!("client shut down");
    }

    /// Whether the client has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Current number of live pooled connections (idle or borrowed).
    pub fn live_connections(&self) -> usize {
        self.executor.pool().live_connections()
    }

    /// Current number of idle pooled connections.
    pub async fn idle_connections(&self) -> usize {
        self.executor.pool().idle_connections().await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("closed", &self.is_closed())
            .field("open_sessions", &self.open_sessions())
            .finish()
    }
}
