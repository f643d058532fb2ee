//! Connection pooling for the DocDB client.
//!
//! The pool owns a bounded set of connections. Callers borrow exclusively
//! via [`ConnectionPool::acquire`] and return by dropping the guard; pool
//! membership is only ever mutated here, under the pool's own locks.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;

use docdb_proto::{Request, Response};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::Error;

/// Configuration for the connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Minimum number of idle connections maintained opportunistically.
    pub min_connections: usize,
    /// Maximum number of live connections allowed.
    pub max_connections: usize,
    /// Timeout for acquiring a connection from the pool.
    pub acquire_timeout: Duration,
    /// Idle timeout after which unused connections are closed.
    pub idle_timeout: Duration,
    /// How often the background maintenance task runs.
    pub maintenance_interval: Duration,
    /// Client configuration for creating new connections.
    pub client_config: ClientConfig,
}

impl PoolConfig {
    /// Create a new pool configuration.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
            maintenance_interval: Duration::from_secs(30),
            client_config: ClientConfig::new(address),
        }
    }

    /// Set the minimum idle connections.
    pub fn with_min_connections(mut self, min: usize) -> Self {
        self.min_connections = min;
        self
    }

    /// Set the maximum connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max.max(1);
        self
    }

    /// Set the acquire timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the maintenance interval.
    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    /// Set the client configuration.
    pub fn with_client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = config;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_ADDRESS)
    }
}

/// A pooled connection that returns itself to the pool when dropped.
///
/// If the guard is dropped while an exchange is in flight (cancellation),
/// the connection's protocol state is indeterminate and it is discarded
/// instead of being returned.
#[derive(Debug)]
pub struct PooledConnection {
    connection: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    /// Send a request using this connection.
    pub async fn request(&self, request: &Request) -> Result<Response, Error> {
        match &self.connection {
            Some(conn) => conn.request(request).await,
            None => Err(Error::Transport("connection is not available".to_string())),
        }
    }

    /// Check if this connection is still valid.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.is_connected())
            .unwrap_or(false)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            let pool = self.pool.clone();
            tokio::spawn(async move {
                pool.release(conn).await;
            });
        }
    }
}

/// Internal pool state.
#[derive(Debug)]
struct PoolInner {
    config: PoolConfig,
    idle: Mutex<Vec<Connection>>,
    semaphore: Semaphore,
    /// Connections currently alive, idle or borrowed.
    live: AtomicUsize,
    next_request_id: AtomicU64,
    closed: AtomicBool,
}

impl PoolInner {
    fn new(config: PoolConfig) -> Self {
        let semaphore = Semaphore::new(config.max_connections);
        Self {
            config,
            idle: Mutex::new(Vec::new()),
            semaphore,
            live: AtomicUsize::new(0),
            next_request_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Take an idle connection or build a fresh one. Callers must hold a
    /// semaphore permit.
    async fn checkout(&self) -> Result<Connection, Error> {
        {
            let mut idle = self.idle.lock().await;
            while let Some(conn) = idle.pop() {
                if conn.is_connected() {
                    return Ok(conn);
                }
                // Connection died while idle, discard it
                tracing::debug!("discarding dead idle connection");
                self.live.fetch_sub(1, Ordering::SeqCst);
            }
        }

        self.establish().await
    }

    /// Dial and handshake a new connection, counting it as live.
    async fn establish(&self) -> Result<Connection, Error> {
        let mut conn = Connection::establish(self.config.client_config.clone()).await?;
        conn.handshake().await?;
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(conn)
    }

    /// Return a borrowed connection, validating health first. Broken or
    /// poisoned connections are discarded rather than returned.
    async fn release(&self, mut conn: Connection) {
        if self.closed.load(Ordering::SeqCst) || !conn.is_connected() || conn.is_poisoned() {
            if conn.is_poisoned() {
                tracing::debug!("discarding connection abandoned mid-exchange");
            }
            self.discard(conn);
        } else {
            conn.touch();
            let mut idle = self.idle.lock().await;
            if idle.len() < self.config.max_connections {
                idle.push(conn);
            } else {
                drop(idle);
                self.discard(conn);
            }
        }
        self.semaphore.add_permits(1);
    }

    fn discard(&self, mut conn: Connection) {
        conn.close();
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// One pass of background maintenance: reap idle-expired connections,
    /// health-probe the remainder, and refill toward the minimum.
    ///
    /// Every connection taken out of the idle list, and every new one
    /// built for the refill, stays reserved under a semaphore permit
    /// until it is back in the list. Concurrent acquirers see the pool
    /// at reduced capacity while probes are in flight, but can never
    /// push it past the maximum.
    async fn maintain(&self) {
        let mut kept = Vec::new();
        let mut reserved = Vec::new();

        loop {
            let Ok(permit) = self.semaphore.try_acquire() else {
                break;
            };
            let conn = self.idle.lock().await.pop();
            let Some(mut conn) = conn else {
                break;
            };
            reserved.push(permit);

            if conn.idle_for() > self.config.idle_timeout {
                tracing::debug!("closing idle-expired connection");
                self.discard(conn);
                continue;
            }
            let ping = Request::ping(self.next_request_id());
            match conn.request(&ping).await {
                Ok(_) => {
                    conn.touch();
                    kept.push(conn);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "health probe failed, replacing connection");
                    self.discard(conn);
                }
            }
        }

        // Refill toward the minimum, each new connection under its own
        // reserved permit.
        while kept.len() < self.config.min_connections {
            let Ok(permit) = self.semaphore.try_acquire() else {
                break;
            };
            match self.establish().await {
                Ok(conn) => {
                    reserved.push(permit);
                    kept.push(conn);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to replenish pool");
                    break;
                }
            }
        }

        // Return connections before releasing the permits, so a woken
        // acquirer finds them in the idle list.
        let mut idle = self.idle.lock().await;
        idle.extend(kept);
        drop(idle);
        drop(reserved);
    }
}

/// A bounded pool of connections to a DocDB server.
///
/// # Example
///
/// ```ignore
/// use docdb_client::{ConnectionPool, PoolConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = ConnectionPool::new(PoolConfig::default()).await?;
///
///     let conn = pool.acquire().await?;
///     // use conn, then drop it to return it
///
///     pool.close().await;
///     Ok(())
/// }
/// ```
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
    maintenance: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionPool {
    /// Create a new connection pool, eagerly establishing the minimum
    /// number of connections.
    pub async fn new(config: PoolConfig) -> Result<Self, Error> {
        let inner = Arc::new(PoolInner::new(config.clone()));

        let mut initial = Vec::new();
        for _ in 0..config.min_connections {
            initial.push(inner.establish().await?);
        }
        {
            let mut idle = inner.idle.lock().await;
            idle.extend(initial);
        }

        let maintenance_inner = inner.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(maintenance_inner.config.maintenance_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                if maintenance_inner.closed.load(Ordering::SeqCst) {
                    break;
                }
                maintenance_inner.maintain().await;
            }
        });

        Ok(Self {
            inner,
            maintenance: std::sync::Mutex::new(Some(handle)),
        })
    }

    /// Acquire a connection from the pool.
    ///
    /// Suspends the caller until a connection is available, up to the
    /// configured acquire timeout, then fails with
    /// [`Error::PoolExhausted`] rather than blocking indefinitely.
    pub async fn acquire(&self) -> Result<PooledConnection, Error> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }

        let started = Instant::now();
        let permit = match tokio::time::timeout(
            self.inner.config.acquire_timeout,
            self.inner.semaphore.acquire(),
        )
        .await
        {
            Err(_) => {
                return Err(Error::PoolExhausted {
                    waited: started.elapsed(),
                })
            }
            Ok(Err(_)) => return Err(Error::Closed),
            Ok(Ok(permit)) => permit,
        };

        // The permit travels with the connection; release() adds it back.
        permit.forget();

        match self.inner.checkout().await {
            Ok(conn) => Ok(PooledConnection {
                connection: Some(conn),
                pool: self.inner.clone(),
            }),
            Err(err) => {
                self.inner.semaphore.add_permits(1);
                Err(err)
            }
        }
    }

    /// Get the next request ID for correlation.
    pub fn next_request_id(&self) -> u64 {
        self.inner.next_request_id()
    }

    /// Close the pool: stop maintenance, fail pending and future acquires,
    /// and drain all idle connections.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.semaphore.close();

        let handle = self.maintenance.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            handle.abort();
        }

        let mut idle = self.inner.idle.lock().await;
        for mut conn in idle.drain(..) {
            conn.close();
            self.inner.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Current number of idle connections.
    pub async fn idle_connections(&self) -> usize {
        self.inner.idle.lock().await.len()
    }

    /// Current number of live connections, idle or borrowed.
    pub fn live_connections(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// The configured maximum pool size.
    pub fn max_connections(&self) -> usize {
        self.inner.config.max_connections
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("max_connections", &self.inner.config.max_connections)
            .field("live_connections", &self.live_connections())
            .field("closed", &self.is_closed())
            .finish()
    }
}
