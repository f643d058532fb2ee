//! Sessions and transactions.
//!
//! A session binds a sequence of operations to one logical unit of work
//! with causal-consistency guarantees. Sessions are single-caller by
//! contract: the API takes `&mut self` and `Session` is not `Clone`.
//!
//! State machine: `Created -> Active -> {Committed, Aborted, TimedOut}`.
//! The first operation activates the session; `commit` and `abort` are
//! terminal and idempotent once called.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use docdb_proto::{
    AggregateQuery, Command, Document, DocumentBatch, Field, Filter, FindQuery, Response,
    SessionId, SessionToken, TxnContext, WriteResult,
};

use crate::config::{Consistency, SessionConfig};
use crate::error::{Error, SessionError};
use crate::executor::{expect_count, expect_documents, expect_write, Executor};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no operation issued yet.
    Created,
    /// At least one operation has been issued.
    Active,
    /// Ended by a successful commit. Terminal.
    Committed,
    /// Ended by abort, failure, or drop. Terminal.
    Aborted,
    /// Ended by exceeding the session timeout. Terminal.
    TimedOut,
}

impl SessionState {
    /// Whether the session can accept no further operations.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Committed | SessionState::Aborted | SessionState::TimedOut
        )
    }
}

/// An open transaction within a session.
#[derive(Debug, Clone, Copy)]
struct TxnState {
    number: u64,
    /// Whether any operation has been sent under this transaction.
    started: bool,
}

/// State shared between a `Session` and the client façade, so shutdown
/// can abort sessions it no longer has exclusive access to.
pub(crate) struct SessionShared {
    id: SessionId,
    executor: Arc<Executor>,
    state: Mutex<SessionState>,
    open_txn: Mutex<Option<TxnState>>,
}

impl SessionShared {
    pub(crate) fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn take_txn(&self) -> Option<TxnState> {
        self.open_txn.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Move a non-terminal session to Aborted. Returns false when the
    /// session was already terminal.
    pub(crate) fn mark_aborted(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.is_terminal() {
            return false;
        }
        *state = SessionState::Aborted;
        true
    }

    /// Take the number of a started transaction, if one is open.
    pub(crate) fn take_open_txn(&self) -> Option<u64> {
        self.take_txn().filter(|t| t.started).map(|t| t.number)
    }

    /// Spawn best-effort server-side cleanup: abort a started transaction
    /// and end the session. For callers with no async context to await
    /// the cleanup in (drop, the timeout transition).
    pub(crate) fn finish_in_background(self: &Arc<Self>) {
        let txn_number = self.take_open_txn();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let shared = self.clone();
        handle.spawn(async move {
            if let Some(txn_number) = txn_number {
                shared.abort_on_server(txn_number).await;
            }
            shared.end_on_server().await;
        });
    }

    /// Best-effort server-side abort of a transaction.
    pub(crate) async fn abort_on_server(&self, txn_number: u64) {
        let token = SessionToken::new(self.id).with_txn(TxnContext::continued(txn_number));
        if let Err(err) = self.executor.execute(Some(token), Command::AbortTransaction).await {
            tracing::debug!(error = %err, "best-effort transaction abort failed");
        }
    }

    /// Best-effort server-side session end.
    pub(crate) async fn end_on_server(&self) {
        let token = SessionToken::new(self.id);
        if let Err(err) = self.executor.execute(Some(token), Command::EndSession).await {
            tracing::debug!(error = %err, "best-effort session end failed");
        }
    }
}

/// A causally-consistent session over a DocDB client.
///
/// Not `Clone` and not shareable: a session is used by one caller at a
/// time. Dropping an open session aborts it.
pub struct Session {
    shared: Arc<SessionShared>,
    config: SessionConfig,
    consistency: Consistency,
    deadline: Instant,
    /// Highest server logical time this session has observed.
    op_time: Option<u64>,
    /// Pinned snapshot time, set by the first read in a snapshot session.
    snapshot_time: Option<u64>,
    last_txn_number: u64,
    next_write_number: u64,
}

impl Session {
    pub(crate) fn new(
        executor: Arc<Executor>,
        config: SessionConfig,
        consistency: Consistency,
    ) -> Self {
        let shared = Arc::new(SessionShared {
            id: generate_session_id(),
            executor,
            state: Mutex::new(SessionState::Created),
            open_txn: Mutex::new(None),
        });
        let deadline = Instant::now() + config.timeout;
        Self {
            shared,
            config,
            consistency,
            deadline,
            op_time: None,
            snapshot_time: None,
            last_txn_number: 0,
            next_write_number: 0,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    /// The session identifier.
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// The highest server logical time this session has observed.
    pub fn op_time(&self) -> Option<u64> {
        self.op_time
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.shared
            .open_txn
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Reject operations on terminal or expired sessions; otherwise
    /// activate.
    fn usable(&mut self) -> Result<(), Error> {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            SessionState::Committed => Err(SessionError::Committed.into()),
            SessionState::Aborted => Err(SessionError::Aborted.into()),
            SessionState::TimedOut => Err(SessionError::TimedOut.into()),
            SessionState::Created | SessionState::Active => {
                if Instant::now() >= self.deadline {
                    *state = SessionState::TimedOut;
                    drop(state);
                    // The server still holds session state (and possibly a
                    // staged transaction); release it.
                    self.shared.finish_in_background();
                    Err(SessionError::TimedOut.into())
                } else {
                    *state = SessionState::Active;
                    Ok(())
                }
            }
        }
    }

    /// Build the token for the next operation. Token passing is explicit:
    /// every request carries the session's causal state on the wire.
    fn token(&mut self, is_write: bool) -> SessionToken {
        let mut token = SessionToken::new(self.shared.id);

        if self.consistency == Consistency::Causal {
            if let Some(op_time) = self.op_time {
                token = token.with_after_op_time(op_time);
            }
        }
        if self.config.snapshot {
            if let Some(snapshot) = self.snapshot_time {
                token = token.with_snapshot_time(snapshot);
            }
        }

        let mut txn = self.shared.open_txn.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(txn) = txn.as_mut() {
            let context = if txn.started {
                TxnContext::continued(txn.number)
            } else {
                txn.started = true;
                TxnContext::start(txn.number)
            };
            token = token.with_txn(context);
        } else if is_write && self.config.retryable_writes {
            self.next_write_number += 1;
            token = token.with_write_number(self.next_write_number);
        }

        token
    }

    /// Fold a response's logical time into the session.
    fn observe(&mut self, response: &Response, is_read: bool) {
        self.op_time = Some(
            self.op_time
                .map_or(response.op_time, |t| t.max(response.op_time)),
        );
        if is_read && self.config.snapshot && self.snapshot_time.is_none() {
            self.snapshot_time = Some(response.op_time);
        }
    }

    /// Issue one operation through the session.
    async fn run(&mut self, command: Command, is_write: bool) -> Result<Response, Error> {
        self.usable()?;
        let token = self.token(is_write);
        let in_txn = token.in_transaction();

        match self.shared.executor.execute(Some(token), command).await {
            Ok(response) => {
                self.observe(&response, !is_write);
                Ok(response)
            }
            Err(err) => {
                // Unrecoverable failure inside a transaction aborts the
                // session automatically. Pool exhaustion is recoverable by
                // the caller and leaves the session untouched.
                if in_txn && !matches!(err, Error::PoolExhausted { .. }) {
                    if self.shared.mark_aborted() {
                        if let Some(txn_number) = self.shared.take_open_txn() {
                            self.shared.abort_on_server(txn_number).await;
                        }
                        self.shared.end_on_server().await;
                    }
                }
                Err(err)
            }
        }
    }

    /// Insert a single document.
    pub async fn insert_one(
        &mut self,
        collection: impl Into<String>,
        document: Document,
    ) -> Result<WriteResult, Error> {
        let response = self.run(Command::insert_one(collection, document), true).await?;
        expect_write(response)
    }

    /// Insert documents. With `ordered = false` the server keeps inserting
    /// past per-document errors and reports them in the result.
    pub async fn insert(
        &mut self,
        collection: impl Into<String>,
        documents: Vec<Document>,
        ordered: bool,
    ) -> Result<WriteResult, Error> {
        let response = self
            .run(Command::insert(collection, documents, ordered), true)
            .await?;
        expect_write(response)
    }

    /// Find documents.
    pub async fn find(&mut self, query: FindQuery) -> Result<DocumentBatch, Error> {
        let response = self.run(Command::Find(query), false).await?;
        expect_documents(response)
    }

    /// Continue reading from a cursor.
    pub async fn get_more(
        &mut self,
        cursor_id: u64,
        batch_size: u32,
    ) -> Result<DocumentBatch, Error> {
        let response = self
            .run(
                Command::GetMore {
                    cursor_id,
                    batch_size,
                },
                false,
            )
            .await?;
        expect_documents(response)
    }

    /// Update documents matching a filter.
    pub async fn update(
        &mut self,
        collection: impl Into<String>,
        filter: Filter,
        set: Vec<Field>,
        multi: bool,
    ) -> Result<WriteResult, Error> {
        let response = self
            .run(
                Command::Update {
                    collection: collection.into(),
                    filter,
                    set,
                    multi,
                },
                true,
            )
            .await?;
        expect_write(response)
    }

    /// Delete documents matching a filter.
    pub async fn delete(
        &mut self,
        collection: impl Into<String>,
        filter: Filter,
        multi: bool,
    ) -> Result<WriteResult, Error> {
        let response = self
            .run(
                Command::Delete {
                    collection: collection.into(),
                    filter,
                    multi,
                },
                true,
            )
            .await?;
        expect_write(response)
    }

    /// Count documents matching a filter.
    pub async fn count(
        &mut self,
        collection: impl Into<String>,
        filter: Filter,
    ) -> Result<u64, Error> {
        let response = self.run(Command::count(collection, filter), false).await?;
        expect_count(response)
    }

    /// Run an aggregation pipeline.
    pub async fn aggregate(&mut self, query: AggregateQuery) -> Result<DocumentBatch, Error> {
        let response = self.run(Command::Aggregate(query), false).await?;
        expect_documents(response)
    }

    /// Start a transaction. All subsequent operations are tagged with its
    /// number and applied atomically at commit.
    pub fn start_transaction(&mut self) -> Result<(), Error> {
        self.usable()?;
        let mut txn = self.shared.open_txn.lock().unwrap_or_else(|e| e.into_inner());
        if txn.is_some() {
            return Err(SessionError::TransactionOpen.into());
        }
        self.last_txn_number += 1;
        *txn = Some(TxnState {
            number: self.last_txn_number,
            started: false,
        });
        Ok(())
    }

    /// Commit the open transaction (if any) and end the session.
    /// Idempotent once committed.
    pub async fn commit(&mut self) -> Result<(), Error> {
        match self.state() {
            SessionState::Committed => return Ok(()),
            SessionState::Aborted => return Err(SessionError::Aborted.into()),
            SessionState::TimedOut => return Err(SessionError::TimedOut.into()),
            SessionState::Created | SessionState::Active => {}
        }
        self.usable()?;

        let txn = self.shared.take_txn();
        if let Some(txn) = txn.filter(|t| t.started) {
            let mut token = SessionToken::new(self.shared.id)
                .with_txn(TxnContext::continued(txn.number));
            if self.consistency == Consistency::Causal {
                if let Some(op_time) = self.op_time {
                    token = token.with_after_op_time(op_time);
                }
            }
            match self
                .shared
                .executor
                .execute(Some(token), Command::CommitTransaction)
                .await
            {
                Ok(response) => self.observe(&response, false),
                Err(err) => {
                    self.shared.set_state(SessionState::Aborted);
                    return Err(err);
                }
            }
        }

        self.shared.set_state(SessionState::Committed);
        self.shared.end_on_server().await;
        Ok(())
    }

    /// Abort the open transaction (if any) and end the session.
    /// Idempotent once aborted.
    pub async fn abort(&mut self) -> Result<(), Error> {
        match self.state() {
            SessionState::Aborted => return Ok(()),
            SessionState::Committed => return Err(SessionError::Committed.into()),
            SessionState::TimedOut => return Err(SessionError::TimedOut.into()),
            SessionState::Created | SessionState::Active => {}
        }

        self.shared.set_state(SessionState::Aborted);
        if let Some(txn) = self.shared.take_txn().filter(|t| t.started) {
            self.shared.abort_on_server(txn.number).await;
        }
        self.shared.end_on_server().await;
        Ok(())
    }

    /// Run a transaction body, committing on success and aborting on
    /// error. The body receives the session itself:
    ///
    /// ```ignore
    /// session
    ///     .run_transaction(|s| {
    ///         Box::pin(async move {
    ///             s.insert_one("accounts", doc).await?;
    ///             Ok(())
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn run_transaction<T, F>(&mut self, mut body: F) -> Result<T, Error>
    where
        F: for<'a> FnMut(
            &'a mut Session,
        ) -> Pin<Box<dyn Future<Output = Result<T, Error>> + 'a>>,
    {
        self.start_transaction()?;
        match body(self).await {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                // Already a no-op if the failed operation auto-aborted.
                let _ = self.abort().await;
                Err(err)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.shared.mark_aborted() {
            self.shared.finish_in_background();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("op_time", &self.op_time)
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

/// Generate a unique session identifier.
fn generate_session_id() -> SessionId {
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut id = [0u8; 16];
    id[..8].copy_from_slice(&nanos.to_be_bytes());
    id[8..].copy_from_slice(&count.to_be_bytes());
    id
}
