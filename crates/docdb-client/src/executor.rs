//! Operation execution and retry.
//!
//! The executor turns a command into a wire request, dispatches it over a
//! pooled connection, and classifies failures. Transport failures are
//! retried up to the configured budget, but only for operations that are
//! safe to repeat: idempotent reads, writes carrying a retryable-write
//! token, or requests the caller explicitly marked idempotent. Server
//! errors are never retried blindly.

use docdb_proto::{
    Command, DocumentBatch, Request, Response, ResponsePayload, SessionToken, Status, WriteResult,
};

use crate::config::RetryPolicy;
use crate::error::Error;
use crate::pool::ConnectionPool;

/// Caller-supplied execution options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Treat the operation as idempotent even if its command class is not.
    /// The caller takes responsibility for duplicate application.
    pub idempotent: bool,
}

impl ExecuteOptions {
    /// Mark the operation idempotent.
    pub fn idempotent() -> Self {
        Self { idempotent: true }
    }
}

/// Decide whether a failed attempt may be repeated.
fn is_retryable(command: &Command, session: Option<&SessionToken>, options: ExecuteOptions) -> bool {
    if command.is_idempotent() || options.idempotent {
        return true;
    }
    // A write carrying a retryable-write token can be repeated: the server
    // suppresses duplicate execution of the (session, write_number) pair.
    session.map(|t| t.write_number.is_some()).unwrap_or(false)
}

/// Executes operations against the pool with bounded retry.
pub struct Executor {
    pool: ConnectionPool,
    retry: RetryPolicy,
}

impl Executor {
    /// Create an executor over a pool.
    pub fn new(pool: ConnectionPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Execute a command, optionally inside a session.
    pub async fn execute(
        &self,
        session: Option<SessionToken>,
        command: Command,
    ) -> Result<Response, Error> {
        self.execute_with(session, command, ExecuteOptions::default())
            .await
    }

    /// Execute a command with explicit options.
    pub async fn execute_with(
        &self,
        session: Option<SessionToken>,
        command: Command,
        options: ExecuteOptions,
    ) -> Result<Response, Error> {
        let retryable = is_retryable(&command, session.as_ref(), options);
        let mut attempt: u32 = 1;

        loop {
            let id = self.pool.next_request_id();
            let request = match &session {
                Some(token) => Request::in_session(id, token.clone(), command.clone()),
                None => Request::new(id, command.clone()),
            };

            match self.dispatch(&request).await {
                Ok(response) => return Ok(response),
                Err(err)
                    if err.is_transport() && retryable && attempt < self.retry.max_attempts =>
                {
                    tracing::warn!(attempt, error = %err, "retrying after transport error");
                    tokio::time::sleep(self.retry.backoff_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One attempt: acquire, send, fold the status into the result.
    async fn dispatch(&self, request: &Request) -> Result<Response, Error> {
        let conn = self.pool.acquire().await?;
        let response = conn.request(request).await?;
        match &response.status {
            Status::Ok => Ok(response),
            Status::Error { code, message } => Err(Error::Server {
                code: *code,
                message: message.clone(),
            }),
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("pool", &self.pool)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Extract a document batch from a response.
pub(crate) fn expect_documents(response: Response) -> Result<DocumentBatch, Error> {
    match response.payload {
        ResponsePayload::Documents(batch) => Ok(batch),
        _ => Err(Error::Protocol(docdb_proto::Error::InvalidMessage(
            "expected documents payload".to_string(),
        ))),
    }
}

/// Extract a write result from a response.
pub(crate) fn expect_write(response: Response) -> Result<WriteResult, Error> {
    match response.payload {
        ResponsePayload::Write(result) => Ok(result),
        _ => Err(Error::Protocol(docdb_proto::Error::InvalidMessage(
            "expected write payload".to_string(),
        ))),
    }
}

/// Extract a count from a response.
pub(crate) fn expect_count(response: Response) -> Result<u64, Error> {
    match response.payload {
        ResponsePayload::Count(count) => Ok(count),
        _ => Err(Error::Protocol(docdb_proto::Error::InvalidMessage(
            "expected count payload".to_string(),
        ))),
    }
}

/// Accept an empty acknowledgement or pong.
pub(crate) fn expect_ack(response: Response) -> Result<(), Error> {
    match response.payload {
        ResponsePayload::Empty | ResponsePayload::Pong => Ok(()),
        _ => Err(Error::Protocol(docdb_proto::Error::InvalidMessage(
            "expected empty payload".to_string(),
        ))),
    }
}
