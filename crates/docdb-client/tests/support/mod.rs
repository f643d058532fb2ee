//! In-process test server.
//!
//! A minimal DocDB server on a blocking Rep0 socket over inproc transport,
//! just enough semantics for the client tests: inserts with duplicate `_id`
//! detection, filtered reads with snapshot visibility, staged transactions
//! applied at commit, retryable-write deduplication, cursors, and fault
//! injection (swallowed requests and swallowed replies).

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nng::options::{Options, RecvTimeout};
use nng::{Message, Protocol, Socket};
use parking_lot::Mutex;

use docdb_client::proto::framing::{encode_frame, extract_payload};
use docdb_client::proto::message::{error_codes, ArchivedClientMessage};
use docdb_client::proto::handshake::capabilities;
use docdb_client::proto::{
    ClientMessage, Command, Document, DocumentBatch, Filter, FindQuery, Handshake,
    HandshakeResponse, Request, Response, ServerMessage, SessionId, SessionToken, Value,
    WriteError, WriteResult, PROTOCOL_VERSION,
};
use docdb_client::proto::command::{
    Accumulator, AggregateFunction, AggregateQuery, AggregateStage, Condition, SortDirection,
    SortSpec,
};
use docdb_client::{Client, ClientConfig, ClientOptions, ConnectionPool, PoolConfig, RetryPolicy};

static ADDRESS_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A unique inproc address for one test.
pub fn unique_address() -> String {
    format!(
        "inproc://docdb-test-{}-{}",
        std::process::id(),
        ADDRESS_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Client options tuned for tests: short timeouts, fast retry backoff.
pub fn test_options(address: &str) -> ClientOptions {
    let client_config = ClientConfig::new(address).with_request_timeout(Duration::from_millis(500));
    ClientOptions::new(address)
        .with_pool(
            PoolConfig::new(address)
                .with_client_config(client_config)
                .with_acquire_timeout(Duration::from_millis(500)),
        )
        .with_retry(
            RetryPolicy::default()
                .with_max_attempts(3)
                .with_base_backoff(Duration::from_millis(10)),
        )
}

/// A standalone pool against the given server, with test timeouts.
pub async fn pool_for(server: &TestServer) -> ConnectionPool {
    let client_config =
        ClientConfig::new(server.address()).with_request_timeout(Duration::from_millis(500));
    ConnectionPool::new(
        PoolConfig::new(server.address())
            .with_client_config(client_config)
            .with_acquire_timeout(Duration::from_millis(500)),
    )
    .await
    .expect("build pool for test server")
}

/// Start a server and connect a client with test options.
pub async fn server_and_client() -> (TestServer, Client) {
    let server = TestServer::start();
    let client = Client::connect(test_options(server.address()))
        .await
        .expect("connect to test server");
    (server, client)
}

struct StoredDoc {
    /// Logical time the document became visible.
    stamp: u64,
    doc: Document,
}

#[derive(Default)]
struct ServerState {
    clock: AtomicU64,
    collections: Mutex<HashMap<String, Vec<StoredDoc>>>,
    /// Staged inserts per open transaction, applied atomically at commit.
    staged: Mutex<HashMap<(SessionId, u64), Vec<(String, Document)>>>,
    cursors: Mutex<HashMap<u64, Vec<Document>>>,
    next_cursor: AtomicU64,
    /// Completed retryable writes, keyed by (session, write number).
    applied_writes: Mutex<HashMap<(SessionId, u64), (u64, WriteResult)>>,
    /// Requests to swallow without processing (client sees a timeout).
    drop_requests: AtomicUsize,
    /// Requests to process but leave unanswered (client sees a timeout,
    /// but the write landed).
    drop_replies: AtomicUsize,
}

/// An in-process DocDB server for tests.
pub struct TestServer {
    address: String,
    state: Arc<ServerState>,
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl TestServer {
    /// Start a server on a fresh inproc address.
    pub fn start() -> Self {
        let address = unique_address();
        let state = Arc::new(ServerState::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let socket = Socket::new(Protocol::Rep0).expect("create rep socket");
        socket
            .set_opt::<RecvTimeout>(Some(Duration::from_millis(50)))
            .expect("set recv timeout");
        // Listen before returning so clients can dial immediately.
        socket.listen(&address).expect("listen on inproc address");

        let loop_state = state.clone();
        let loop_shutdown = shutdown.clone();
        let handle = std::thread::spawn(move || {
            serve(socket, loop_state, loop_shutdown);
        });

        Self {
            address,
            state,
            shutdown,
            handle: Some(handle),
        }
    }

    /// The address clients should dial.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Swallow the next `n` operation requests without processing them.
    pub fn drop_next_requests(&self, n: usize) {
        self.state.drop_requests.store(n, Ordering::SeqCst);
    }

    /// Process the next `n` operation requests but withhold the replies.
    pub fn drop_next_replies(&self, n: usize) {
        self.state.drop_replies.store(n, Ordering::SeqCst);
    }

    /// Current server logical time.
    pub fn op_time(&self) -> u64 {
        self.state.clock.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(socket: Socket, state: Arc<ServerState>, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let msg = match socket.recv() {
            Ok(msg) => msg,
            Err(nng::Error::TimedOut) => continue,
            Err(_) => break,
        };
        // A dropped reply abandons the pending request; Rep0 accepts the
        // next request regardless.
        if let Some(reply) = state.handle_raw(msg.as_slice()) {
            let _ = socket.send(Message::from(reply.as_slice()));
        }
    }
}

impl ServerState {
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn now(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn handle_raw(&self, raw: &[u8]) -> Option<Vec<u8>> {
        let payload = extract_payload(raw).ok()?;
        let archived =
            rkyv::access::<ArchivedClientMessage, rkyv::rancor::Error>(payload).ok()?;
        let message: ClientMessage =
            rkyv::deserialize::<ClientMessage, rkyv::rancor::Error>(archived).ok()?;

        let reply = match message {
            ClientMessage::Handshake(handshake) => {
                ServerMessage::Handshake(self.handle_handshake(handshake))
            }
            ClientMessage::Request(request) => {
                if take_one(&self.drop_requests) {
                    return None;
                }
                let response = self.handle_request(request);
                if take_one(&self.drop_replies) {
                    return None;
                }
                ServerMessage::Response(response)
            }
        };

        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&reply).ok()?;
        encode_frame(&bytes).ok()
    }

    fn handle_handshake(&self, handshake: Handshake) -> HandshakeResponse {
        if handshake.protocol_version != PROTOCOL_VERSION {
            return HandshakeResponse::reject("unsupported protocol version");
        }
        HandshakeResponse::accept(PROTOCOL_VERSION, self.now(), "test-server")
            .with_capability(capabilities::TRANSACTIONS)
            .with_capability(capabilities::SNAPSHOT_READS)
            .with_capability(capabilities::RETRYABLE_WRITES)
            .with_capability(capabilities::CURSORS)
    }

    fn handle_request(&self, request: Request) -> Response {
        let Request { id, session, command } = request;

        if let Some(token) = &session {
            if let Some(write_number) = token.write_number {
                let applied = self.applied_writes.lock();
                if let Some((op_time, result)) = applied.get(&(token.session_id, write_number)) {
                    return Response::write_ok(id, *op_time, result.clone());
                }
            }
        }

        let response = match command {
            Command::Insert {
                collection,
                documents,
                ordered,
            } => self.handle_insert(id, session.as_ref(), &collection, documents, ordered),
            Command::Find(query) => self.handle_find(id, session.as_ref(), query),
            Command::GetMore {
                cursor_id,
                batch_size,
            } => self.handle_get_more(id, cursor_id, batch_size),
            Command::Update {
                collection,
                filter,
                set,
                multi,
            } => self.handle_update(id, &collection, &filter, set, multi),
            Command::Delete {
                collection,
                filter,
                multi,
            } => self.handle_delete(id, &collection, &filter, multi),
            Command::Count { collection, filter } => {
                self.handle_count(id, session.as_ref(), &collection, &filter)
            }
            Command::Aggregate(query) => self.handle_aggregate(id, session.as_ref(), query),
            Command::Drop { collection } => {
                self.collections.lock().remove(&collection);
                Response::ack(id, self.tick())
            }
            Command::CommitTransaction => self.handle_commit(id, session.as_ref()),
            Command::AbortTransaction => self.handle_abort(id, session.as_ref()),
            Command::EndSession => self.handle_end_session(id, session.as_ref()),
            Command::Ping => Response::pong(id, self.now()),
        };

        if let (Some(token), Response { status, payload, op_time, .. }) = (&session, &response) {
            if status.is_ok() && token.txn.is_none() {
                if let Some(write_number) = token.write_number {
                    if let docdb_client::proto::ResponsePayload::Write(result) = payload {
                        self.applied_writes
                            .lock()
                            .insert((token.session_id, write_number), (*op_time, result.clone()));
                    }
                }
            }
        }

        response
    }

    fn handle_insert(
        &self,
        id: u64,
        session: Option<&SessionToken>,
        collection: &str,
        documents: Vec<Document>,
        ordered: bool,
    ) -> Response {
        if let Some(txn) = session.and_then(|t| t.txn.as_ref()) {
            let session_id = session.map(|t| t.session_id).unwrap_or_default();
            return self.handle_txn_insert(id, session_id, txn.number, txn.start, collection, documents);
        }

        let mut collections = self.collections.lock();
        let stored = collections.entry(collection.to_string()).or_default();
        let mut result = WriteResult::default();

        for (index, doc) in documents.into_iter().enumerate() {
            if is_duplicate(stored, &doc) {
                if ordered {
                    return Response::error(
                        id,
                        self.now(),
                        error_codes::DUPLICATE_KEY,
                        "duplicate _id",
                    );
                }
                result
                    .errors
                    .push(WriteError::new(index as u32, error_codes::DUPLICATE_KEY, "duplicate _id"));
                continue;
            }
            let stamp = self.tick();
            stored.push(StoredDoc { stamp, doc });
            result.inserted += 1;
        }

        Response::write_ok(id, self.now(), result)
    }

    fn handle_txn_insert(
        &self,
        id: u64,
        session_id: SessionId,
        txn_number: u64,
        start: bool,
        collection: &str,
        documents: Vec<Document>,
    ) -> Response {
        let mut staged = self.staged.lock();
        let key = (session_id, txn_number);
        if start {
            staged.entry(key).or_default();
        } else if !staged.contains_key(&key) {
            return Response::error(
                id,
                self.now(),
                error_codes::NO_SUCH_TRANSACTION,
                "transaction is not open",
            );
        }

        // Duplicate check against committed and already-staged documents.
        // A failed in-transaction write discards the whole staged
        // transaction; a later commit sees NO_SUCH_TRANSACTION.
        let duplicate = {
            let collections = self.collections.lock();
            let committed = collections.get(collection);
            let entry = staged.get(&key).map(|docs| docs.as_slice()).unwrap_or(&[]);
            documents.iter().any(|doc| {
                committed.map(|c| is_duplicate(c, doc)).unwrap_or(false)
                    || doc.id().map_or(false, |doc_id| {
                        entry
                            .iter()
                            .any(|(c, staged_doc)| c == collection && staged_doc.id() == Some(doc_id))
                    })
            })
        };
        if duplicate {
            staged.remove(&key);
            return Response::error(
                id,
                self.now(),
                error_codes::DUPLICATE_KEY,
                "duplicate _id",
            );
        }

        let count = documents.len() as u64;
        let entry = staged.entry(key).or_default();
        for doc in documents {
            entry.push((collection.to_string(), doc));
        }

        Response::write_ok(id, self.now(), WriteResult::inserted(count))
    }

    fn handle_commit(&self, id: u64, session: Option<&SessionToken>) -> Response {
        let Some((session_id, txn_number)) =
            session.and_then(|t| t.txn.as_ref().map(|txn| (t.session_id, txn.number)))
        else {
            return Response::error(
                id,
                self.now(),
                error_codes::INVALID_REQUEST,
                "commit requires a transaction context",
            );
        };

        let Some(docs) = self.staged.lock().remove(&(session_id, txn_number)) else {
            return Response::error(
                id,
                self.now(),
                error_codes::NO_SUCH_TRANSACTION,
                "transaction is not open",
            );
        };

        // One stamp for the whole transaction; readers see all or nothing.
        let stamp = self.tick();
        let mut collections = self.collections.lock();
        for (collection, doc) in docs {
            collections
                .entry(collection)
                .or_default()
                .push(StoredDoc { stamp, doc });
        }

        Response::ack(id, self.now())
    }

    fn handle_abort(&self, id: u64, session: Option<&SessionToken>) -> Response {
        if let Some((session_id, txn_number)) =
            session.and_then(|t| t.txn.as_ref().map(|txn| (t.session_id, txn.number)))
        {
            self.staged.lock().remove(&(session_id, txn_number));
        }
        Response::ack(id, self.now())
    }

    fn handle_end_session(&self, id: u64, session: Option<&SessionToken>) -> Response {
        if let Some(token) = session {
            self.staged.lock().retain(|(sid, _), _| *sid != token.session_id);
            self.applied_writes
                .lock()
                .retain(|(sid, _), _| *sid != token.session_id);
        }
        Response::ack(id, self.now())
    }

    fn handle_find(&self, id: u64, session: Option<&SessionToken>, query: FindQuery) -> Response {
        let snapshot = session.and_then(|t| t.snapshot_time);
        let collections = self.collections.lock();
        let mut matched: Vec<Document> = collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .filter(|stored| snapshot.map_or(true, |t| stored.stamp <= t))
                    .filter(|stored| matches_filter(&stored.doc, &query.filter))
                    .map(|stored| stored.doc.clone())
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);

        if let Some(sort) = &query.sort {
            sort_docs(&mut matched, sort);
        }

        let skip = query.skip as usize;
        let mut matched: Vec<Document> = matched.into_iter().skip(skip).collect();
        if let Some(limit) = query.limit {
            matched.truncate(limit as usize);
        }

        let batch_size = query.batch_size as usize;
        let batch = if batch_size > 0 && matched.len() > batch_size {
            let rest = matched.split_off(batch_size);
            let cursor_id = self.next_cursor.fetch_add(1, Ordering::SeqCst) + 1;
            self.cursors.lock().insert(cursor_id, rest);
            DocumentBatch::partial(matched, cursor_id)
        } else {
            DocumentBatch::complete(matched)
        };

        Response::documents_ok(id, self.now(), batch)
    }

    fn handle_aggregate(
        &self,
        id: u64,
        session: Option<&SessionToken>,
        query: AggregateQuery,
    ) -> Response {
        let snapshot = session.and_then(|t| t.snapshot_time);
        let collections = self.collections.lock();
        let mut docs: Vec<Document> = collections
            .get(&query.collection)
            .map(|stored| {
                stored
                    .iter()
                    .filter(|s| snapshot.map_or(true, |t| s.stamp <= t))
                    .map(|s| s.doc.clone())
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);

        for stage in &query.pipeline {
            match stage {
                AggregateStage::Match(filter) => {
                    docs.retain(|doc| matches_filter(doc, filter));
                }
                AggregateStage::Sort(sort) => sort_docs(&mut docs, sort),
                AggregateStage::Limit(n) => docs.truncate(*n as usize),
                AggregateStage::Skip(n) => {
                    let skip = (*n as usize).min(docs.len());
                    docs.drain(..skip);
                }
                AggregateStage::Project(fields) => {
                    for doc in &mut docs {
                        doc.fields.retain(|f| fields.contains(&f.name));
                    }
                }
                AggregateStage::Group { by, accumulators } => {
                    docs = group_docs(docs, by.as_deref(), accumulators);
                }
            }
        }

        Response::documents_ok(id, self.now(), DocumentBatch::complete(docs))
    }

    fn handle_get_more(&self, id: u64, cursor_id: u64, batch_size: u32) -> Response {
        let mut cursors = self.cursors.lock();
        let Some(rest) = cursors.get_mut(&cursor_id) else {
            return Response::error(
                id,
                self.now(),
                error_codes::CURSOR_NOT_FOUND,
                "cursor is not open",
            );
        };

        let take = if batch_size == 0 {
            rest.len()
        } else {
            (batch_size as usize).min(rest.len())
        };
        let batch: Vec<Document> = rest.drain(..take).collect();

        let response = if rest.is_empty() {
            cursors.remove(&cursor_id);
            DocumentBatch::complete(batch)
        } else {
            DocumentBatch::partial(batch, cursor_id)
        };

        Response::documents_ok(id, self.now(), response)
    }

    fn handle_count(
        &self,
        id: u64,
        session: Option<&SessionToken>,
        collection: &str,
        filter: &Filter,
    ) -> Response {
        let snapshot = session.and_then(|t| t.snapshot_time);
        let collections = self.collections.lock();
        let count = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|stored| snapshot.map_or(true, |t| stored.stamp <= t))
                    .filter(|stored| matches_filter(&stored.doc, filter))
                    .count() as u64
            })
            .unwrap_or(0);

        Response::count_ok(id, self.now(), count)
    }

    fn handle_update(
        &self,
        id: u64,
        collection: &str,
        filter: &Filter,
        set: Vec<docdb_client::proto::Field>,
        multi: bool,
    ) -> Response {
        let mut collections = self.collections.lock();
        let mut result = WriteResult::default();
        if let Some(docs) = collections.get_mut(collection) {
            for stored in docs.iter_mut() {
                if !matches_filter(&stored.doc, filter) {
                    continue;
                }
                result.matched += 1;
                let mut doc = std::mem::take(&mut stored.doc);
                for field in &set {
                    doc = doc.set(field.name.clone(), field.value.clone());
                }
                stored.doc = doc;
                result.modified += 1;
                if !multi {
                    break;
                }
            }
        }
        let op_time = if result.modified > 0 { self.tick() } else { self.now() };
        Response::write_ok(id, op_time, result)
    }

    fn handle_delete(
        &self,
        id: u64,
        collection: &str,
        filter: &Filter,
        multi: bool,
    ) -> Response {
        let mut collections = self.collections.lock();
        let mut result = WriteResult::default();
        if let Some(docs) = collections.get_mut(collection) {
            let mut index = 0;
            while index < docs.len() {
                if matches_filter(&docs[index].doc, filter) {
                    docs.remove(index);
                    result.deleted += 1;
                    if !multi {
                        break;
                    }
                } else {
                    index += 1;
                }
            }
        }
        let op_time = if result.deleted > 0 { self.tick() } else { self.now() };
        Response::write_ok(id, op_time, result)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn sort_docs(docs: &mut [Document], sort: &SortSpec) {
    docs.sort_by(|a, b| {
        let ord = match (a.get(&sort.path), b.get(&sort.path)) {
            (Some(x), Some(y)) => cmp_values(x, y).unwrap_or(std::cmp::Ordering::Equal),
            _ => std::cmp::Ordering::Equal,
        };
        match sort.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

/// Group stage evaluation: one output document per distinct key, with a
/// `key` field (when grouping by a path) and one field per accumulator.
fn group_docs(docs: Vec<Document>, by: Option<&str>, accumulators: &[Accumulator]) -> Vec<Document> {
    let mut groups: Vec<(Option<Value>, Vec<Document>)> = Vec::new();
    for doc in docs {
        let key = by.and_then(|path| doc.get(path).cloned());
        match groups
            .iter_mut()
            .find(|(k, _)| match (k, &key) {
                (Some(a), Some(b)) => values_equal(a, b),
                (None, None) => true,
                _ => false,
            }) {
            Some((_, members)) => members.push(doc),
            None => groups.push((key, vec![doc])),
        }
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut out = Document::new();
            if let Some(key) = key {
                out = out.set("key", key);
            }
            for acc in accumulators {
                out = out.set(acc.name.clone(), accumulate(acc, &members));
            }
            out
        })
        .collect()
}

fn accumulate(acc: &Accumulator, docs: &[Document]) -> Value {
    let values = || {
        docs.iter()
            .filter_map(|doc| acc.path.as_deref().and_then(|path| doc.get(path)))
    };
    match acc.function {
        AggregateFunction::Count => Value::Int64(docs.len() as i64),
        AggregateFunction::Sum => {
            Value::Int64(values().filter_map(Value::as_i64).sum())
        }
        AggregateFunction::Avg => {
            let nums: Vec<i64> = values().filter_map(Value::as_i64).collect();
            if nums.is_empty() {
                Value::Null
            } else {
                Value::Float64(nums.iter().sum::<i64>() as f64 / nums.len() as f64)
            }
        }
        AggregateFunction::Min => values()
            .min_by(|a, b| cmp_values(a, b).unwrap_or(std::cmp::Ordering::Equal))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateFunction::Max => values()
            .max_by(|a, b| cmp_values(a, b).unwrap_or(std::cmp::Ordering::Equal))
            .cloned()
            .unwrap_or(Value::Null),
    }
}

fn is_duplicate(stored: &[StoredDoc], doc: &Document) -> bool {
    doc.id()
        .map(|doc_id| stored.iter().any(|s| s.doc.id() == Some(doc_id)))
        .unwrap_or(false)
}

fn cmp_values(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            Some(a.as_i64()?.cmp(&b.as_i64()?))
        }
        (Value::Float64(x), Value::Float64(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    cmp_values(a, b) == Some(std::cmp::Ordering::Equal) || a == b
}

fn field_cmp(doc: &Document, path: &str, value: &Value) -> Option<std::cmp::Ordering> {
    doc.get(path).and_then(|v| cmp_values(v, value))
}

fn matches_filter(doc: &Document, filter: &Filter) -> bool {
    use std::cmp::Ordering::*;
    match filter {
        Filter::All => true,
        Filter::Eq { path, value } => doc.get(path).map_or(false, |v| values_equal(v, value)),
        Filter::Ne { path, value } => doc.get(path).map_or(true, |v| !values_equal(v, value)),
        Filter::Lt { path, value } => field_cmp(doc, path, value) == Some(Less),
        Filter::Le { path, value } => matches!(field_cmp(doc, path, value), Some(Less | Equal)),
        Filter::Gt { path, value } => field_cmp(doc, path, value) == Some(Greater),
        Filter::Ge { path, value } => matches!(field_cmp(doc, path, value), Some(Greater | Equal)),
        Filter::In { path, values } => doc
            .get(path)
            .map_or(false, |v| values.iter().any(|w| values_equal(v, w))),
        Filter::Exists { path } => doc.contains(path),
        Filter::And(conditions) => conditions.iter().all(|c| matches_condition(doc, c)),
        Filter::Or(conditions) => conditions.iter().any(|c| matches_condition(doc, c)),
    }
}

fn matches_condition(doc: &Document, condition: &Condition) -> bool {
    use std::cmp::Ordering::*;
    match condition {
        Condition::Eq { path, value } => doc.get(path).map_or(false, |v| values_equal(v, value)),
        Condition::Ne { path, value } => doc.get(path).map_or(true, |v| !values_equal(v, value)),
        Condition::Lt { path, value } => field_cmp(doc, path, value) == Some(Less),
        Condition::Le { path, value } => matches!(field_cmp(doc, path, value), Some(Less | Equal)),
        Condition::Gt { path, value } => field_cmp(doc, path, value) == Some(Greater),
        Condition::Ge { path, value } => {
            matches!(field_cmp(doc, path, value), Some(Greater | Equal))
        }
        Condition::In { path, values } => doc
            .get(path)
            .map_or(false, |v| values.iter().any(|w| values_equal(v, w))),
        Condition::Exists { path } => doc.contains(path),
    }
}
