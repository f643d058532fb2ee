//! Command types: the wire form of an operation request.
//!
//! A [`Command`] is one logical operation against a collection, immutable
//! once constructed. Idempotency is classified explicitly per variant via
//! [`Command::is_idempotent`] rather than inferred, since misclassification
//! causes duplicate writes on retry.

use crate::document::{Document, Field, Value};
use rkyv::{Archive, Deserialize, Serialize};

/// A filter over documents in a collection.
///
/// Note: `And`/`Or` take a flat list of simple conditions (single level)
/// to avoid recursive type issues with rkyv serialization. Field paths use
/// dot notation for nested structure.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum Filter {
    /// Matches every document.
    All,
    /// Field equals value.
    Eq { path: String, value: Value },
    /// Field not equals value.
    Ne { path: String, value: Value },
    /// Field less than value.
    Lt { path: String, value: Value },
    /// Field less than or equal to value.
    Le { path: String, value: Value },
    /// Field greater than value.
    Gt { path: String, value: Value },
    /// Field greater than or equal to value.
    Ge { path: String, value: Value },
    /// Field is in a set of values.
    In { path: String, values: Vec<Value> },
    /// Field is present.
    Exists { path: String },
    /// All conditions must be true (flat list, single level).
    And(Vec<Condition>),
    /// At least one condition must be true (flat list, single level).
    Or(Vec<Condition>),
}

/// A simple non-nestable condition used inside `And`/`Or`.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum Condition {
    /// Field equals value.
    Eq { path: String, value: Value },
    /// Field not equals value.
    Ne { path: String, value: Value },
    /// Field less than value.
    Lt { path: String, value: Value },
    /// Field less than or equal to value.
    Le { path: String, value: Value },
    /// Field greater than value.
    Gt { path: String, value: Value },
    /// Field greater than or equal to value.
    Ge { path: String, value: Value },
    /// Field is in a set of values.
    In { path: String, values: Vec<Value> },
    /// Field is present.
    Exists { path: String },
}

impl Filter {
    /// Equality filter.
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Inequality filter.
    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Greater-than filter.
    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Less-than filter.
    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Membership filter.
    pub fn is_in(path: impl Into<String>, values: Vec<Value>) -> Self {
        Filter::In {
            path: path.into(),
            values,
        }
    }

    /// Conjunction of simple conditions.
    pub fn and(conditions: Vec<Condition>) -> Self {
        Filter::And(conditions)
    }

    /// Disjunction of simple conditions.
    pub fn or(conditions: Vec<Condition>) -> Self {
        Filter::Or(conditions)
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

impl Condition {
    /// Equality condition.
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Eq {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Greater-than condition.
    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Gt {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending order.
    Ascending,
    /// Descending order.
    Descending,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct SortSpec {
    /// Field path to sort by.
    pub path: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl SortSpec {
    /// Sort ascending by a field.
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Sort descending by a field.
    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// A find query against a collection.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct FindQuery {
    /// Target collection.
    pub collection: String,
    /// Filter to apply.
    pub filter: Filter,
    /// Fields to include in results (None = all fields).
    pub projection: Option<Vec<String>>,
    /// Sort order.
    pub sort: Option<SortSpec>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
    /// Number of matching documents to skip.
    pub skip: u64,
    /// Number of documents per server batch (0 = server default).
    pub batch_size: u32,
}

impl FindQuery {
    /// Create a find query matching all documents in a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::All,
            projection: None,
            sort: None,
            limit: None,
            skip: 0,
            batch_size: 0,
        }
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the projection.
    pub fn with_projection(mut self, fields: Vec<String>) -> Self {
        self.projection = Some(fields);
        self
    }

    /// Set the sort order.
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set the result limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the number of documents to skip.
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Set the server batch size.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// One stage of an aggregation pipeline (flat, non-nested).
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum AggregateStage {
    /// Filter documents entering the pipeline.
    Match(Filter),
    /// Group by a field path (None groups everything) and accumulate.
    Group {
        /// Field path to group by.
        by: Option<String>,
        /// Accumulators to compute per group.
        accumulators: Vec<Accumulator>,
    },
    /// Sort pipeline documents.
    Sort(SortSpec),
    /// Keep at most N documents.
    Limit(u64),
    /// Skip the first N documents.
    Skip(u64),
    /// Keep only the named fields.
    Project(Vec<String>),
}

/// An accumulator within a group stage.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Accumulator {
    /// Output field name.
    pub name: String,
    /// Aggregate function to apply.
    pub function: AggregateFunction,
    /// Field path the function reads (None for Count).
    pub path: Option<String>,
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum AggregateFunction {
    /// Count of documents.
    Count,
    /// Sum of a numeric field.
    Sum,
    /// Average of a numeric field.
    Avg,
    /// Minimum of a field.
    Min,
    /// Maximum of a field.
    Max,
}

impl Accumulator {
    /// Count accumulator.
    pub fn count(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: AggregateFunction::Count,
            path: None,
        }
    }

    /// Sum accumulator over a field path.
    pub fn sum(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: AggregateFunction::Sum,
            path: Some(path.into()),
        }
    }
}

/// An aggregation query against a collection.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct AggregateQuery {
    /// Target collection.
    pub collection: String,
    /// Pipeline stages applied in order.
    pub pipeline: Vec<AggregateStage>,
}

impl AggregateQuery {
    /// Create an empty pipeline over a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            pipeline: vec![],
        }
    }

    /// Append a stage to the pipeline.
    pub fn stage(mut self, stage: AggregateStage) -> Self {
        self.pipeline.push(stage);
        self
    }
}

/// A command: one logical operation plus its target collection and
/// parameters.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum Command {
    /// Insert documents into a collection.
    Insert {
        /// Target collection.
        collection: String,
        /// Documents to insert.
        documents: Vec<Document>,
        /// When false, keep inserting past per-document errors.
        ordered: bool,
    },
    /// Find documents matching a filter.
    Find(FindQuery),
    /// Continue reading from a server cursor.
    GetMore {
        /// Cursor handle from a prior Find/Aggregate response.
        cursor_id: u64,
        /// Number of documents per batch (0 = server default).
        batch_size: u32,
    },
    /// Update documents matching a filter.
    Update {
        /// Target collection.
        collection: String,
        /// Filter selecting documents to update.
        filter: Filter,
        /// Field values to set on matching documents.
        set: Vec<Field>,
        /// Update all matches (true) or just the first (false).
        multi: bool,
    },
    /// Delete documents matching a filter.
    Delete {
        /// Target collection.
        collection: String,
        /// Filter selecting documents to delete.
        filter: Filter,
        /// Delete all matches (true) or just the first (false).
        multi: bool,
    },
    /// Count documents matching a filter.
    Count {
        /// Target collection.
        collection: String,
        /// Filter to count against.
        filter: Filter,
    },
    /// Run an aggregation pipeline.
    Aggregate(AggregateQuery),
    /// Drop a collection and all its documents.
    Drop {
        /// Collection to drop.
        collection: String,
    },
    /// Commit the session's open transaction.
    CommitTransaction,
    /// Abort the session's open transaction.
    AbortTransaction,
    /// End the session server-side, releasing its resources.
    EndSession,
    /// Ping the server (for health checks).
    Ping,
}

impl Command {
    /// Create an ordered insert of a single document.
    pub fn insert_one(collection: impl Into<String>, document: Document) -> Self {
        Command::Insert {
            collection: collection.into(),
            documents: vec![document],
            ordered: true,
        }
    }

    /// Create a multi-document insert.
    pub fn insert(collection: impl Into<String>, documents: Vec<Document>, ordered: bool) -> Self {
        Command::Insert {
            collection: collection.into(),
            documents,
            ordered,
        }
    }

    /// Create a count command.
    pub fn count(collection: impl Into<String>, filter: Filter) -> Self {
        Command::Count {
            collection: collection.into(),
            filter,
        }
    }

    /// Create a drop-collection command.
    pub fn drop(collection: impl Into<String>) -> Self {
        Command::Drop {
            collection: collection.into(),
        }
    }

    /// Get the target collection, if the command has one.
    pub fn collection(&self) -> Option<&str> {
        match self {
            Command::Insert { collection, .. }
            | Command::Update { collection, .. }
            | Command::Delete { collection, .. }
            | Command::Count { collection, .. }
            | Command::Drop { collection } => Some(collection),
            Command::Find(query) => Some(&query.collection),
            Command::Aggregate(query) => Some(&query.collection),
            Command::GetMore { .. }
            | Command::CommitTransaction
            | Command::AbortTransaction
            | Command::EndSession
            | Command::Ping => None,
        }
    }

    /// Whether this command can be repeated safely without changing the
    /// outcome beyond its first successful application.
    ///
    /// Pure reads are idempotent and may be retried transparently on
    /// transport failure. Everything else requires a retryable-write token
    /// or an explicit caller override before it may be retried.
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            Command::Find(_)
                | Command::GetMore { .. }
                | Command::Count { .. }
                | Command::Aggregate(_)
                | Command::Ping
        )
    }

    /// Whether this command modifies data.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Insert { .. }
                | Command::Update { .. }
                | Command::Delete { .. }
                | Command::Drop { .. }
        )
    }
}
