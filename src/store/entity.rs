//! Keyed entity store abstraction.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Batch size caps mirrored from the backing store's limits.
pub const MAX_BATCH_PUT: usize = 25;
pub const MAX_BATCH_GET: usize = 100;

/// One bound of a sort-key range.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    Unbounded,
    /// Inclusive bound on the sort attribute.
    Inclusive(String),
    /// Exclusive bound on the sort attribute.
    Exclusive(String),
}

/// A page of query results with an opaque continuation cursor.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub items: Vec<Value>,
    /// Present when more items remain.
    pub cursor: Option<String>,
}

/// One operation inside a transactional write.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put {
        table: String,
        key: String,
        item: Value,
        /// Fail with `PreconditionFailed` when the key already exists.
        if_absent: bool,
    },
    Update {
        table: String,
        key: String,
        item: Value,
        /// Fail when the key does not exist.
        if_exists: bool,
        /// Fail unless the stored version equals this value.
        if_version: Option<u64>,
    },
}

/// Keyed entity store with conditional writes and secondary-index queries.
///
/// Items are JSON documents. Implementations must round-trip numeric
/// fields without precision loss and surface conditional-write failures
/// as `PreconditionFailed`, throttling as `Throttled`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert an item. With `if_absent`, fails if the key exists.
    async fn put(&self, table: &str, key: &str, item: Value, if_absent: bool) -> Result<()>;

    /// Replace an item. `if_exists` requires the key to be present;
    /// `if_version` additionally requires the stored version to match.
    async fn update(
        &self,
        table: &str,
        key: &str,
        item: Value,
        if_exists: bool,
        if_version: Option<u64>,
    ) -> Result<()>;

    /// Fetch one item. `strong_read` requests read-your-writes
    /// consistency where the backend distinguishes it.
    async fn get(&self, table: &str, key: &str, strong_read: bool) -> Result<Option<Value>>;

    /// Query a named secondary index by partition value and sort-key
    /// range, newest-first, with an optional limit and continuation
    /// cursor.
    #[allow(clippy::too_many_arguments)]
    async fn query_secondary(
        &self,
        table: &str,
        index: &str,
        partition: &str,
        lower: RangeBound,
        upper: RangeBound,
        limit: Option<usize>,
        cursor: Option<String>,
    ) -> Result<QueryPage>;

    /// Unconditional batched put, at most [`MAX_BATCH_PUT`] items.
    async fn batch_put(&self, table: &str, items: Vec<(String, Value)>) -> Result<()>;

    /// Batched get, at most [`MAX_BATCH_GET`] keys; missing keys are
    /// silently absent from the result.
    async fn batch_get(&self, table: &str, keys: &[String]) -> Result<Vec<Value>>;

    /// All-or-nothing application of conditional writes.
    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<()>;
}
