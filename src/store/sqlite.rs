//! SQLite-backed entity store implementation.

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

use super::entity::{EntityStore, QueryPage, RangeBound, WriteOp, MAX_BATCH_GET, MAX_BATCH_PUT};
use super::schema::{initialize_schema, table_spec, TableSpec};

/// SQLite-backed keyed entity store.
///
/// Items are stored as JSON text, which round-trips `f64` fields exactly
/// (serde_json emits the shortest representation that re-parses to the
/// same bits). Indexed attributes are lifted into columns at write time.
#[derive(Clone)]
pub struct SqliteEntityStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEntityStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::Storage(e.to_string()))?;
        initialize_schema(&conn).map_err(|e| Error::Storage(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Storage(e.to_string()))?;
        initialize_schema(&conn).map_err(|e| Error::Storage(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Share the underlying connection with the blob/vector stores.
    pub(crate) fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("store lock poisoned: {e}")))?;
        f(&mut conn)
    }

    fn spec(table: &str) -> Result<&'static TableSpec> {
        table_spec(table).ok_or_else(|| Error::Storage(format!("unknown table '{table}'")))
    }
}

/// JSON attribute rendered for an indexed column.
fn indexed_attr(item: &Value, attr: &str) -> Option<String> {
    match item.get(attr) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

fn item_version(item: &Value) -> u64 {
    item.get("version").and_then(Value::as_u64).unwrap_or(1)
}

/// Distinct indexed columns for a table, in stable order.
fn indexed_columns(spec: &TableSpec) -> Vec<&'static str> {
    let mut columns = Vec::new();
    for (_, partition, sort) in spec.indexes {
        if !columns.contains(partition) {
            columns.push(*partition);
        }
        if !columns.contains(sort) {
            columns.push(*sort);
        }
    }
    columns
}

fn write_item(
    conn: &Connection,
    spec: &TableSpec,
    key: &str,
    item: &Value,
    replace: bool,
) -> Result<()> {
    let columns = indexed_columns(spec);
    let mut names = vec!["k", "version", "item"];
    names.extend(columns.iter());
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();

    let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };
    let sql = format!(
        "{verb} INTO {table} ({names}) VALUES ({placeholders})",
        table = spec.name,
        names = names.join(", "),
        placeholders = placeholders.join(", "),
    );

    let serialized = serde_json::to_string(item)?;
    let mut values: Vec<Option<String>> = vec![
        Some(key.to_string()),
        Some(item_version(item).to_string()),
        Some(serialized),
    ];
    for column in &columns {
        values.push(indexed_attr(item, column));
    }

    conn.execute(&sql, params_from_iter(values.iter()))
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(inner, _)
                if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::precondition_failed(key, "item already exists")
            }
            other => Error::Storage(other.to_string()),
        })?;
    Ok(())
}

fn stored_version(conn: &Connection, table: &str, key: &str) -> Result<Option<u64>> {
    conn.query_row(
        &format!("SELECT version FROM {table} WHERE k = ?1"),
        params![key],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.map(|n| n as u64))
    .map_err(|e| Error::Storage(e.to_string()))
}

fn apply_update(
    conn: &Connection,
    spec: &TableSpec,
    key: &str,
    item: &Value,
    if_exists: bool,
    if_version: Option<u64>,
) -> Result<()> {
    let current = stored_version(conn, spec.name, key)?;
    match (current, if_exists, if_version) {
        (None, true, _) => {
            return Err(Error::precondition_failed(key, "item does not exist"));
        }
        (None, false, Some(_)) => {
            return Err(Error::precondition_failed(key, "item does not exist"));
        }
        (Some(stored), _, Some(expected)) if stored != expected => {
            return Err(Error::precondition_failed(
                key,
                format!("version {stored} != expected {expected}"),
            ));
        }
        _ => {}
    }
    write_item(conn, spec, key, item, true)
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn put(&self, table: &str, key: &str, item: Value, if_absent: bool) -> Result<()> {
        let spec = Self::spec(table)?;
        self.with_conn(|conn| write_item(conn, spec, key, &item, !if_absent))
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        item: Value,
        if_exists: bool,
        if_version: Option<u64>,
    ) -> Result<()> {
        let spec = Self::spec(table)?;
        self.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| Error::Storage(e.to_string()))?;
            apply_update(&tx, spec, key, &item, if_exists, if_version)?;
            tx.commit().map_err(|e| Error::Storage(e.to_string()))
        })
    }

    async fn get(&self, table: &str, key: &str, _strong_read: bool) -> Result<Option<Value>> {
        let spec = Self::spec(table)?;
        self.with_conn(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    &format!("SELECT item FROM {} WHERE k = ?1", spec.name),
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| Error::Storage(e.to_string()))?;
            raw.map(|s| serde_json::from_str(&s).map_err(Error::from))
                .transpose()
        })
    }

    async fn query_secondary(
        &self,
        table: &str,
        index: &str,
        partition: &str,
        lower: RangeBound,
        upper: RangeBound,
        limit: Option<usize>,
        cursor: Option<String>,
    ) -> Result<QueryPage> {
        let spec = Self::spec(table)?;
        let (_, partition_attr, sort_attr) = spec
            .indexes
            .iter()
            .find(|(name, _, _)| *name == index)
            .ok_or_else(|| Error::Storage(format!("unknown index '{index}' on '{table}'")))?;

        let offset: usize = match &cursor {
            Some(c) => c
                .parse()
                .map_err(|_| Error::Validation(format!("bad cursor '{c}'")))?,
            None => 0,
        };
        let limit = limit.unwrap_or(100);

        let mut sql = format!(
            "SELECT item FROM {table} WHERE {partition_attr} = ?1",
        );
        let mut values: Vec<String> = vec![partition.to_string()];
        match &lower {
            RangeBound::Unbounded => {}
            RangeBound::Inclusive(v) => {
                values.push(v.clone());
                sql.push_str(&format!(" AND {sort_attr} >= ?{}", values.len()));
            }
            RangeBound::Exclusive(v) => {
                values.push(v.clone());
                sql.push_str(&format!(" AND {sort_attr} > ?{}", values.len()));
            }
        }
        match &upper {
            RangeBound::Unbounded => {}
            RangeBound::Inclusive(v) => {
                values.push(v.clone());
                sql.push_str(&format!(" AND {sort_attr} <= ?{}", values.len()));
            }
            RangeBound::Exclusive(v) => {
                values.push(v.clone());
                sql.push_str(&format!(" AND {sort_attr} < ?{}", values.len()));
            }
        }
        // Fetch one extra row to detect whether a further page exists.
        sql.push_str(&format!(
            " ORDER BY {sort_attr} DESC LIMIT {} OFFSET {offset}",
            limit + 1
        ));

        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| Error::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), |row| {
                    row.get::<_, String>(0)
                })
                .map_err(|e| Error::Storage(e.to_string()))?;

            let mut items = Vec::new();
            for raw in rows {
                let raw = raw.map_err(|e| Error::Storage(e.to_string()))?;
                items.push(serde_json::from_str(&raw)?);
            }
            let cursor = if items.len() > limit {
                items.truncate(limit);
                Some((offset + limit).to_string())
            } else {
                None
            };
            Ok(QueryPage { items, cursor })
        })
    }

    async fn batch_put(&self, table: &str, items: Vec<(String, Value)>) -> Result<()> {
        if items.len() > MAX_BATCH_PUT {
            return Err(Error::Validation(format!(
                "batch_put accepts at most {MAX_BATCH_PUT} items, got {}",
                items.len()
            )));
        }
        let spec = Self::spec(table)?;
        self.with_conn(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| Error::Storage(e.to_string()))?;
            for (key, item) in &items {
                write_item(&tx, spec, key, item, true)?;
            }
            tx.commit().map_err(|e| Error::Storage(e.to_string()))
        })
    }

    async fn batch_get(&self, table: &str, keys: &[String]) -> Result<Vec<Value>> {
        if keys.len() > MAX_BATCH_GET {
            return Err(Error::Validation(format!(
                "batch_get accepts at most {MAX_BATCH_GET} keys, got {}",
                keys.len()
            )));
        }
        let spec = Self::spec(table)?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (1..=keys.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT item FROM {} WHERE k IN ({})",
            spec.name,
            placeholders.join(", ")
        );
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| Error::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params_from_iter(keys.iter()), |row| {
                    row.get::<_, String>(0)
                })
                .map_err(|e| Error::Storage(e.to_string()))?;
            let mut items = Vec::new();
            for raw in rows {
                let raw = raw.map_err(|e| Error::Storage(e.to_string()))?;
                items.push(serde_json::from_str(&raw)?);
            }
            Ok(items)
        })
    }

    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| Error::Storage(e.to_string()))?;
            for op in &ops {
                match op {
                    WriteOp::Put {
                        table,
                        key,
                        item,
                        if_absent,
                    } => {
                        let spec = Self::spec(table)?;
                        if *if_absent && stored_version(&tx, spec.name, key)?.is_some() {
                            return Err(Error::precondition_failed(key, "item already exists"));
                        }
                        write_item(&tx, spec, key, item, true)?;
                    }
                    WriteOp::Update {
                        table,
                        key,
                        item,
                        if_exists,
                        if_version,
                    } => {
                        let spec = Self::spec(table)?;
                        apply_update(&tx, spec, key, item, *if_exists, *if_version)?;
                    }
                }
            }
            tx.commit().map_err(|e| Error::Storage(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::ARTICLES_TABLE;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> SqliteEntityStore {
        SqliteEntityStore::in_memory().unwrap()
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let store = store();
        let item = json!({"article_id": "a-1", "version": 1, "state": "INGESTED",
                          "published_at": "2026-01-01T00:00:00Z", "relevancy_score": 0.725});
        store
            .put(ARTICLES_TABLE, "a-1", item.clone(), true)
            .await
            .unwrap();
        let fetched = store.get(ARTICLES_TABLE, "a-1", true).await.unwrap();
        assert_eq!(fetched, Some(item));
    }

    #[tokio::test]
    async fn floats_round_trip_exactly() {
        let store = store();
        let score = 0.1_f64 + 0.2_f64; // 0.30000000000000004
        let item = json!({"article_id": "a-1", "version": 1, "relevancy_score": score});
        store.put(ARTICLES_TABLE, "a-1", item, true).await.unwrap();
        let fetched = store
            .get(ARTICLES_TABLE, "a-1", true)
            .await
            .unwrap()
            .unwrap();
        let bits = fetched["relevancy_score"].as_f64().unwrap().to_bits();
        assert_eq!(bits, score.to_bits());
    }

    #[tokio::test]
    async fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel.db");

        {
            let store = SqliteEntityStore::open(&path).unwrap();
            store
                .put(
                    ARTICLES_TABLE,
                    "a-1",
                    json!({"article_id": "a-1", "version": 1, "state": "PUBLISHED",
                           "published_at": "2026-01-01T00:00:00Z"}),
                    true,
                )
                .await
                .unwrap();
        }

        let reopened = SqliteEntityStore::open(&path).unwrap();
        let item = reopened.get(ARTICLES_TABLE, "a-1", true).await.unwrap();
        assert_eq!(item.unwrap()["state"], "PUBLISHED");
    }

    #[tokio::test]
    async fn conditional_put_fails_on_existing() {
        let store = store();
        let item = json!({"article_id": "a-1", "version": 1});
        store
            .put(ARTICLES_TABLE, "a-1", item.clone(), true)
            .await
            .unwrap();
        let err = store.put(ARTICLES_TABLE, "a-1", item, true).await.unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn versioned_update_enforces_precondition() {
        let store = store();
        store
            .put(ARTICLES_TABLE, "a-1", json!({"article_id": "a-1", "version": 1}), true)
            .await
            .unwrap();

        store
            .update(
                ARTICLES_TABLE,
                "a-1",
                json!({"article_id": "a-1", "version": 2}),
                true,
                Some(1),
            )
            .await
            .unwrap();

        // Stale writer loses.
        let err = store
            .update(
                ARTICLES_TABLE,
                "a-1",
                json!({"article_id": "a-1", "version": 2}),
                true,
                Some(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn update_missing_with_if_exists_fails() {
        let store = store();
        let err = store
            .update(ARTICLES_TABLE, "ghost", json!({"version": 1}), true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn secondary_query_filters_and_orders() {
        let store = store();
        for (id, state, ts) in [
            ("a-1", "REVIEW", "2026-01-01T00:00:00Z"),
            ("a-2", "REVIEW", "2026-01-03T00:00:00Z"),
            ("a-3", "PUBLISHED", "2026-01-02T00:00:00Z"),
            ("a-4", "REVIEW", "2026-01-02T00:00:00Z"),
        ] {
            store
                .put(
                    ARTICLES_TABLE,
                    id,
                    json!({"article_id": id, "version": 1, "state": state, "published_at": ts}),
                    true,
                )
                .await
                .unwrap();
        }

        let page = store
            .query_secondary(
                ARTICLES_TABLE,
                "state-published_at",
                "REVIEW",
                RangeBound::Unbounded,
                RangeBound::Unbounded,
                None,
                None,
            )
            .await
            .unwrap();
        let ids: Vec<&str> = page
            .items
            .iter()
            .map(|i| i["article_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["a-2", "a-4", "a-1"]);
        assert!(page.cursor.is_none());
    }

    #[tokio::test]
    async fn secondary_query_paginates_with_cursor() {
        let store = store();
        for i in 0..5 {
            store
                .put(
                    ARTICLES_TABLE,
                    &format!("a-{i}"),
                    json!({"article_id": format!("a-{i}"), "version": 1, "state": "REVIEW",
                           "published_at": format!("2026-01-0{}T00:00:00Z", i + 1)}),
                    true,
                )
                .await
                .unwrap();
        }

        let first = store
            .query_secondary(
                ARTICLES_TABLE,
                "state-published_at",
                "REVIEW",
                RangeBound::Unbounded,
                RangeBound::Unbounded,
                Some(2),
                None,
            )
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        let cursor = first.cursor.clone().unwrap();

        let second = store
            .query_secondary(
                ARTICLES_TABLE,
                "state-published_at",
                "REVIEW",
                RangeBound::Unbounded,
                RangeBound::Unbounded,
                Some(2),
                Some(cursor),
            )
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);
        assert_ne!(
            first.items[0]["article_id"],
            second.items[0]["article_id"]
        );
    }

    #[tokio::test]
    async fn range_bounds_limit_window() {
        let store = store();
        for (id, ts) in [
            ("a-1", "2026-01-01T00:00:00Z"),
            ("a-2", "2026-01-05T00:00:00Z"),
            ("a-3", "2026-01-09T00:00:00Z"),
        ] {
            store
                .put(
                    ARTICLES_TABLE,
                    id,
                    json!({"article_id": id, "version": 1, "state": "REVIEW", "published_at": ts}),
                    true,
                )
                .await
                .unwrap();
        }
        let page = store
            .query_secondary(
                ARTICLES_TABLE,
                "state-published_at",
                "REVIEW",
                RangeBound::Inclusive("2026-01-02T00:00:00Z".into()),
                RangeBound::Exclusive("2026-01-09T00:00:00Z".into()),
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["article_id"], "a-2");
    }

    #[tokio::test]
    async fn batch_limits_enforced() {
        let store = store();
        let items: Vec<(String, Value)> = (0..26)
            .map(|i| (format!("a-{i}"), json!({"article_id": format!("a-{i}"), "version": 1})))
            .collect();
        assert!(store.batch_put(ARTICLES_TABLE, items).await.is_err());

        let keys: Vec<String> = (0..101).map(|i| format!("a-{i}")).collect();
        assert!(store.batch_get(ARTICLES_TABLE, &keys).await.is_err());
    }

    #[tokio::test]
    async fn transact_write_rolls_back_on_failed_condition() {
        let store = store();
        store
            .put(ARTICLES_TABLE, "existing", json!({"article_id": "existing", "version": 1}), true)
            .await
            .unwrap();

        let err = store
            .transact_write(vec![
                WriteOp::Put {
                    table: ARTICLES_TABLE.into(),
                    key: "fresh".into(),
                    item: json!({"article_id": "fresh", "version": 1}),
                    if_absent: true,
                },
                WriteOp::Put {
                    table: ARTICLES_TABLE.into(),
                    key: "existing".into(),
                    item: json!({"article_id": "existing", "version": 9}),
                    if_absent: true,
                },
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));

        // First op must not have been applied.
        assert!(store
            .get(ARTICLES_TABLE, "fresh", true)
            .await
            .unwrap()
            .is_none());
    }
}
