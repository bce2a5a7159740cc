//! SQLite schema for the entity, blob, and vector stores.

use rusqlite::Connection;

pub const ARTICLES_TABLE: &str = "articles";
pub const COMMENTS_TABLE: &str = "comments";
pub const MEMORY_TABLE: &str = "memory";

/// Static description of one entity table: its key attribute, plus the
/// JSON attributes lifted into indexed columns for secondary queries.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub key_attr: &'static str,
    /// `(index_name, partition_attr, sort_attr)` triples.
    pub indexes: &'static [(&'static str, &'static str, &'static str)],
}

pub const TABLES: [TableSpec; 3] = [
    TableSpec {
        name: ARTICLES_TABLE,
        key_attr: "article_id",
        indexes: &[
            ("state-published_at", "state", "published_at"),
            ("cluster_id-published_at", "cluster_id", "published_at"),
        ],
    },
    TableSpec {
        name: COMMENTS_TABLE,
        key_attr: "comment_id",
        indexes: &[("article_id-created_at", "article_id", "created_at")],
    },
    TableSpec {
        name: MEMORY_TABLE,
        key_attr: "memory_id",
        indexes: &[],
    },
];

/// Look up a table spec by name.
pub fn table_spec(name: &str) -> Option<&'static TableSpec> {
    TABLES.iter().find(|t| t.name == name)
}

/// Create all tables and indexes if absent.
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    for spec in &TABLES {
        let mut columns = String::new();
        for (_, partition, sort) in spec.indexes {
            if !columns.contains(&format!(" {partition} ")) {
                columns.push_str(&format!(", {partition} TEXT"));
            }
            if !columns.contains(&format!(" {sort} ")) {
                columns.push_str(&format!(", {sort} TEXT"));
            }
        }
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {name} (
                k TEXT PRIMARY KEY,
                version INTEGER NOT NULL DEFAULT 1,
                item TEXT NOT NULL{columns}
            );",
            name = spec.name,
        ))?;
        for (index_name, partition, sort) in spec.indexes {
            let safe = index_name.replace('-', "_");
            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{name}_{safe} ON {name}({partition}, {sort});",
                name = spec.name,
            ))?;
        }
    }

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS blobs (
            bucket TEXT NOT NULL,
            k TEXT NOT NULL,
            content_type TEXT NOT NULL,
            body BLOB NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (bucket, k)
        );
        CREATE TABLE IF NOT EXISTS vectors (
            article_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            published_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}
