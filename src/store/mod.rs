//! Content-store adapter.
//!
//! Two storage shapes back the pipeline: a keyed entity store with
//! conditional (versioned) writes and secondary-index queries, and a
//! content-addressed blob store. A brute-force vector index rides on the
//! same database for the semantic dedup stage.
//!
//! The entity store is the only authoritative state; every mutation is
//! conditional on key existence and/or version, which serializes
//! concurrent writers without in-memory locks.

mod blob;
mod entity;
mod schema;
mod sqlite;
mod vector;

pub use blob::{BlobStore, SqliteBlobStore, StoredBlob};
pub use entity::{EntityStore, QueryPage, RangeBound, WriteOp};
pub use schema::{initialize_schema, TableSpec, ARTICLES_TABLE, COMMENTS_TABLE, MEMORY_TABLE};
pub use sqlite::SqliteEntityStore;
pub use vector::{SqliteVectorIndex, VectorHit, VectorIndex, VectorRecord};
