pub mod schema;
pub mod sqlite;
pub mod txn;

pub use sqlite::SqliteStore;
pub use txn::{TransactionManager, TxnState};

use crate::query::BuiltQuery;
use crate::types::{Post, StoreStats};

/// The record store abstraction. All query and load paths go through this
/// trait; raw engine failures never escape an implementation.
#[async_trait::async_trait]
pub trait PostStore: Send + Sync {
    /// Execute a built query, returning all matching rows.
    async fn query_posts(&self, query: &BuiltQuery) -> crate::error::Result<Vec<Post>>;

    /// Execute a built query, returning only the first row.
    async fn query_first(&self, query: &BuiltQuery) -> crate::error::Result<Option<Post>>;

    /// Run the count companion of a built query.
    async fn count_posts(&self, query: &BuiltQuery) -> crate::error::Result<u64>;

    /// Insert a slice of posts without transaction control. Callers own
    /// batching and transactional discipline (see [`TransactionManager`]).
    async fn insert_chunk(&self, posts: &[Post]) -> crate::error::Result<u64>;

    /// Serialize the full in-memory dataset back out as JSON bytes.
    async fn export_json(&self) -> crate::error::Result<Vec<u8>>;

    /// Summary counters for the loaded dataset.
    async fn stats(&self) -> crate::error::Result<StoreStats>;

    /// Whether the FTS index is available for text search.
    fn fts_enabled(&self) -> bool;

    /// Invalidate the handle. Every operation afterward fails with a
    /// Connection-kind error rather than touching a stale handle.
    async fn close(&self) -> crate::error::Result<()>;
}
