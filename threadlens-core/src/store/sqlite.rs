use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};

use crate::error::{ErrorKind, StructuredError};
use crate::query::BuiltQuery;
use crate::types::{Post, StoreStats};

use super::PostStore;
use super::schema;

/// SQLite-backed implementation of [`PostStore`].
///
/// Owns the single per-session engine handle. The handle is injected into
/// whatever needs it (engine, transaction manager) rather than living in
/// process-global state.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    db_path: Option<PathBuf>,
    fts: bool,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> crate::error::Result<Self> {
        let conn = Connection::open(path)?;
        let mut store = Self {
            conn: Mutex::new(Some(conn)),
            db_path: Some(path.to_path_buf()),
            fts: false,
        };
        store.fts = store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory store (default for the browser-style single
    /// session, and for testing).
    pub fn in_memory() -> crate::error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self {
            conn: Mutex::new(Some(conn)),
            db_path: None,
            fts: false,
        };
        store.fts = store.initialize()?;
        Ok(store)
    }

    /// Apply pragmas and schema. Returns whether the FTS index came up; a
    /// build without fts5 degrades to LIKE search instead of failing to open.
    fn initialize(&self) -> crate::error::Result<bool> {
        let mut guard = self.conn.lock().expect("threadlens store mutex poisoned");
        let conn = guard.as_mut().ok_or_else(Self::closed_error)?;

        // Performance pragmas (skip WAL for in-memory — it's auto)
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| {
            StructuredError::new(ErrorKind::Initialization, format!("initialization failed: {e}"))
        })?;
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");

        conn.execute_batch(schema::SCHEMA_SQL).map_err(|e| {
            StructuredError::new(ErrorKind::Initialization, format!("initialization failed: {e}"))
        })?;

        conn.execute(
            "INSERT OR IGNORE INTO threadlens_meta (key, value) VALUES ('schema_version', ?1)",
            params![schema::SCHEMA_VERSION],
        )?;

        match conn.execute_batch(schema::FTS_SQL) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(error = %e, "FTS unavailable, falling back to substring search");
                Ok(false)
            }
        }
    }

    fn closed_error() -> StructuredError {
        StructuredError::new(ErrorKind::Connection, "store handle is closed")
    }

    /// Run `f` against the live connection, or fail if the store is closed.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> crate::error::Result<T>,
    ) -> crate::error::Result<T> {
        let guard = self.conn.lock().expect("threadlens store mutex poisoned");
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(Self::closed_error()),
        }
    }

    /// Raw statement execution for transaction control. Crate-internal: only
    /// the [`TransactionManager`](super::TransactionManager) issues these.
    pub(crate) fn execute_raw(&self, sql: &str) -> crate::error::Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(sql)?;
            Ok(())
        })
    }

    /// Validated row → `Post` conversion at the adapter boundary. A shape
    /// mismatch surfaces as a Query-kind error, never as untyped data.
    fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
        Ok(Post {
            id: row.get("id")?,
            title: row.get("title")?,
            content: row.get("content")?,
            author: row.get("author")?,
            platform: row.get("platform")?,
            source: row.get("source")?,
            score: row.get("score")?,
            num_comments: row.get("num_comments")?,
            created_at: row.get("created_at")?,
            url: row.get("url")?,
        })
    }

    /// `sql`/`param_count` must describe the statement that actually ran,
    /// which for count queries is the count form.
    fn query_error(err: &rusqlite::Error, sql: &str, param_count: usize) -> StructuredError {
        StructuredError::classified(err.to_string())
            .with_context("sql", sql.to_owned())
            .with_context("param_count", param_count)
    }
}

#[async_trait::async_trait]
impl PostStore for SqliteStore {
    async fn query_posts(&self, query: &BuiltQuery) -> crate::error::Result<Vec<Post>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(&query.sql)
                .map_err(|e| Self::query_error(&e, &query.sql, query.params.len()))?;
            let params: Vec<&dyn rusqlite::types::ToSql> = query
                .params
                .iter()
                .map(|p| p as &dyn rusqlite::types::ToSql)
                .collect();
            let posts = stmt
                .query_map(params.as_slice(), Self::row_to_post)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| Self::query_error(&e, &query.sql, query.params.len()))?;
            debug!(rows = posts.len(), "query executed");
            Ok(posts)
        })
    }

    async fn query_first(&self, query: &BuiltQuery) -> crate::error::Result<Option<Post>> {
        self.with_conn(|conn| {
            let params: Vec<&dyn rusqlite::types::ToSql> = query
                .params
                .iter()
                .map(|p| p as &dyn rusqlite::types::ToSql)
                .collect();
            conn.query_row(&query.sql, params.as_slice(), Self::row_to_post)
                .optional()
                .map_err(|e| Self::query_error(&e, &query.sql, query.params.len()))
        })
    }

    async fn count_posts(&self, query: &BuiltQuery) -> crate::error::Result<u64> {
        self.with_conn(|conn| {
            let params: Vec<&dyn rusqlite::types::ToSql> = query
                .count_params
                .iter()
                .map(|p| p as &dyn rusqlite::types::ToSql)
                .collect();
            let count: i64 = conn
                .query_row(&query.count_sql, params.as_slice(), |row| row.get(0))
                .map_err(|e| Self::query_error(&e, &query.count_sql, query.count_params.len()))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    async fn insert_chunk(&self, posts: &[Post]) -> crate::error::Result<u64> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO posts (id, title, content, author, platform, source,
                                    score, num_comments, created_at, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    content = excluded.content,
                    author = excluded.author,
                    platform = excluded.platform,
                    source = excluded.source,
                    score = excluded.score,
                    num_comments = excluded.num_comments,
                    created_at = excluded.created_at,
                    url = excluded.url",
            )?;
            for post in posts {
                stmt.execute(params![
                    post.id,
                    post.title,
                    post.content,
                    post.author,
                    post.platform,
                    post.source,
                    post.score,
                    post.num_comments,
                    post.created_at,
                    post.url,
                ])?;
            }
            Ok(posts.len() as u64)
        })
    }

    async fn export_json(&self) -> crate::error::Result<Vec<u8>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, content, author, platform, source,
                        score, num_comments, created_at, url
                 FROM posts ORDER BY created_at ASC, id ASC",
            )?;
            let posts = stmt
                .query_map([], Self::row_to_post)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())?;
            Ok(serde_json::to_vec(&posts)?)
        })
    }

    async fn stats(&self) -> crate::error::Result<StoreStats> {
        self.with_conn(|conn| {
            let total_posts: u64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| {
                row.get(0)
            })?;
            let distinct_authors: u64 = conn.query_row(
                "SELECT COUNT(DISTINCT author) FROM posts WHERE author IS NOT NULL",
                [],
                |row| row.get(0),
            )?;
            let (earliest_post, latest_post): (Option<i64>, Option<i64>) = conn.query_row(
                "SELECT MIN(created_at), MAX(created_at) FROM posts",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let mut stmt =
                conn.prepare("SELECT platform, COUNT(*) FROM posts GROUP BY platform")?;
            let posts_by_platform: HashMap<String, u64> = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))
                .and_then(|rows| rows.collect::<rusqlite::Result<HashMap<_, _>>>())?;

            let db_size_bytes = self
                .db_path
                .as_ref()
                .and_then(|p| std::fs::metadata(p).ok())
                .map_or(0, |m| m.len());

            Ok(StoreStats {
                total_posts,
                distinct_authors,
                posts_by_platform,
                earliest_post,
                latest_post,
                db_size_bytes,
            })
        })
    }

    fn fts_enabled(&self) -> bool {
        self.fts
    }

    async fn close(&self) -> crate::error::Result<()> {
        let mut guard = self.conn.lock().expect("threadlens store mutex poisoned");
        match guard.take() {
            Some(conn) => {
                // Surfaces a busy handle (open statements) as an error
                // instead of dropping it silently.
                conn.close().map_err(|(_, e)| StructuredError::from(e))
            }
            None => Err(Self::closed_error()),
        }
    }
}
