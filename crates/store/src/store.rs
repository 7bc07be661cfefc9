//! The rented store handle.

use crate::arity::ArityCache;
use crate::error::Result;
use crate::exec::{self, RetryPolicy};
use crate::existence::ArtworkFiles;
use crate::sql;
use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One rented connection plus everything that lives on it.
///
/// A `Store` is exclusively owned by the caller holding it: nothing else
/// steps its statements, and the arity-indexed statement caches are not
/// designed for concurrent growth. Dropping the store returns the
/// connection (and its persistent prepared statements) to the pool;
/// closing the pool finalizes them exactly once.
pub struct Store {
    pub(crate) conn: PoolConnection<Sqlite>,
    pub(crate) retry: RetryPolicy,
    pub(crate) files: Option<Arc<dyn ArtworkFiles>>,
    pub(crate) insert_artwork_tags: ArityCache,
    pub(crate) insert_artwork_tools: ArityCache,
    pub(crate) insert_hidden_pages: ArityCache,
    pub(crate) insert_frames: ArityCache,
    pub(crate) insert_user_tags: ArityCache,
}

impl Store {
    pub(crate) fn new(conn: PoolConnection<Sqlite>, retry: RetryPolicy) -> Self {
        Self {
            conn,
            retry,
            files: None,
            insert_artwork_tags: ArityCache::new(sql::insert_artwork_tags),
            insert_artwork_tools: ArityCache::new(sql::insert_artwork_tools),
            insert_hidden_pages: ArityCache::new(sql::insert_hidden_pages),
            insert_frames: ArityCache::new(sql::insert_frames),
            insert_user_tags: ArityCache::new(sql::insert_user_tags),
        }
    }

    /// Attach the filesystem probe used by file-existence filters. Filters
    /// carrying one are rejected while no source is attached.
    pub fn with_files(mut self, files: Arc<dyn ArtworkFiles>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run a fixed statement that binds a single integer id.
    pub(crate) async fn execute_id(&mut self, stmt: &str, id: i64, cancel: &CancellationToken) -> Result<u64> {
        let result =
            exec::execute(&mut self.conn, &self.retry, cancel, || sqlx::query(stmt).bind(id)).await?;
        Ok(result.rows_affected())
    }

    /// Run a statement that binds nothing at all.
    pub(crate) async fn execute_plain(&mut self, stmt: &str, cancel: &CancellationToken) -> Result<()> {
        exec::execute(&mut self.conn, &self.retry, cancel, || sqlx::query(stmt)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("retry", &self.retry).finish_non_exhaustive()
    }
}
