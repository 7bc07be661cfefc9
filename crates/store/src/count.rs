//! Record counting, plain and filtered.

use crate::compile::{Projection, compile_artwork_query};
use crate::error::Result;
use crate::exec;
use crate::sql;
use crate::store::Store;
use kura_model::filter::ArtworkFilter;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Which table a plain count runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountKind {
    Artworks,
    Users,
    Tags,
    Tools,
}

impl Store {
    /// Total number of records of one kind.
    pub async fn count(&mut self, kind: CountKind, cancel: &CancellationToken) -> Result<u64> {
        let stmt = match kind {
            CountKind::Artworks => sql::COUNT_ARTWORKS,
            CountKind::Users => sql::COUNT_USERS,
            CountKind::Tags => sql::COUNT_TAGS,
            CountKind::Tools => sql::COUNT_TOOLS,
        };
        let row = exec::fetch_optional(&mut self.conn, &self.retry, cancel, || sqlx::query(stmt)).await?;
        match row {
            Some(row) => exec::col_u64(&row, 0, "count"),
            None => Ok(0),
        }
    }

    /// Number of artworks matching the filter's *relational* predicate.
    ///
    /// Paging never applies to a count, and a file-existence post-filter is
    /// not consulted here: counting the post-filtered set requires walking
    /// it, which is what [`Store::filter_artworks`] is for.
    pub async fn count_artworks(&mut self, filter: &ArtworkFilter, cancel: &CancellationToken) -> Result<u64> {
        let compiled = compile_artwork_query(filter, Projection::Count);
        debug!(query = %compiled.sql, "compiled artwork count");
        let row = exec::fetch_optional(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(&compiled.sql).persistent(false)
        })
        .await?;
        match row {
            Some(row) => exec::col_u64(&row, 0, "count"),
            None => Ok(0),
        }
    }
}
