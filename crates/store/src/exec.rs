//! Execution engine plumbing: busy classification, the wait-and-retry
//! pause, cooperative cancellation checks and typed column readers.
//!
//! The protocol around every blocking engine call is the same: run the
//! statement; on a busy status wait one fixed interval (yielding the task)
//! and try again, unless the operation's cancellation token fired, in which
//! case stop; on any other failure surface the driver's diagnostic. There
//! is no backoff and no retry cap - for a single-writer local store the
//! writer always finishes, and cheap statements are cheap to retry.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::time::Duration;
use time::OffsetDateTime;
use time::UtcDateTime;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// How the engine waits out contention.
///
/// `busy_wait` applies to every statement; `commit_busy_retries` is the one
/// asymmetry - commit gives up after that many additional attempts and
/// rolls back instead of retrying forever, because holding stale in-memory
/// state behind an unreleasable write intent is worse than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub busy_wait: Duration,
    pub commit_busy_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            busy_wait: Duration::from_secs(1),
            commit_busy_retries: 0,
        }
    }
}

/// Whether an engine failure is transient lock contention.
pub(crate) fn is_busy(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => {
            // SQLITE_BUSY (5) and SQLITE_LOCKED (6) plus their extended
            // codes (low byte is the primary code).
            matches!(db.code().as_deref(), Some("5" | "6" | "261" | "262" | "517" | "518"))
        }
        _ => false,
    }
}

/// Wait out one busy interval, or stop if the operation was cancelled.
pub(crate) async fn pause_on_busy(retry: &RetryPolicy, cancel: &CancellationToken) -> Result<()> {
    trace!("engine busy, waiting one interval");
    tokio::select! {
        _ = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
        _ = tokio::time::sleep(retry.busy_wait) => Ok(()),
    }
}

/// Cooperative cancellation check between statement steps.
pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        exn::bail!(ErrorKind::Cancelled);
    }
    Ok(())
}

type Query<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

/// Run a statement to completion under the busy-retry protocol. The query
/// is rebuilt by `make` for every attempt.
pub(crate) async fn execute<'q, F>(
    conn: &mut sqlx::SqliteConnection,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
    mut make: F,
) -> Result<sqlx::sqlite::SqliteQueryResult>
where
    F: FnMut() -> Query<'q>,
{
    loop {
        ensure_active(cancel)?;
        match make().execute(&mut *conn).await {
            Ok(result) => return Ok(result),
            Err(error) if is_busy(&error) => pause_on_busy(retry, cancel).await?,
            Err(error) => return Err(error).or_raise(|| ErrorKind::Database),
        }
    }
}

/// Fetch every row under the busy-retry protocol.
pub(crate) async fn fetch_all<'q, F>(
    conn: &mut sqlx::SqliteConnection,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
    mut make: F,
) -> Result<Vec<SqliteRow>>
where
    F: FnMut() -> Query<'q>,
{
    loop {
        ensure_active(cancel)?;
        match make().fetch_all(&mut *conn).await {
            Ok(rows) => return Ok(rows),
            Err(error) if is_busy(&error) => pause_on_busy(retry, cancel).await?,
            Err(error) => return Err(error).or_raise(|| ErrorKind::Database),
        }
    }
}

/// Fetch at most one row under the busy-retry protocol.
pub(crate) async fn fetch_optional<'q, F>(
    conn: &mut sqlx::SqliteConnection,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
    mut make: F,
) -> Result<Option<SqliteRow>>
where
    F: FnMut() -> Query<'q>,
{
    loop {
        ensure_active(cancel)?;
        match make().fetch_optional(&mut *conn).await {
            Ok(row) => return Ok(row),
            Err(error) if is_busy(&error) => pause_on_busy(retry, cancel).await?,
            Err(error) => return Err(error).or_raise(|| ErrorKind::Database),
        }
    }
}

// Typed column readers. SQLite hands back signed 64-bit integers; the
// narrowing conversions are checked because a mis-decoded id is corruption,
// not a recoverable condition.

pub(crate) fn col_u64(row: &SqliteRow, index: usize, what: &'static str) -> Result<u64> {
    let value: i64 = row.try_get(index).or_raise(|| ErrorKind::Database)?;
    u64::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
}

pub(crate) fn col_u32(row: &SqliteRow, index: usize, what: &'static str) -> Result<u32> {
    let value: i64 = row.try_get(index).or_raise(|| ErrorKind::Database)?;
    u32::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
}

pub(crate) fn col_u16(row: &SqliteRow, index: usize, what: &'static str) -> Result<u16> {
    let value: i64 = row.try_get(index).or_raise(|| ErrorKind::Database)?;
    u16::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
}

pub(crate) fn col_u8(row: &SqliteRow, index: usize, what: &'static str) -> Result<u8> {
    let value: i64 = row.try_get(index).or_raise(|| ErrorKind::Database)?;
    u8::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
}

pub(crate) fn col_bool(row: &SqliteRow, index: usize) -> Result<bool> {
    row.try_get::<bool, _>(index).or_raise(|| ErrorKind::Database)
}

pub(crate) fn col_str(row: &SqliteRow, index: usize) -> Result<String> {
    row.try_get::<String, _>(index).or_raise(|| ErrorKind::Database)
}

pub(crate) fn col_opt_str(row: &SqliteRow, index: usize) -> Result<Option<String>> {
    row.try_get::<Option<String>, _>(index).or_raise(|| ErrorKind::Database)
}

pub(crate) fn col_datetime(row: &SqliteRow, index: usize, what: &'static str) -> Result<UtcDateTime> {
    let text = col_str(row, index)?;
    datetime_from_sql(&text, what)
}

/// Timestamps are stored as RFC 3339 text so `unixepoch()` can fold them in
/// compiled predicates. Sub-second precision is deliberately dropped.
pub(crate) fn datetime_to_sql(value: UtcDateTime, what: &'static str) -> Result<String> {
    OffsetDateTime::from_unix_timestamp(value.unix_timestamp())
        .or_raise(|| ErrorKind::InvalidData(what))?
        .format(&Rfc3339)
        .or_raise(|| ErrorKind::InvalidData(what))
}

pub(crate) fn datetime_from_sql(text: &str, what: &'static str) -> Result<UtcDateTime> {
    let parsed = OffsetDateTime::parse(text, &Rfc3339).or_raise(|| ErrorKind::InvalidData(what))?;
    UtcDateTime::from_unix_timestamp(parsed.unix_timestamp()).or_raise(|| ErrorKind::InvalidData(what))
}

/// Checked u64 -> SQLite integer bind.
pub(crate) fn bind_u64(value: u64, what: &'static str) -> Result<i64> {
    i64::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_round_trip() {
        let original = UtcDateTime::from_unix_timestamp(1_700_000_123).unwrap();
        let text = datetime_to_sql(original, "ts").unwrap();
        assert!(text.ends_with('Z'));
        let back = datetime_from_sql(&text, "ts").unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_non_database_errors_are_not_busy() {
        assert!(!is_busy(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn test_pause_returns_cancelled_when_token_fires() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let retry = RetryPolicy {
            busy_wait: Duration::from_secs(3600),
            commit_busy_retries: 0,
        };
        let start = std::time::Instant::now();
        assert!(pause_on_busy(&retry, &cancel).await.is_err());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
