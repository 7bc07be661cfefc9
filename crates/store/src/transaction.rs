//! Explicit transaction control over the rented connection.
//!
//! `end_transaction` carries the one deliberate asymmetry of the busy
//! protocol: where ordinary statements retry forever, a commit that keeps
//! hitting contention gives up, rolls back and reports it - retrying a
//! write-intent release indefinitely would pin stale in-memory state.

use crate::error::{ErrorKind, Result};
use crate::exec::{ensure_active, is_busy, pause_on_busy};
use crate::sql;
use crate::store::Store;
use exn::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

impl Store {
    pub async fn begin_transaction(&mut self, cancel: &CancellationToken) -> Result<()> {
        debug!("begin transaction");
        self.execute_plain(sql::BEGIN, cancel).await
    }

    pub async fn begin_exclusive_transaction(&mut self, cancel: &CancellationToken) -> Result<()> {
        debug!("begin exclusive transaction");
        self.execute_plain(sql::BEGIN_EXCLUSIVE, cancel).await
    }

    /// Commit. After the configured number of busy retries this rolls back
    /// instead and surfaces [`ErrorKind::CommitContention`].
    pub async fn end_transaction(&mut self, cancel: &CancellationToken) -> Result<()> {
        debug!("end transaction");
        let mut attempts = 0u32;
        loop {
            ensure_active(cancel)?;
            match sqlx::query(sql::END).execute(&mut *self.conn).await {
                Ok(_) => return Ok(()),
                Err(err) if is_busy(&err) => {
                    if attempts >= self.retry.commit_busy_retries {
                        error!("database busy at commit; rolling back");
                        self.execute_plain(sql::ROLLBACK, cancel).await?;
                        exn::bail!(ErrorKind::CommitContention);
                    }
                    attempts += 1;
                    pause_on_busy(&self.retry, cancel).await?;
                }
                Err(err) => return Err(err).or_raise(|| ErrorKind::Database),
            }
        }
    }

    pub async fn rollback_transaction(&mut self, cancel: &CancellationToken) -> Result<()> {
        debug!("rollback transaction");
        self.execute_plain(sql::ROLLBACK, cancel).await
    }
}
