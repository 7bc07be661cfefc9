//! Store error types, following the workspace `exn` + `derive_more` pattern.
//!
//! Busy is deliberately *not* an error kind: the execution engine absorbs it
//! by waiting and retrying. What can surface here is everything the retry
//! loop does not absorb.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The engine reported a non-busy failure; the driver diagnostic rides
    /// along as the source.
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A filter combination that can never be compiled; a programming
    /// error, surfaced immediately and never retried.
    #[display("malformed filter: {_0}")]
    MalformedFilter(#[error(not(source))] &'static str),
    /// The operation's cancellation signal fired between steps.
    #[display("operation cancelled")]
    Cancelled,
    /// Commit kept hitting contention past its configured retries and was
    /// rolled back.
    #[display("transaction commit rolled back: database busy")]
    CommitContention,
    /// A value does not fit the column it is bound to (or vice versa).
    #[display("invalid data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CommitContention)
    }
}

/// Raise a kind as an `Err` value, for positions where `exn::bail!` cannot
/// be used directly (e.g. inside stream generators).
pub(crate) fn raise<T>(kind: ErrorKind) -> Result<T> {
    exn::bail!(kind)
}
