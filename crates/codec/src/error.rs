//! Codec error types, following the workspace `exn` + `derive_more` pattern.

use derive_more::{Display, Error};

/// A codec error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong while decoding a packed record.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Input ended before the field that was being read.
    #[display("truncated input reading {_0}")]
    Truncated(#[error(not(source))] &'static str),
    /// A field's byte length is not a multiple of its element width.
    #[display("misaligned byte length for {_0}")]
    Misaligned(#[error(not(source))] &'static str),
    /// A required field carried the absent sentinel.
    #[display("required field {_0} marked absent")]
    Absent(#[error(not(source))] &'static str),
    /// A string field was not valid UTF-8.
    #[display("invalid utf-8 in {_0}")]
    Utf8(#[error(not(source))] &'static str),
    /// An enum byte had no defined meaning.
    #[display("invalid value {_1} for {_0}")]
    InvalidValue(#[error(not(source))] &'static str, u8),
    /// Bytes remained after the final field.
    #[display("trailing bytes after record")]
    Trailing,
    /// A field length claims more bytes than the input holds.
    #[display("field length for {_0} exceeds remaining input")]
    LengthOverrun(#[error(not(source))] &'static str),
    /// A stored timestamp does not map to a representable instant.
    #[display("timestamp out of range")]
    Timestamp,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed. Corrupt input never heals.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
