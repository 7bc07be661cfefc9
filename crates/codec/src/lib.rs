//! Packed binary codec for artwork records.
//!
//! The snapshot path of the archive stores records in a dense little-endian
//! layout: a fixed 64-byte scalar block at known offsets, followed by
//! length-delimited variable fields (tag/tool id runs, strings, the
//! hidden-page run, frame delays). Arrays are raw byte reinterpretations of
//! their elements - the element count is implied by the field's byte
//! length, there is no per-array header.
//!
//! Decoding is strict: truncated input, lengths that do not divide by the
//! element width, invalid UTF-8 and trailing bytes are all typed errors,
//! never silently tolerated.

mod artwork;
pub mod error;
mod hide_run;

pub use crate::artwork::{decode_artwork, encode_artwork};
pub use crate::hide_run::HideRunDecoder;
