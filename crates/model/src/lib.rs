//! Domain records for the kura artwork archive.
//!
//! This crate is pure data: the persisted records ([`Artwork`], [`User`]),
//! the enums they carry, and the transient [`filter`] model that callers
//! hand to the store to describe a query. Nothing in here talks to the
//! database - the store crate compiles filters into SQL and maps rows back
//! into these types.

mod artwork;
pub mod filter;
mod hide;
mod user;

pub use crate::artwork::{
    Artwork, ArtworkFlags, ArtworkKind, ExtensionKind, UnknownArtworkKind, UnknownExtensionKind, VisiblePages,
};
pub use crate::hide::{HideReason, UnknownHideReason};
pub use crate::user::{User, UserProfile, UserWorkspace};
