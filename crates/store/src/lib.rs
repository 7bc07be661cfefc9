//! SQLite metadata store for the kura artwork archive.
//!
//! The store answers declarative [`kura_model::filter`] queries by
//! compiling them into SQL (`WITH`-chained temporary result sets realizing
//! the tag set algebra, plus a predicate over the base table), executing
//! them through a busy-retrying execution engine on a rented pooled
//! connection, and re-querying each matching id into a full in-memory
//! aggregate.
//!
//! # Usage
//!
//! ```no_run
//! # async fn demo() -> kura_store::error::Result<()> {
//! use kura_model::filter::ArtworkFilter;
//! use futures::TryStreamExt;
//! use tokio_util::sync::CancellationToken;
//!
//! let db = kura_store::Database::connect("kura.db").await?;
//! let mut store = db.store().await?;
//! let cancel = CancellationToken::new();
//!
//! let filter = ArtworkFilter::default();
//! let artworks: Vec<_> = {
//!     let stream = store.filter_artworks(&filter, &cancel);
//!     futures::pin_mut!(stream);
//!     stream.try_collect().await?
//! };
//! # drop(artworks);
//! # Ok(())
//! # }
//! ```

mod arity;
mod artwork;
mod compile;
mod count;
mod db;
pub mod error;
mod exec;
mod existence;
mod sql;
mod store;
mod tagtool;
mod transaction;
mod user;

pub use crate::count::CountKind;
pub use crate::db::Database;
pub use crate::exec::RetryPolicy;
pub use crate::existence::{ArtworkFiles, LibraryFiles};
pub use crate::store::Store;
