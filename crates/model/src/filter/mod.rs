//! The declarative query filter model.
//!
//! A filter is plain data describing which records a caller wants back:
//! id sets, tag set algebra, text search, numeric and date ranges, hide
//! rules, ordering and paging, and (for artworks) a nested sub-filter over
//! the owning user. The store's compiler turns one of these into SQL; the
//! structs here carry no behaviour beyond self-validation.
//!
//! Field names mirror the external kebab-case spelling so a filter written
//! as JSON or TOML round-trips unchanged.

mod artwork;
mod existence;
mod hide;
mod id;
mod order;
mod range;
mod tag;
mod text;
mod user;

pub use self::artwork::ArtworkFilter;
pub use self::existence::{CountRule, ExistenceFilter, Relation};
pub use self::hide::HideFilter;
pub use self::id::IdFilter;
pub use self::order::ArtworkOrder;
pub use self::range::{DateTimeFilter, MinMaxFilter};
pub use self::tag::TagFilter;
pub use self::text::TextFilter;
pub use self::user::UserFilter;

pub(crate) fn default_true() -> bool {
    true
}
