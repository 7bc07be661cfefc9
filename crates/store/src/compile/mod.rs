//! The filter-to-SQL compiler.
//!
//! A filter compiles into (a) zero or more named temporary result sets
//! carried in a single `WITH` prefix and (b) a predicate over the base
//! table that references them. All state lives in an explicit [`Context`]
//! threaded through the compile functions, so equal filters always produce
//! byte-identical text - a requirement for both statement caching and the
//! golden tests.
//!
//! Values are embedded as escaped inline literals rather than bound
//! parameters: the engine's planner folds literals when choosing indexes
//! for these one-off query shapes, and the shapes themselves vary too much
//! to make parameter reuse worthwhile.
//!
//! Alias namespaces: artwork intersect `i`, artwork except `e`, user
//! intersect `p`, user except `q`, each suffixed with a counter that only
//! grows during one compile pass. Full-text companion sets double the
//! letter (`ii3` feeds `i3`).

mod artwork;
mod tag;
mod text;
mod user;

pub(crate) use self::artwork::{CompiledQuery, Projection, compile_artwork_query};
pub(crate) use self::user::compile_user_query;

use kura_model::HideReason;
use kura_model::filter::{ArtworkOrder, DateTimeFilter, HideFilter, MinMaxFilter};
use std::fmt::Write;

/// Which record realm a namespace belongs to; artwork and user sets use
/// disjoint letters so the nested sub-filter can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Realm {
    Artwork,
    User,
}

impl Realm {
    fn intersect_letter(self) -> char {
        match self {
            Self::Artwork => 'i',
            Self::User => 'p',
        }
    }

    fn except_letter(self) -> char {
        match self {
            Self::Artwork => 'e',
            Self::User => 'q',
        }
    }

    fn tag_source(self) -> TagSource {
        match self {
            Self::Artwork => TagSource {
                select_head: r#"SELECT "ct"."id" FROM "artwork_tags" AS "ct""#,
                // Kind 0 marks a locally-faked tag; membership tests must
                // not see it.
                where_prefix: r#" WHERE "ct"."value_kind" <> 0 AND "#,
            },
            Self::User => TagSource {
                select_head: r#"SELECT "ct"."id" FROM "user_tags" AS "ct""#,
                where_prefix: r#" WHERE "#,
            },
        }
    }
}

/// The membership-test scaffolding of one realm's cross table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TagSource {
    pub(crate) select_head: &'static str,
    pub(crate) where_prefix: &'static str,
}

/// Shared by both realms: the tag-value join.
pub(crate) const JOIN_TAGS: &str = r#" INNER JOIN "tags" AS "tt" ON "ct"."tag_id" = "tt"."id""#;

/// Monotonic alias numbering within one namespace of one compile pass.
#[derive(Debug, Default)]
pub(crate) struct AliasCounter {
    next: u32,
}

impl AliasCounter {
    fn bump(&mut self) -> u32 {
        let index = self.next;
        self.next += 1;
        index
    }
}

/// Per-realm compile state: the counters plus the aliases that currently
/// *represent* each side. They are tracked separately from the counters
/// because except-mode scratch sets (absorbed into the intersect chain) get
/// numbered without ever becoming a result.
#[derive(Debug, Default)]
struct RealmState {
    intersect: AliasCounter,
    except: AliasCounter,
    intersect_result: Option<u32>,
    except_result: Option<u32>,
}

/// Compiler context: the output buffer, the WITH-clause comma state and the
/// alias bookkeeping of both realms.
#[derive(Debug, Default)]
pub(crate) struct Context {
    sql: String,
    with_open: bool,
    artwork: RealmState,
    user: RealmState,
}

impl Context {
    fn realm(&self, realm: Realm) -> &RealmState {
        match realm {
            Realm::Artwork => &self.artwork,
            Realm::User => &self.user,
        }
    }

    fn realm_mut(&mut self, realm: Realm) -> &mut RealmState {
        match realm {
            Realm::Artwork => &mut self.artwork,
            Realm::User => &mut self.user,
        }
    }

    pub(crate) fn bump_intersect(&mut self, realm: Realm) -> u32 {
        self.realm_mut(realm).intersect.bump()
    }

    pub(crate) fn bump_except(&mut self, realm: Realm) -> u32 {
        self.realm_mut(realm).except.bump()
    }

    pub(crate) fn intersect_result(&self, realm: Realm) -> Option<u32> {
        self.realm(realm).intersect_result
    }

    pub(crate) fn set_intersect_result(&mut self, realm: Realm, index: u32) {
        self.realm_mut(realm).intersect_result = Some(index);
    }

    pub(crate) fn except_result(&self, realm: Realm) -> Option<u32> {
        self.realm(realm).except_result
    }

    pub(crate) fn set_except_result(&mut self, realm: Realm, index: u32) {
        self.realm_mut(realm).except_result = Some(index);
    }

    pub(crate) fn into_sql(self) -> String {
        self.sql
    }

    // -- raw text ----------------------------------------------------------

    pub(crate) fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    pub(crate) fn push_display(&mut self, value: impl std::fmt::Display) {
        // Writing into a String cannot fail.
        let _ = write!(self.sql, "{value}");
    }

    /// `'text'` with embedded single quotes doubled.
    pub(crate) fn push_single_quoted(&mut self, text: &str) {
        self.sql.push('\'');
        self.push_single_quoted_body(text);
        self.sql.push('\'');
    }

    pub(crate) fn push_single_quoted_body(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\'' {
                self.sql.push_str("''");
            } else {
                self.sql.push(ch);
            }
        }
    }

    /// `'%text%'` for LIKE, same quote doubling.
    pub(crate) fn push_like_pattern(&mut self, text: &str) {
        self.sql.push_str("'%");
        self.push_single_quoted_body(text);
        self.sql.push_str("%'");
    }

    /// One token inside an outer single-quoted MATCH expression: wrapped in
    /// double quotes, with embedded `"` doubled for the full-text parser
    /// and embedded `'` doubled for the surrounding SQL literal.
    pub(crate) fn push_fts_token(&mut self, text: &str) {
        self.sql.push('"');
        for ch in text.chars() {
            match ch {
                '"' => self.sql.push_str("\"\""),
                '\'' => self.sql.push_str("''"),
                _ => self.sql.push(ch),
            }
        }
        self.sql.push('"');
    }

    // -- WITH clause -------------------------------------------------------

    pub(crate) fn with_or_comma(&mut self) {
        if self.with_open {
            self.sql.push_str(", ");
        } else {
            self.sql.push_str("WITH ");
            self.with_open = true;
        }
    }

    pub(crate) fn with_open(&self) -> bool {
        self.with_open
    }

    /// `"i3"` - one named set.
    pub(crate) fn push_alias(&mut self, letter: char, index: u32) {
        self.sql.push('"');
        self.sql.push(letter);
        self.push_display(index);
        self.sql.push('"');
    }

    /// `"ii3"` - the full-text companion of `"i3"`.
    pub(crate) fn push_companion(&mut self, letter: char, index: u32) {
        self.sql.push('"');
        self.sql.push(letter);
        self.sql.push(letter);
        self.push_display(index);
        self.sql.push('"');
    }

    /// `VALUES (1), (2)`.
    pub(crate) fn push_values(&mut self, ids: &[u64]) {
        self.sql.push_str("VALUES ");
        for (i, id) in ids.iter().enumerate() {
            if i != 0 {
                self.sql.push_str(", ");
            }
            self.sql.push('(');
            self.push_display(id);
            self.sql.push(')');
        }
    }

    // -- predicate conjunction --------------------------------------------

    pub(crate) fn and(&mut self, and: &mut bool) {
        if *and {
            self.sql.push_str(" AND ");
        } else {
            *and = true;
        }
    }

    /// The chain results as the base predicate: membership of the final
    /// intersect set, exclusion from the final except set, or both.
    pub(crate) fn emit_chain_predicate(&mut self, and: &mut bool, origin: &str, realm: Realm) {
        if let Some(index) = self.intersect_result(realm) {
            self.and(and);
            self.push(origin);
            self.push(r#"."id" IN "#);
            self.push_alias(realm.intersect_letter(), index);
        }
        if let Some(index) = self.except_result(realm) {
            self.and(and);
            self.push(origin);
            self.push(r#"."id" NOT IN "#);
            self.push_alias(realm.except_letter(), index);
        }
    }

    /// Hide rules; an absent filter means "not hidden only".
    pub(crate) fn emit_hide(&mut self, and: &mut bool, origin: &str, filter: Option<&HideFilter>) {
        match filter {
            None => {
                self.and(and);
                self.push(origin);
                self.push(r#"."hide_reason" = 0"#);
            }
            Some(filter) => {
                if !filter.allow.is_empty() {
                    self.and(and);
                    self.push(origin);
                    self.push(r#"."hide_reason" IN ("#);
                    self.push_reasons(&filter.allow);
                    self.push(")");
                } else if !filter.disallow.is_empty() {
                    self.and(and);
                    self.push(origin);
                    self.push(r#"."hide_reason" NOT IN ("#);
                    self.push_reasons(&filter.disallow);
                    self.push(")");
                }
            }
        }
    }

    fn push_reasons(&mut self, reasons: &[HideReason]) {
        for (i, reason) in reasons.iter().enumerate() {
            if i != 0 {
                self.push(", ");
            }
            self.push_display(*reason as u8);
        }
    }

    pub(crate) fn emit_bool(&mut self, and: &mut bool, origin: &str, column: &str, value: Option<bool>) {
        let Some(value) = value else {
            return;
        };
        self.and(and);
        self.push(origin);
        self.push(".");
        self.push(column);
        self.push(" = ");
        self.push(if value { "1" } else { "0" });
    }

    pub(crate) fn emit_minmax(&mut self, and: &mut bool, origin: &str, column: &str, filter: Option<&MinMaxFilter>) {
        let Some(filter) = filter else {
            return;
        };
        if let Some(max) = filter.max {
            self.and(and);
            if max > 0 {
                if filter.min.is_some_and(|min| min > 0) {
                    self.push(origin);
                    self.push(".");
                    self.push(column);
                    self.push(" BETWEEN ");
                    self.push_display(filter.min.unwrap_or(0));
                    self.push(" AND ");
                    self.push_display(max);
                } else {
                    self.push(origin);
                    self.push(".");
                    self.push(column);
                    self.push(" <= ");
                    self.push_display(max);
                }
            } else {
                // A max of exactly zero short-circuits to constant false.
                self.push("0");
            }
        } else if filter.min.is_some_and(|min| min > 0) {
            self.and(and);
            self.push(origin);
            self.push(".");
            self.push(column);
            self.push(" >= ");
            self.push_display(filter.min.unwrap_or(0));
        }
    }

    /// Creation-date range through `unixepoch()` so the comparison is a
    /// portable integer one regardless of the stored text format.
    pub(crate) fn emit_date(&mut self, and: &mut bool, origin: &str, filter: Option<&DateTimeFilter>) {
        let Some(filter) = filter else {
            return;
        };
        let since = filter.since.map(|dt| dt.unix_timestamp());
        let until = filter.until.map(|dt| dt.unix_timestamp());
        match (since, until) {
            (Some(since), Some(until)) => {
                self.and(and);
                self.push_unixepoch(origin);
                self.push(" BETWEEN ");
                self.push_display(since);
                self.push(" AND ");
                self.push_display(until);
            }
            (Some(since), None) => {
                self.and(and);
                self.push_unixepoch(origin);
                self.push(" >= ");
                self.push_display(since);
            }
            (None, Some(until)) => {
                self.and(and);
                self.push_unixepoch(origin);
                self.push(" <= ");
                self.push_display(until);
            }
            (None, None) => {}
        }
    }

    fn push_unixepoch(&mut self, origin: &str) {
        self.push("unixepoch(");
        self.push(origin);
        self.push(r#"."created_at")"#);
    }

    pub(crate) fn emit_order(&mut self, origin: &str, order: ArtworkOrder) {
        let column = match order {
            ArtworkOrder::None => return,
            ArtworkOrder::Id | ArtworkOrder::ReverseId => r#""id""#,
            ArtworkOrder::View | ArtworkOrder::ReverseView => r#""total_view""#,
            ArtworkOrder::Bookmarks | ArtworkOrder::ReverseBookmarks => r#""total_bookmarks""#,
            ArtworkOrder::UserId | ArtworkOrder::ReverseUserId => r#""user_id""#,
        };
        let direction = match order {
            ArtworkOrder::None => return,
            ArtworkOrder::Id | ArtworkOrder::View | ArtworkOrder::Bookmarks | ArtworkOrder::UserId => " ASC",
            ArtworkOrder::ReverseId
            | ArtworkOrder::ReverseView
            | ArtworkOrder::ReverseBookmarks
            | ArtworkOrder::ReverseUserId => " DESC",
        };
        self.push(" ORDER BY ");
        self.push(origin);
        self.push(".");
        self.push(column);
        self.push(direction);
    }

    pub(crate) fn emit_limit(&mut self, count: Option<u32>, offset: u32) {
        if let Some(count) = count {
            self.push(" LIMIT ");
            self.push_display(count);
        }
        if offset > 0 {
            self.push(" OFFSET ");
            self.push_display(offset);
        }
    }
}

/// Partition partial terms by the three-character rule, preserving relative
/// order, then sort each side longest-first (stable) so emission order is a
/// pure function of the filter value.
pub(crate) fn divide_partials<'a>(terms: &'a [String]) -> (Vec<&'a str>, Vec<&'a str>) {
    let mut longs: Vec<&str> = Vec::new();
    let mut shorts: Vec<&str> = Vec::new();
    for term in terms {
        if term.chars().count() >= 3 {
            longs.push(term);
        } else {
            shorts.push(term);
        }
    }
    longs.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    shorts.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    (longs, shorts)
}
