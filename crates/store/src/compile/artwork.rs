//! The artwork filter compile pass.
//!
//! Emission order is fixed: the `WITH` preprocessing walks id filter, tag
//! filter, then the nested user filter's id and tag filters; the predicate
//! walks the remaining fields in declaration order. The order is part of
//! the compiler's contract - equal filters must produce identical text.

use super::tag::{preprocess_id_filter, preprocess_tag_filter};
use super::text::emit_text_filter;
use super::user::emit_user_predicate;
use super::{Context, Realm};
use crate::sql;
use kura_model::filter::ArtworkFilter;

/// What the compiled query projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Projection {
    /// The full column list, ordered and paged.
    Columns,
    /// `COUNT("id")`; never ordered or paged.
    Count,
}

/// A compiled query plus the paging contract it was compiled under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompiledQuery {
    pub(crate) sql: String,
    /// LIMIT/OFFSET were left out because a post-query existence probe can
    /// still reject rows; the caller pages after that probe instead.
    pub(crate) deferred_paging: bool,
}

const ORIGIN: &str = r#""origin""#;

pub(crate) fn compile_artwork_query(filter: &ArtworkFilter, projection: Projection) -> CompiledQuery {
    let mut cx = Context::default();

    if let Some(ids) = &filter.id_filter {
        preprocess_id_filter(&mut cx, Realm::Artwork, ids);
    }
    if let Some(tags) = &filter.tag_filter {
        preprocess_tag_filter(&mut cx, Realm::Artwork, tags);
    }
    if let Some(user) = &filter.user_filter {
        if let Some(ids) = &user.id_filter {
            preprocess_id_filter(&mut cx, Realm::User, ids);
        }
        if let Some(tags) = &user.tag_filter {
            preprocess_tag_filter(&mut cx, Realm::User, tags);
        }
    }
    if cx.with_open() {
        cx.push(" ");
    }

    cx.push(match projection {
        Projection::Columns => sql::SELECT_ARTWORK_HEAD,
        Projection::Count => sql::COUNT_ARTWORK_HEAD,
    });
    cx.push(" WHERE ");

    let mut and = false;
    cx.emit_chain_predicate(&mut and, ORIGIN, Realm::Artwork);
    cx.emit_hide(&mut and, ORIGIN, filter.hide_filter.as_ref());
    cx.emit_bool(&mut and, ORIGIN, r#""is_officially_removed""#, filter.officially_removed);
    cx.emit_bool(&mut and, ORIGIN, r#""is_bookmarked""#, filter.bookmarked);
    cx.emit_bool(&mut and, ORIGIN, r#""is_visible""#, filter.visible);
    cx.emit_bool(&mut and, ORIGIN, r#""is_muted""#, filter.muted);
    cx.emit_minmax(&mut and, ORIGIN, r#""total_view""#, filter.total_view.as_ref());
    cx.emit_minmax(&mut and, ORIGIN, r#""total_bookmarks""#, filter.total_bookmarks.as_ref());
    cx.emit_minmax(&mut and, ORIGIN, r#""page_count""#, filter.page_count.as_ref());
    cx.emit_minmax(&mut and, ORIGIN, r#""width""#, filter.width.as_ref());
    cx.emit_minmax(&mut and, ORIGIN, r#""height""#, filter.height.as_ref());
    if let Some(kind) = filter.kind {
        cx.and(&mut and);
        cx.push(ORIGIN);
        cx.push(r#"."kind" = "#);
        cx.push_display(kind as u8);
    }
    cx.emit_bool(&mut and, ORIGIN, r#""is_restricted""#, filter.restricted);
    cx.emit_date(&mut and, ORIGIN, filter.date_filter.as_ref());
    if let Some(text) = &filter.text_filter {
        emit_text_filter(&mut cx, &mut and, ORIGIN, text);
    }

    if let Some(user) = &filter.user_filter {
        cx.and(&mut and);
        cx.push(ORIGIN);
        cx.push(r#"."user_id" IN (SELECT "ut"."id" FROM "users" AS "ut" WHERE "#);
        let mut user_and = false;
        emit_user_predicate(&mut cx, &mut user_and, r#""ut""#, user);
        cx.push(")");
    }

    let deferred_paging = filter.defers_paging();
    if matches!(projection, Projection::Columns) {
        cx.emit_order(ORIGIN, filter.order);
        if !deferred_paging {
            cx.emit_limit(filter.count, filter.offset);
        }
    }

    CompiledQuery { sql: cx.into_sql(), deferred_paging }
}
