//! The user filter compile pass: standalone (for user enumeration) and as
//! the predicate body of the correlated sub-query inside an artwork filter.

use super::tag::{preprocess_id_filter, preprocess_tag_filter};
use super::{Context, Realm};
use crate::sql;
use kura_model::filter::{TextFilter, UserFilter};

const ORIGIN: &str = r#""origin""#;

pub(crate) fn compile_user_query(filter: &UserFilter) -> String {
    let mut cx = Context::default();
    if let Some(ids) = &filter.id_filter {
        preprocess_id_filter(&mut cx, Realm::User, ids);
    }
    if let Some(tags) = &filter.tag_filter {
        preprocess_tag_filter(&mut cx, Realm::User, tags);
    }
    if cx.with_open() {
        cx.push(" ");
    }
    cx.push(sql::SELECT_USER_HEAD);
    cx.push(" WHERE ");
    let mut and = false;
    emit_user_predicate(&mut cx, &mut and, ORIGIN, filter);
    cx.into_sql()
}

/// The predicate fields shared by both uses. The caller is responsible for
/// having preprocessed the filter's id/tag sets into the user namespaces.
pub(crate) fn emit_user_predicate(cx: &mut Context, and: &mut bool, origin: &str, filter: &UserFilter) {
    cx.emit_chain_predicate(and, origin, Realm::User);
    cx.emit_hide(and, origin, filter.hide_filter.as_ref());
    cx.emit_bool(and, origin, r#""is_followed""#, filter.followed);
    cx.emit_bool(and, origin, r#""is_muted""#, filter.muted);
    if let Some(name) = &filter.name_filter {
        emit_name_filter(cx, and, origin, name);
    }
}

/// Users carry a single searchable text column, so text search stays plain:
/// equality, inequality and LIKE - no full-text index involved.
fn emit_name_filter(cx: &mut Context, and: &mut bool, origin: &str, filter: &TextFilter) {
    if let Some(exact) = filter.exact.as_deref().filter(|s| !s.is_empty()) {
        cx.and(and);
        cx.push(origin);
        cx.push(r#"."name" = "#);
        cx.push_single_quoted(exact);
    }
    if let Some(ignore) = filter.ignore_exact.as_deref().filter(|s| !s.is_empty()) {
        cx.and(and);
        cx.push(origin);
        cx.push(r#"."name" <> "#);
        cx.push_single_quoted(ignore);
    }
    if !filter.partials.is_empty() {
        cx.and(and);
        cx.push("(");
        push_name_likes(cx, origin, &filter.partials, filter.partial_or);
        cx.push(")");
    }
    if !filter.ignore_partials.is_empty() {
        cx.and(and);
        cx.push("NOT (");
        push_name_likes(cx, origin, &filter.ignore_partials, filter.ignore_partial_or);
        cx.push(")");
    }
}

fn push_name_likes(cx: &mut Context, origin: &str, terms: &[String], or: bool) {
    for (i, term) in terms.iter().enumerate() {
        if i != 0 {
            cx.push(if or { " OR " } else { " AND " });
        }
        cx.push(origin);
        cx.push(r#"."name" LIKE "#);
        cx.push_like_pattern(term);
    }
}
