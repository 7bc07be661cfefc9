//! Free-text predicates over the artwork text index.
//!
//! Partial terms run inside one `EXISTS` sub-query against the FTS table
//! (rowid-joined to the base row), with the positive and ignore groups as
//! sibling sub-predicates; the ignore group is negated by wrapping it in
//! `NOT (...)`. Exact comparisons go straight against the base columns.

use super::{Context, divide_partials};
use kura_model::filter::TextFilter;

pub(crate) fn emit_text_filter(cx: &mut Context, and: &mut bool, origin: &str, filter: &TextFilter) {
    let has_partials = !filter.partials.is_empty();
    let has_ignore_partials = !filter.ignore_partials.is_empty();

    if has_partials || has_ignore_partials {
        cx.and(and);
        cx.push(r#"EXISTS (SELECT * FROM "artwork_fts" AS "t" WHERE "t"."rowid" = "#);
        cx.push(origin);
        cx.push(r#"."id""#);
        if has_partials {
            cx.push(" AND (");
            partial_predicate(cx, &filter.partials, filter.partial_or);
            cx.push(")");
        }
        if has_ignore_partials {
            cx.push(" AND NOT (");
            partial_predicate(cx, &filter.ignore_partials, filter.ignore_partial_or);
            cx.push(")");
        }
        cx.push(")");
    }

    if let Some(exact) = filter.exact.as_deref().filter(|s| !s.is_empty()) {
        cx.and(and);
        cx.push("(");
        exact_predicate(cx, origin, exact);
        cx.push(")");
    }

    if let Some(ignore) = filter.ignore_exact.as_deref().filter(|s| !s.is_empty()) {
        cx.and(and);
        cx.push("NOT (");
        exact_predicate(cx, origin, ignore);
        cx.push(")");
    }
}

/// Split into token-match (3+ chars) and wildcard (shorter) sub-predicates,
/// joined by the group's own or/and flag.
fn partial_predicate(cx: &mut Context, terms: &[String], or: bool) {
    let (longs, shorts) = divide_partials(terms);
    if !longs.is_empty() {
        match_predicate(cx, &longs, or);
        if !shorts.is_empty() {
            cx.push(if or { " OR " } else { " AND " });
            like_predicate(cx, &shorts, or);
        }
    } else {
        like_predicate(cx, &shorts, or);
    }
}

fn match_predicate(cx: &mut Context, terms: &[&str], or: bool) {
    cx.push(r#"("t" MATCH "#);
    if let [term] = terms {
        cx.push_single_quoted(term);
    } else {
        cx.push("'");
        for (i, term) in terms.iter().enumerate() {
            if i != 0 {
                cx.push(if or { " OR " } else { " AND " });
            }
            cx.push_fts_token(term);
        }
        cx.push("'");
    }
    cx.push(")");
}

/// Wildcard terms joined by the group flag; a term matches when *any* of
/// the three text columns contains it.
fn like_predicate(cx: &mut Context, terms: &[&str], or: bool) {
    cx.push("(");
    for (i, term) in terms.iter().enumerate() {
        if i != 0 {
            cx.push(if or { " OR " } else { " AND " });
        }
        cx.push("(");
        cx.push(r#""t"."title" LIKE "#);
        cx.push_like_pattern(term);
        cx.push(" OR ");
        cx.push(r#""t"."caption" LIKE "#);
        cx.push_like_pattern(term);
        cx.push(" OR ");
        cx.push(r#""t"."memo" LIKE "#);
        cx.push_like_pattern(term);
        cx.push(")");
    }
    cx.push(")");
}

fn exact_predicate(cx: &mut Context, origin: &str, text: &str) {
    cx.push(origin);
    cx.push(r#"."title" = "#);
    cx.push_single_quoted(text);
    cx.push(" OR ");
    cx.push(origin);
    cx.push(r#"."caption" = "#);
    cx.push_single_quoted(text);
    cx.push(" OR ");
    cx.push(origin);
    cx.push(r#"."memo" = "#);
    cx.push_single_quoted(text);
}
