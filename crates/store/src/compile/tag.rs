//! Tag set algebra as chained temporary result sets.
//!
//! A tag group renders into `WITH` members, each one built from the
//! previous member of its chain combined with one new membership test, so
//! an arbitrary AND/OR mix of exact and partial conditions collapses into a
//! single final alias per side. The except side subtracts: standalone it
//! becomes the realm's exclusion set (`NOT IN`), and when an intersect
//! chain already exists it is absorbed into that chain as one more
//! intersect alias via `EXCEPT` - deliberately avoiding a separate final
//! combination step, and keeping alias numbering stable for the planner.

use super::{Context, JOIN_TAGS, Realm, divide_partials};
use kura_model::filter::{IdFilter, TagFilter};

/// Which namespace of a realm a chain is being built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Intersect,
    Except,
}

pub(crate) fn preprocess_id_filter(cx: &mut Context, realm: Realm, filter: &IdFilter) {
    if !filter.ids.is_empty() {
        let index = cx.bump_intersect(realm);
        cx.with_or_comma();
        cx.push_alias(realm.intersect_letter(), index);
        cx.push(r#"("id") AS ("#);
        cx.push_values(&filter.ids);
        cx.push(")");
        cx.set_intersect_result(realm, index);
    }

    if !filter.ignore_ids.is_empty() {
        match cx.intersect_result(realm) {
            // Subtract straight out of the existing chain.
            Some(previous) => {
                let index = cx.bump_intersect(realm);
                cx.with_or_comma();
                cx.push_alias(realm.intersect_letter(), index);
                cx.push(r#"("id") AS (SELECT "id" FROM "#);
                cx.push_alias(realm.intersect_letter(), previous);
                cx.push(" EXCEPT ");
                cx.push_values(&filter.ignore_ids);
                cx.push(")");
                cx.set_intersect_result(realm, index);
            }
            // No chain yet: the ignore list becomes (part of) the realm's
            // exclusion set.
            None => {
                let index = cx.bump_except(realm);
                cx.with_or_comma();
                cx.push_alias(realm.except_letter(), index);
                cx.push(r#"("id") AS ("#);
                cx.push_values(&filter.ignore_ids);
                cx.push(")");
                merge_except_result(cx, realm, index);
            }
        }
    }
}

pub(crate) fn preprocess_tag_filter(cx: &mut Context, realm: Realm, filter: &TagFilter) {
    if filter.has_intersect() {
        let start = cx.intersect_result(realm);
        let last = if filter.or {
            Some(or_member(cx, realm, Side::Intersect, start, &filter.exacts, &filter.partials))
        } else {
            and_chain(cx, realm, Side::Intersect, start, &filter.exacts, &filter.partials)
        };
        if let Some(last) = last {
            cx.set_intersect_result(realm, last);
        }
    }

    if filter.has_except() {
        match cx.intersect_result(realm) {
            Some(anchor) => {
                if filter.ignore_or {
                    except_or_absorbed(cx, realm, anchor, &filter.ignore_exacts, &filter.ignore_partials);
                } else {
                    except_and_absorbed(cx, realm, anchor, &filter.ignore_exacts, &filter.ignore_partials);
                }
            }
            None => {
                let last = if filter.ignore_or {
                    Some(or_member(cx, realm, Side::Except, None, &filter.ignore_exacts, &filter.ignore_partials))
                } else {
                    and_chain(cx, realm, Side::Except, None, &filter.ignore_exacts, &filter.ignore_partials)
                };
                if let Some(last) = last {
                    merge_except_result(cx, realm, last);
                }
            }
        }
    }
}

/// Fold a finished standalone except chain into the realm's exclusion set;
/// several independent exclusion sets union together.
fn merge_except_result(cx: &mut Context, realm: Realm, group: u32) {
    let letter = realm.except_letter();
    match cx.except_result(realm) {
        None => cx.set_except_result(realm, group),
        Some(previous) => {
            let index = cx.bump_except(realm);
            cx.with_or_comma();
            cx.push_alias(letter, index);
            cx.push(r#"("id") AS (SELECT "id" FROM "#);
            cx.push_alias(letter, previous);
            cx.push(r#" UNION SELECT "id" FROM "#);
            cx.push_alias(letter, group);
            cx.push(")");
            cx.set_except_result(realm, index);
        }
    }
}

fn side_letter(realm: Realm, side: Side) -> char {
    match side {
        Side::Intersect => realm.intersect_letter(),
        Side::Except => realm.except_letter(),
    }
}

fn bump(cx: &mut Context, realm: Realm, side: Side) -> u32 {
    match side {
        Side::Intersect => cx.bump_intersect(realm),
        Side::Except => cx.bump_except(realm),
    }
}

/// `"iN"("id") AS (` for the member being opened.
fn open_member(cx: &mut Context, letter: char, index: u32) {
    cx.with_or_comma();
    cx.push_alias(letter, index);
    cx.push(r#"("id") AS ("#);
}

/// One membership test over the realm's cross table, optionally restricted
/// to a previous set, closing the member.
fn membership(
    cx: &mut Context,
    realm: Realm,
    chain: Option<(char, u32)>,
    join: bool,
    condition: impl FnOnce(&mut Context),
) {
    let source = realm.tag_source();
    cx.push(source.select_head);
    if join {
        cx.push(JOIN_TAGS);
    }
    cx.push(source.where_prefix);
    if let Some((letter, index)) = chain {
        cx.push(r#""ct"."id" IN "#);
        cx.push_alias(letter, index);
        cx.push(" AND ");
    }
    condition(cx);
    cx.push(")");
}

/// Full-text companion set: `"iiN"("id") AS (SELECT "rowid" FROM "tag_fts"('...'))`.
fn companion(cx: &mut Context, letter: char, index: u32, terms: &[&str], or: bool) {
    cx.with_or_comma();
    cx.push_companion(letter, index);
    cx.push(r#"("id") AS (SELECT "rowid" FROM "tag_fts"('"#);
    for (i, term) in terms.iter().enumerate() {
        if i != 0 {
            cx.push(if or { " OR " } else { " AND " });
        }
        cx.push_fts_token(term);
    }
    cx.push("'))");
}

fn exact_eq(cx: &mut Context, term: &str) {
    cx.push(r#""tt"."value" = "#);
    cx.push_single_quoted(term);
}

fn exact_in(cx: &mut Context, terms: &[String]) {
    if let [term] = terms {
        exact_eq(cx, term);
        return;
    }
    cx.push(r#""tt"."value" IN ("#);
    for (i, term) in terms.iter().enumerate() {
        if i != 0 {
            cx.push(", ");
        }
        cx.push_single_quoted(term);
    }
    cx.push(")");
}

fn like_term(cx: &mut Context, term: &str) {
    cx.push(r#""tt"."value" LIKE "#);
    cx.push_like_pattern(term);
}

fn match_membership(cx: &mut Context, letter: char, index: u32) {
    cx.push(r#""ct"."tag_id" IN "#);
    cx.push_companion(letter, index);
}

/// AND semantics: every condition gets its own member, each intersected
/// with the chain so far. Returns the last member, if any condition
/// existed.
fn and_chain(
    cx: &mut Context,
    realm: Realm,
    side: Side,
    start: Option<u32>,
    exacts: &[String],
    partials: &[String],
) -> Option<u32> {
    // Every link lives in the side's own namespace; the first link of an
    // intersect chain may anchor to a set created by an earlier filter,
    // which shares that namespace.
    let letter = side_letter(realm, side);
    let mut previous = start;

    for term in exacts {
        let chain = previous.map(|p| (letter, p));
        let index = bump(cx, realm, side);
        open_member(cx, letter, index);
        membership(cx, realm, chain, true, |cx| exact_eq(cx, term));
        previous = Some(index);
    }

    let (longs, shorts) = divide_partials(partials);
    for &term in &longs {
        let chain = previous.map(|p| (letter, p));
        let index = bump(cx, realm, side);
        companion(cx, letter, index, &[term], true);
        open_member(cx, letter, index);
        membership(cx, realm, chain, false, |cx| match_membership(cx, letter, index));
        previous = Some(index);
    }
    for &term in &shorts {
        let chain = previous.map(|p| (letter, p));
        let index = bump(cx, realm, side);
        open_member(cx, letter, index);
        membership(cx, realm, chain, true, |cx| like_term(cx, term));
        previous = Some(index);
    }

    if previous == start { None } else { previous }
}

/// OR semantics: the whole group collapses into one member whose predicate
/// accepts any of the exact set, the full-text companion or the LIKE terms.
fn or_member(
    cx: &mut Context,
    realm: Realm,
    side: Side,
    start: Option<u32>,
    exacts: &[String],
    partials: &[String],
) -> u32 {
    let letter = side_letter(realm, side);
    let (longs, shorts) = divide_partials(partials);
    let chain = start.map(|p| (letter, p));
    let index = bump(cx, realm, side);
    if !longs.is_empty() {
        companion(cx, letter, index, &longs, true);
    }
    open_member(cx, letter, index);
    let join = !exacts.is_empty() || !shorts.is_empty();
    membership(cx, realm, chain, join, |cx| {
        cx.push("(");
        let mut first = true;
        if !exacts.is_empty() {
            exact_in(cx, exacts);
            first = false;
        }
        if !longs.is_empty() {
            if !first {
                cx.push(" OR ");
            }
            match_membership(cx, letter, index);
            first = false;
        }
        for term in &shorts {
            if !first {
                cx.push(" OR ");
            }
            like_term(cx, term);
            first = false;
        }
        cx.push(")");
    });
    index
}

/// Except with AND semantics while an intersect chain exists: each ignore
/// condition becomes a scratch except member restricted to the chain's
/// anchor, multiple members INTERSECT into one, and the result is
/// subtracted from the chain as one more intersect alias.
fn except_and_absorbed(cx: &mut Context, realm: Realm, anchor: u32, exacts: &[String], partials: &[String]) {
    let except = realm.except_letter();
    let intersect = realm.intersect_letter();
    let chain = Some((intersect, anchor));
    let mut members: Vec<u32> = Vec::new();

    for term in exacts {
        let index = cx.bump_except(realm);
        open_member(cx, except, index);
        membership(cx, realm, chain, true, |cx| exact_eq(cx, term));
        members.push(index);
    }
    let (longs, shorts) = divide_partials(partials);
    for &term in &longs {
        let index = cx.bump_except(realm);
        companion(cx, except, index, &[term], true);
        open_member(cx, except, index);
        membership(cx, realm, chain, false, |cx| match_membership(cx, except, index));
        members.push(index);
    }
    for &term in &shorts {
        let index = cx.bump_except(realm);
        open_member(cx, except, index);
        membership(cx, realm, chain, true, |cx| like_term(cx, term));
        members.push(index);
    }

    let group = match members.as_slice() {
        [] => return,
        [single] => *single,
        many => {
            let index = cx.bump_except(realm);
            cx.with_or_comma();
            cx.push_alias(except, index);
            cx.push(r#"("id") AS ("#);
            for (i, member) in many.iter().enumerate() {
                if i != 0 {
                    cx.push(" INTERSECT ");
                }
                cx.push(r#"SELECT "id" FROM "#);
                cx.push_alias(except, *member);
            }
            cx.push(")");
            index
        }
    };

    let index = cx.bump_intersect(realm);
    cx.with_or_comma();
    cx.push_alias(intersect, index);
    cx.push(r#"("id") AS (SELECT "id" FROM "#);
    cx.push_alias(intersect, anchor);
    cx.push(r#" EXCEPT SELECT "id" FROM "#);
    cx.push_alias(except, group);
    cx.push(")");
    cx.set_intersect_result(realm, index);
}

/// Except with OR semantics while an intersect chain exists: one combined
/// membership test, subtracted from the chain in place (no scratch member).
fn except_or_absorbed(cx: &mut Context, realm: Realm, anchor: u32, exacts: &[String], partials: &[String]) {
    let intersect = realm.intersect_letter();
    let (longs, shorts) = divide_partials(partials);
    let index = cx.bump_intersect(realm);
    if !longs.is_empty() {
        companion(cx, intersect, index, &longs, true);
    }
    open_member(cx, intersect, index);
    cx.push(r#"SELECT "id" FROM "#);
    cx.push_alias(intersect, anchor);
    cx.push(" EXCEPT ");
    let join = !exacts.is_empty() || !shorts.is_empty();
    membership(cx, realm, Some((intersect, anchor)), join, |cx| {
        cx.push("(");
        let mut first = true;
        if !exacts.is_empty() {
            exact_in(cx, exacts);
            first = false;
        }
        if !longs.is_empty() {
            if !first {
                cx.push(" OR ");
            }
            match_membership(cx, intersect, index);
            first = false;
        }
        for term in &shorts {
            if !first {
                cx.push(" OR ");
            }
            like_term(cx, term);
            first = false;
        }
        cx.push(")");
    });
    cx.set_intersect_result(realm, index);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_filter() -> TagFilter {
        TagFilter::default()
    }

    #[test]
    fn test_and_exact_chain() {
        let mut cx = Context::default();
        let filter = TagFilter {
            exacts: vec!["blue".to_string(), "red".to_string()],
            or: false,
            ..tag_filter()
        };
        preprocess_tag_filter(&mut cx, Realm::Artwork, &filter);
        assert_eq!(cx.intersect_result(Realm::Artwork), Some(1));
        let sql = cx.into_sql();
        assert_eq!(
            sql,
            concat!(
                r#"WITH "i0"("id") AS (SELECT "ct"."id" FROM "artwork_tags" AS "ct""#,
                r#" INNER JOIN "tags" AS "tt" ON "ct"."tag_id" = "tt"."id""#,
                r#" WHERE "ct"."value_kind" <> 0 AND "tt"."value" = 'blue')"#,
                r#", "i1"("id") AS (SELECT "ct"."id" FROM "artwork_tags" AS "ct""#,
                r#" INNER JOIN "tags" AS "tt" ON "ct"."tag_id" = "tt"."id""#,
                r#" WHERE "ct"."value_kind" <> 0 AND "ct"."id" IN "i0" AND "tt"."value" = 'red')"#,
            )
        );
    }

    #[test]
    fn test_or_group_collapses_into_one_member() {
        let mut cx = Context::default();
        let filter = TagFilter {
            exacts: vec!["blue".to_string(), "red".to_string()],
            partials: vec!["ab".to_string()],
            or: true,
            ..tag_filter()
        };
        preprocess_tag_filter(&mut cx, Realm::Artwork, &filter);
        assert_eq!(cx.intersect_result(Realm::Artwork), Some(0));
        let sql = cx.into_sql();
        assert_eq!(
            sql,
            concat!(
                r#"WITH "i0"("id") AS (SELECT "ct"."id" FROM "artwork_tags" AS "ct""#,
                r#" INNER JOIN "tags" AS "tt" ON "ct"."tag_id" = "tt"."id""#,
                r#" WHERE "ct"."value_kind" <> 0 AND"#,
                r#" ("tt"."value" IN ('blue', 'red') OR "tt"."value" LIKE '%ab%'))"#,
            )
        );
    }

    #[test]
    fn test_long_partial_uses_companion_set() {
        let mut cx = Context::default();
        let filter = TagFilter {
            partials: vec!["landscape".to_string()],
            or: false,
            ..tag_filter()
        };
        preprocess_tag_filter(&mut cx, Realm::Artwork, &filter);
        let sql = cx.into_sql();
        assert_eq!(
            sql,
            concat!(
                r#"WITH "ii0"("id") AS (SELECT "rowid" FROM "tag_fts"('"landscape"'))"#,
                r#", "i0"("id") AS (SELECT "ct"."id" FROM "artwork_tags" AS "ct""#,
                r#" WHERE "ct"."value_kind" <> 0 AND "ct"."tag_id" IN "ii0")"#,
            )
        );
    }

    #[test]
    fn test_except_absorbed_into_intersect_chain() {
        let mut cx = Context::default();
        let filter = TagFilter {
            exacts: vec!["blue".to_string()],
            or: false,
            ignore_exacts: vec!["red".to_string()],
            ignore_or: false,
            ..tag_filter()
        };
        preprocess_tag_filter(&mut cx, Realm::Artwork, &filter);
        assert_eq!(cx.intersect_result(Realm::Artwork), Some(1));
        assert_eq!(cx.except_result(Realm::Artwork), None);
        let sql = cx.into_sql();
        assert_eq!(
            sql,
            concat!(
                r#"WITH "i0"("id") AS (SELECT "ct"."id" FROM "artwork_tags" AS "ct""#,
                r#" INNER JOIN "tags" AS "tt" ON "ct"."tag_id" = "tt"."id""#,
                r#" WHERE "ct"."value_kind" <> 0 AND "tt"."value" = 'blue')"#,
                r#", "e0"("id") AS (SELECT "ct"."id" FROM "artwork_tags" AS "ct""#,
                r#" INNER JOIN "tags" AS "tt" ON "ct"."tag_id" = "tt"."id""#,
                r#" WHERE "ct"."value_kind" <> 0 AND "ct"."id" IN "i0" AND "tt"."value" = 'red')"#,
                r#", "i1"("id") AS (SELECT "id" FROM "i0" EXCEPT SELECT "id" FROM "e0")"#,
            )
        );
    }

    #[test]
    fn test_standalone_except_becomes_exclusion_set() {
        let mut cx = Context::default();
        let filter = TagFilter {
            ignore_exacts: vec!["red".to_string()],
            ignore_or: false,
            ..tag_filter()
        };
        preprocess_tag_filter(&mut cx, Realm::Artwork, &filter);
        assert_eq!(cx.intersect_result(Realm::Artwork), None);
        assert_eq!(cx.except_result(Realm::Artwork), Some(0));
    }

    #[test]
    fn test_id_filter_ignore_subtracts_from_chain() {
        let mut cx = Context::default();
        let filter = IdFilter {
            ids: vec![1, 2],
            ignore_ids: vec![3],
        };
        preprocess_id_filter(&mut cx, Realm::Artwork, &filter);
        let sql = cx.into_sql();
        assert_eq!(
            sql,
            concat!(
                r#"WITH "i0"("id") AS (VALUES (1), (2))"#,
                r#", "i1"("id") AS (SELECT "id" FROM "i0" EXCEPT VALUES (3))"#,
            )
        );
    }

    #[test]
    fn test_user_realm_uses_disjoint_letters() {
        let mut cx = Context::default();
        let filter = TagFilter {
            exacts: vec!["blue".to_string()],
            or: false,
            ..tag_filter()
        };
        preprocess_tag_filter(&mut cx, Realm::User, &filter);
        let sql = cx.into_sql();
        assert_eq!(
            sql,
            concat!(
                r#"WITH "p0"("id") AS (SELECT "ct"."id" FROM "user_tags" AS "ct""#,
                r#" INNER JOIN "tags" AS "tt" ON "ct"."tag_id" = "tt"."id""#,
                r#" WHERE "tt"."value" = 'blue')"#,
            )
        );
    }
}
