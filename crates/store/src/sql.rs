//! Fixed statement text and the builders behind the arity caches.
//!
//! Everything here is a plain string: the prepared handles are memoized by
//! the connection, keyed by this text. Fixed statements are consts;
//! arity-dependent inserts are built by the `insert_*` functions below and
//! cached per arity by the store.

use std::fmt::Write;

// ---------------------------------------------------------------------------
// Artworks
// ---------------------------------------------------------------------------

pub(crate) const EXISTS_ARTWORK: &str = r#"SELECT "id" FROM "artworks" WHERE "id" = ?1"#;

/// Base-row upsert with the merge rule: identity fields replaced, counters
/// taken from the source except `total_view` which never regresses, memo
/// merged on null.
pub(crate) const UPSERT_ARTWORK: &str = r#"INSERT INTO "artworks" VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21) ON CONFLICT ("id") DO UPDATE SET "user_id" = "excluded"."user_id", "page_count" = "excluded"."page_count", "width" = "excluded"."width", "height" = "excluded"."height", "kind" = "excluded"."kind", "extension" = "excluded"."extension", "is_restricted" = "excluded"."is_restricted", "is_visible" = "excluded"."is_visible", "is_muted" = "excluded"."is_muted", "hide_last_page" = "excluded"."hide_last_page", "created_at" = "excluded"."created_at", "file_date" = "excluded"."file_date", "total_view" = MAX("total_view", "excluded"."total_view"), "total_bookmarks" = "excluded"."total_bookmarks", "hide_reason" = "excluded"."hide_reason", "is_officially_removed" = "excluded"."is_officially_removed", "is_bookmarked" = "excluded"."is_bookmarked", "title" = "excluded"."title", "caption" = "excluded"."caption", "memo" = COALESCE("excluded"."memo", "memo")"#;

pub(crate) const GET_ARTWORK: &str = r#"SELECT "user_id", "page_count", "width", "height", "kind", "extension", "is_restricted", "is_visible", "is_muted", "hide_last_page", "created_at", "file_date", "total_view", "total_bookmarks", "hide_reason", "is_officially_removed", "is_bookmarked", "title", "caption", "memo" FROM "artworks" WHERE "id" = ?1"#;

/// Column list used by compiled filter queries; ordinals match
/// [`GET_ARTWORK`] shifted by one (the id rides in front).
pub(crate) const SELECT_ARTWORK_HEAD: &str = r#"SELECT "origin"."id", "origin"."user_id", "origin"."page_count", "origin"."width", "origin"."height", "origin"."kind", "origin"."extension", "origin"."is_restricted", "origin"."is_visible", "origin"."is_muted", "origin"."hide_last_page", "origin"."created_at", "origin"."file_date", "origin"."total_view", "origin"."total_bookmarks", "origin"."hide_reason", "origin"."is_officially_removed", "origin"."is_bookmarked", "origin"."title", "origin"."caption", "origin"."memo" FROM "artworks" AS "origin""#;

pub(crate) const COUNT_ARTWORK_HEAD: &str = r#"SELECT COUNT("origin"."id") FROM "artworks" AS "origin""#;

pub(crate) const GET_ARTWORK_TAGS: &str = r#"SELECT "tag_id", "value_kind" FROM "artwork_tags" WHERE "id" = ?1"#;
pub(crate) const GET_ARTWORK_TOOLS: &str = r#"SELECT "tool_id" FROM "artwork_tools" WHERE "id" = ?1"#;
pub(crate) const GET_HIDDEN_PAGES: &str = r#"SELECT "page", "reason" FROM "hidden_pages" WHERE "id" = ?1"#;
pub(crate) const GET_FRAMES: &str = r#"SELECT "delay" FROM "frames" WHERE "id" = ?1 ORDER BY "idx" ASC"#;

pub(crate) const DELETE_ARTWORK_TAGS: &str = r#"DELETE FROM "artwork_tags" WHERE "id" = ?1"#;
pub(crate) const DELETE_ARTWORK_TOOLS: &str = r#"DELETE FROM "artwork_tools" WHERE "id" = ?1"#;
pub(crate) const DELETE_HIDDEN_PAGES: &str = r#"DELETE FROM "hidden_pages" WHERE "id" = ?1"#;
pub(crate) const DELETE_FRAMES: &str = r#"DELETE FROM "frames" WHERE "id" = ?1"#;
pub(crate) const DELETE_ARTWORK: &str = r#"DELETE FROM "artworks" WHERE "id" = ?1"#;

pub(crate) const MARK_ARTWORK_REMOVED: &str =
    r#"UPDATE "artworks" SET "is_officially_removed" = 1 WHERE "id" = ?1"#;

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub(crate) const EXISTS_USER: &str = r#"SELECT "id" FROM "users" WHERE "id" = ?1"#;

pub(crate) const UPSERT_USER: &str = r#"INSERT INTO "users" VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) ON CONFLICT ("id") DO UPDATE SET "name" = COALESCE("excluded"."name", "name"), "account" = COALESCE("excluded"."account", "account"), "is_followed" = "excluded"."is_followed", "is_muted" = "excluded"."is_muted", "is_officially_removed" = "excluded"."is_officially_removed", "hide_reason" = "excluded"."hide_reason", "image_urls" = COALESCE("excluded"."image_urls", "image_urls"), "comment" = COALESCE("excluded"."comment", "comment"), "memo" = COALESCE("excluded"."memo", "memo"), "has_detail" = MAX("has_detail", "excluded"."has_detail")"#;

pub(crate) const GET_USER: &str = r#"SELECT "name", "account", "is_followed", "is_muted", "is_officially_removed", "hide_reason", "image_urls", "comment", "memo", "has_detail" FROM "users" WHERE "id" = ?1"#;

pub(crate) const SELECT_USER_HEAD: &str = r#"SELECT "origin"."id", "origin"."name", "origin"."account", "origin"."is_followed", "origin"."is_muted", "origin"."is_officially_removed", "origin"."hide_reason", "origin"."image_urls", "origin"."comment", "origin"."memo", "origin"."has_detail" FROM "users" AS "origin""#;

pub(crate) const UPSERT_USER_DETAIL: &str = r#"INSERT INTO "user_details" VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19) ON CONFLICT ("id") DO UPDATE SET "webpage" = "excluded"."webpage", "gender" = "excluded"."gender", "birth" = "excluded"."birth", "region" = "excluded"."region", "job" = "excluded"."job", "total_following" = "excluded"."total_following", "total_artworks" = "excluded"."total_artworks", "total_public_bookmarks" = "excluded"."total_public_bookmarks", "twitter_account" = "excluded"."twitter_account", "is_premium" = "excluded"."is_premium", "workspace_pc" = "excluded"."workspace_pc", "workspace_monitor" = "excluded"."workspace_monitor", "workspace_tool" = "excluded"."workspace_tool", "workspace_tablet" = "excluded"."workspace_tablet", "workspace_desk" = "excluded"."workspace_desk", "workspace_music" = "excluded"."workspace_music", "workspace_comment" = "excluded"."workspace_comment", "workspace_image_url" = "excluded"."workspace_image_url""#;

pub(crate) const GET_USER_DETAIL: &str = r#"SELECT "webpage", "gender", "birth", "region", "job", "total_following", "total_artworks", "total_public_bookmarks", "twitter_account", "is_premium", "workspace_pc", "workspace_monitor", "workspace_tool", "workspace_tablet", "workspace_desk", "workspace_music", "workspace_comment", "workspace_image_url" FROM "user_details" WHERE "id" = ?1"#;

pub(crate) const GET_USER_TAGS: &str = r#"SELECT "tag_id" FROM "user_tags" WHERE "id" = ?1"#;
pub(crate) const DELETE_USER_TAGS: &str = r#"DELETE FROM "user_tags" WHERE "id" = ?1"#;

pub(crate) const MARK_USER_REMOVED: &str =
    r#"UPDATE "users" SET "is_officially_removed" = 1 WHERE "id" = ?1"#;

// ---------------------------------------------------------------------------
// Tags & tools
// ---------------------------------------------------------------------------

/// Upsert-returning: re-registering an existing value hands back its id.
pub(crate) const REGISTER_TAG: &str = r#"INSERT INTO "tags" ("value") VALUES (?1) ON CONFLICT ("value") DO UPDATE SET "value" = "excluded"."value" RETURNING "id""#;
pub(crate) const REGISTER_TOOL: &str = r#"INSERT INTO "tools" ("value") VALUES (?1) ON CONFLICT ("value") DO UPDATE SET "value" = "excluded"."value" RETURNING "id""#;

pub(crate) const FIND_TAG: &str = r#"SELECT "id" FROM "tags" WHERE "value" = ?1"#;
pub(crate) const FIND_TOOL: &str = r#"SELECT "id" FROM "tools" WHERE "value" = ?1"#;
pub(crate) const GET_TAG: &str = r#"SELECT "value" FROM "tags" WHERE "id" = ?1"#;
pub(crate) const GET_TOOL: &str = r#"SELECT "value" FROM "tools" WHERE "id" = ?1"#;

/// Token search for terms of three or more characters.
pub(crate) const SEARCH_TAGS_MATCH: &str = r#"SELECT "rowid" FROM "tag_fts" (?1)"#;
/// Substring search for shorter terms, where tokenizing has nothing to bite.
pub(crate) const SEARCH_TAGS_LIKE: &str = r#"SELECT "id" FROM "tags" WHERE "value" LIKE ('%' || ?1 || '%')"#;

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

pub(crate) const COUNT_ARTWORKS: &str = r#"SELECT COUNT("id") FROM "artworks""#;
pub(crate) const COUNT_USERS: &str = r#"SELECT COUNT("id") FROM "users""#;
pub(crate) const COUNT_TAGS: &str = r#"SELECT COUNT("id") FROM "tags""#;
pub(crate) const COUNT_TOOLS: &str = r#"SELECT COUNT("id") FROM "tools""#;

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

pub(crate) const BEGIN: &str = "BEGIN TRANSACTION";
pub(crate) const BEGIN_EXCLUSIVE: &str = "BEGIN EXCLUSIVE TRANSACTION";
pub(crate) const END: &str = "END TRANSACTION";
pub(crate) const ROLLBACK: &str = "ROLLBACK TRANSACTION";

// ---------------------------------------------------------------------------
// Arity-dependent inserts. SQLite allows reusing ?1 across row groups, so
// the record id is bound once and each element adds its own placeholders.
// ---------------------------------------------------------------------------

/// `INSERT INTO "artwork_tags" VALUES (?1, ?2, ?3), (?1, ?4, ?5), ...`
pub(crate) fn insert_artwork_tags(arity: usize) -> String {
    pair_rows(r#"INSERT INTO "artwork_tags" VALUES "#, arity)
}

/// `INSERT INTO "hidden_pages" VALUES (?1, ?2, ?3), (?1, ?4, ?5), ...`
pub(crate) fn insert_hidden_pages(arity: usize) -> String {
    pair_rows(r#"INSERT INTO "hidden_pages" VALUES "#, arity)
}

/// Frame rows are immutable once known; REPLACE keeps re-upserts clean.
pub(crate) fn insert_frames(arity: usize) -> String {
    pair_rows(r#"INSERT OR REPLACE INTO "frames" VALUES "#, arity)
}

/// `INSERT OR IGNORE INTO "artwork_tools" VALUES (?1, ?2), (?1, ?3), ...`
pub(crate) fn insert_artwork_tools(arity: usize) -> String {
    single_rows(r#"INSERT OR IGNORE INTO "artwork_tools" VALUES "#, arity)
}

/// `INSERT OR IGNORE INTO "user_tags" VALUES (?1, ?2), (?1, ?3), ...`
pub(crate) fn insert_user_tags(arity: usize) -> String {
    single_rows(r#"INSERT OR IGNORE INTO "user_tags" VALUES "#, arity)
}

fn pair_rows(head: &str, arity: usize) -> String {
    let mut sql = String::with_capacity(head.len() + arity * 16);
    sql.push_str(head);
    let mut placeholder = 1usize;
    for i in 0..arity {
        if i != 0 {
            sql.push_str(", ");
        }
        let first = placeholder + 1;
        let second = placeholder + 2;
        placeholder += 2;
        let _ = write!(sql, "(?1, ?{first}, ?{second})");
    }
    sql
}

fn single_rows(head: &str, arity: usize) -> String {
    let mut sql = String::with_capacity(head.len() + arity * 10);
    sql.push_str(head);
    for i in 0..arity {
        if i != 0 {
            sql.push_str(", ");
        }
        let placeholder = i + 2;
        let _ = write!(sql, "(?1, ?{placeholder})");
    }
    sql
}
