//! User repository: upsert, point lookup and filtered enumeration.
//!
//! The aggregate is the base row, an optional detail row (profile and
//! workspace columns) and the user's tag cross-references. Optional fields
//! merge on null at the SQL level so a shallow snapshot never erases detail
//! a deeper fetch stored earlier.

use crate::compile::compile_user_query;
use crate::error::{ErrorKind, Result};
use crate::exec::{self, bind_u64};
use crate::sql;
use crate::store::Store;
use async_stream::try_stream;
use exn::ResultExt;
use futures::Stream;
use kura_model::filter::UserFilter;
use kura_model::{HideReason, User, UserProfile, UserWorkspace};
use sqlx::sqlite::SqliteRow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

impl Store {
    /// Insert or refresh one user aggregate; `true` when previously unseen.
    pub async fn upsert_user(&mut self, user: &User, cancel: &CancellationToken) -> Result<bool> {
        if user.id == 0 {
            exn::bail!(ErrorKind::InvalidData("user id must not be zero"));
        }
        let id = bind_u64(user.id, "user id")?;
        let existed = {
            let row = exec::fetch_optional(&mut self.conn, &self.retry, cancel, || {
                sqlx::query(sql::EXISTS_USER).bind(id)
            })
            .await?;
            row.is_some()
        };

        self.upsert_user_row(user, cancel).await?;
        if user.profile.is_some() || user.workspace.is_some() {
            trace!(id = user.id, "storing user detail");
            self.upsert_user_detail_row(user, cancel).await?;
        }
        if let Some(tags) = user.extra_tags.as_deref() {
            trace!(id = user.id, "replacing user tags");
            self.execute_id(sql::DELETE_USER_TAGS, id, cancel).await?;
            self.insert_user_tag_rows(id, tags, cancel).await?;
        }

        Ok(!existed)
    }

    async fn upsert_user_row(&mut self, user: &User, cancel: &CancellationToken) -> Result<()> {
        let id = bind_u64(user.id, "user id")?;
        let has_detail = user.profile.is_some() || user.workspace.is_some();
        exec::execute(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::UPSERT_USER)
                .bind(id)
                .bind(user.name.as_deref())
                .bind(user.account.as_deref())
                .bind(user.is_followed)
                .bind(user.is_muted)
                .bind(user.is_officially_removed)
                .bind(i64::from(user.hide_reason as u8))
                .bind(user.image_urls.as_deref())
                .bind(user.comment.as_deref())
                .bind(user.memo.as_deref())
                .bind(has_detail)
        })
        .await?;
        Ok(())
    }

    async fn upsert_user_detail_row(&mut self, user: &User, cancel: &CancellationToken) -> Result<()> {
        let id = bind_u64(user.id, "user id")?;
        let profile = user.profile.clone().unwrap_or_default();
        let workspace = user.workspace.clone().unwrap_or_default();
        let total_following = bind_u64(profile.total_following, "total following")?;
        let total_artworks = bind_u64(profile.total_artworks, "total artworks")?;
        let total_public_bookmarks = bind_u64(profile.total_public_bookmarks, "total public bookmarks")?;
        exec::execute(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::UPSERT_USER_DETAIL)
                .bind(id)
                .bind(profile.webpage.as_deref())
                .bind(profile.gender.as_deref())
                .bind(profile.birth.as_deref())
                .bind(profile.region.as_deref())
                .bind(profile.job.as_deref())
                .bind(total_following)
                .bind(total_artworks)
                .bind(total_public_bookmarks)
                .bind(profile.twitter_account.as_deref())
                .bind(profile.is_premium)
                .bind(workspace.pc.as_deref())
                .bind(workspace.monitor.as_deref())
                .bind(workspace.tool.as_deref())
                .bind(workspace.tablet.as_deref())
                .bind(workspace.desk.as_deref())
                .bind(workspace.music.as_deref())
                .bind(workspace.comment.as_deref())
                .bind(workspace.image_url.as_deref())
        })
        .await?;
        Ok(())
    }

    async fn insert_user_tag_rows(&mut self, id: i64, tags: &[u32], cancel: &CancellationToken) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let Self { conn, retry, insert_user_tags, .. } = self;
        let stmt = insert_user_tags.get(tags.len());
        exec::execute(conn, retry, cancel, || {
            let mut query = sqlx::query(stmt).bind(id);
            for &tag in tags {
                query = query.bind(i64::from(tag));
            }
            query
        })
        .await?;
        Ok(())
    }

    /// Fetch one full user aggregate, or `None` for an unknown id.
    pub async fn get_user(&mut self, id: u64, cancel: &CancellationToken) -> Result<Option<User>> {
        if id == 0 {
            return Ok(None);
        }
        let bound = bind_u64(id, "user id")?;
        let row = exec::fetch_optional(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::GET_USER).bind(bound)
        })
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let (mut user, has_detail) = user_from_row(&row, id, 0)?;
        if has_detail {
            self.load_user_detail(&mut user, cancel).await?;
        }
        self.load_user_tags(&mut user, cancel).await?;
        Ok(Some(user))
    }

    async fn load_user_detail(&mut self, user: &mut User, cancel: &CancellationToken) -> Result<()> {
        let id = bind_u64(user.id, "user id")?;
        let row = exec::fetch_optional(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::GET_USER_DETAIL).bind(id)
        })
        .await?;
        let Some(row) = row else {
            return Ok(());
        };
        let profile = UserProfile {
            webpage: exec::col_opt_str(&row, 0)?,
            gender: exec::col_opt_str(&row, 1)?,
            birth: exec::col_opt_str(&row, 2)?,
            region: exec::col_opt_str(&row, 3)?,
            job: exec::col_opt_str(&row, 4)?,
            total_following: exec::col_u64(&row, 5, "total following")?,
            total_artworks: exec::col_u64(&row, 6, "total artworks")?,
            total_public_bookmarks: exec::col_u64(&row, 7, "total public bookmarks")?,
            twitter_account: exec::col_opt_str(&row, 8)?,
            is_premium: exec::col_bool(&row, 9)?,
        };
        let workspace = UserWorkspace {
            pc: exec::col_opt_str(&row, 10)?,
            monitor: exec::col_opt_str(&row, 11)?,
            tool: exec::col_opt_str(&row, 12)?,
            tablet: exec::col_opt_str(&row, 13)?,
            desk: exec::col_opt_str(&row, 14)?,
            music: exec::col_opt_str(&row, 15)?,
            comment: exec::col_opt_str(&row, 16)?,
            image_url: exec::col_opt_str(&row, 17)?,
        };
        // An all-default sub-record is indistinguishable from "never
        // fetched" in the column form; keep it absent on read-back.
        if profile != UserProfile::default() {
            user.profile = Some(profile);
        }
        if workspace != UserWorkspace::default() {
            user.workspace = Some(workspace);
        }
        Ok(())
    }

    async fn load_user_tags(&mut self, user: &mut User, cancel: &CancellationToken) -> Result<()> {
        let id = bind_u64(user.id, "user id")?;
        let rows = exec::fetch_all(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::GET_USER_TAGS).bind(id)
        })
        .await?;
        if !rows.is_empty() {
            user.extra_tags = Some(
                rows.iter()
                    .map(|row| exec::col_u32(row, 0, "tag id"))
                    .collect::<Result<Vec<_>>>()?,
            );
        }
        Ok(())
    }

    /// Stream every user matching the filter.
    pub fn filter_users<'a>(
        &'a mut self,
        filter: &'a UserFilter,
        cancel: &'a CancellationToken,
    ) -> impl Stream<Item = Result<User>> + 'a {
        try_stream! {
            let query = compile_user_query(filter);
            debug!(query = %query, "compiled user filter");

            let rows = exec::fetch_all(&mut self.conn, &self.retry, cancel, || {
                sqlx::query(&query).persistent(false)
            })
            .await?;

            for row in rows {
                exec::ensure_active(cancel)?;
                let id = exec::col_u64(&row, 0, "user id")?;
                if id == 0 {
                    continue;
                }
                let (mut user, has_detail) = user_from_row(&row, id, 1)?;
                if has_detail {
                    self.load_user_detail(&mut user, cancel).await?;
                }
                self.load_user_tags(&mut user, cancel).await?;
                yield user;
            }
        }
    }

    /// Flag a user as gone from the remote site.
    pub async fn mark_user_removed(&mut self, id: u64, cancel: &CancellationToken) -> Result<()> {
        let id = bind_u64(id, "user id")?;
        self.execute_id(sql::MARK_USER_REMOVED, id, cancel).await?;
        Ok(())
    }
}

/// Decode the base columns of a user row starting at `offset`; the second
/// value reports whether a detail row should be consulted.
fn user_from_row(row: &SqliteRow, id: u64, offset: usize) -> Result<(User, bool)> {
    let hide_reason = exec::col_u8(row, offset + 5, "hide reason")?;
    let user = User {
        id,
        name: exec::col_opt_str(row, offset)?,
        account: exec::col_opt_str(row, offset + 1)?,
        is_followed: exec::col_bool(row, offset + 2)?,
        is_muted: exec::col_bool(row, offset + 3)?,
        is_officially_removed: exec::col_bool(row, offset + 4)?,
        hide_reason: HideReason::try_from(hide_reason).or_raise(|| ErrorKind::InvalidData("hide reason"))?,
        image_urls: exec::col_opt_str(row, offset + 6)?,
        comment: exec::col_opt_str(row, offset + 7)?,
        memo: exec::col_opt_str(row, offset + 8)?,
        ..User::default()
    };
    let has_detail = exec::col_bool(row, offset + 9)?;
    Ok((user, has_detail))
}
