//! Artwork repository: upsert, point lookup, filtered enumeration and the
//! maintenance operations.
//!
//! An artwork aggregate spans the base row plus four satellite tables (tag
//! and tool cross-references, hidden pages, frame delays). Writes are
//! strictly sequential - base row first, then the satellites - and the
//! cross tables are rewritten as delete-then-reinsert issued back-to-back,
//! so a concurrent reader can observe an empty set but never a torn one.

use crate::compile::{Projection, compile_artwork_query};
use crate::error::{ErrorKind, Result, raise};
use crate::exec::{self, bind_u64};
use crate::existence::existence_matches;
use crate::sql;
use crate::store::Store;
use async_stream::try_stream;
use exn::ResultExt;
use futures::Stream;
use kura_model::filter::ArtworkFilter;
use kura_model::{Artwork, ArtworkFlags, ArtworkKind, ExtensionKind, HideReason};
use sqlx::sqlite::SqliteRow;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

impl Store {
    /// Insert or refresh one artwork aggregate.
    ///
    /// Returns `true` when the record was not previously present. The
    /// answer comes from an explicit pre-check, not from inspecting
    /// conflict resolution.
    pub async fn upsert_artwork(&mut self, artwork: &Artwork, cancel: &CancellationToken) -> Result<bool> {
        if artwork.id == 0 {
            exn::bail!(ErrorKind::InvalidData("artwork id must not be zero"));
        }
        let id = bind_u64(artwork.id, "artwork id")?;
        let existed = self.artwork_exists(id, cancel).await?;

        self.upsert_artwork_row(artwork, cancel).await?;
        trace!(id = artwork.id, "replacing tag cross references");
        self.execute_id(sql::DELETE_ARTWORK_TAGS, id, cancel).await?;
        self.insert_artwork_tag_rows(id, &artwork.tag_kinds(), cancel).await?;
        trace!(id = artwork.id, "replacing tool cross references");
        self.execute_id(sql::DELETE_ARTWORK_TOOLS, id, cancel).await?;
        self.insert_artwork_tool_rows(id, &artwork.tools, cancel).await?;
        trace!(id = artwork.id, "replacing hidden pages");
        self.execute_id(sql::DELETE_HIDDEN_PAGES, id, cancel).await?;
        self.insert_hidden_page_rows(id, artwork.hidden_pages.as_ref(), cancel).await?;
        if artwork.kind == ArtworkKind::Animation {
            if let Some(frames) = artwork.frame_delays.as_deref().filter(|f| !f.is_empty()) {
                trace!(id = artwork.id, "storing frame delays");
                self.insert_frame_rows(id, frames, cancel).await?;
            }
        }

        Ok(!existed)
    }

    async fn artwork_exists(&mut self, id: i64, cancel: &CancellationToken) -> Result<bool> {
        let row = exec::fetch_optional(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::EXISTS_ARTWORK).bind(id)
        })
        .await?;
        Ok(row.is_some())
    }

    async fn upsert_artwork_row(&mut self, artwork: &Artwork, cancel: &CancellationToken) -> Result<()> {
        let id = bind_u64(artwork.id, "artwork id")?;
        let user_id = bind_u64(artwork.user_id, "user id")?;
        let total_view = bind_u64(artwork.total_view, "total view")?;
        let total_bookmarks = bind_u64(artwork.total_bookmarks, "total bookmarks")?;
        let created_at = exec::datetime_to_sql(artwork.created_at, "created at")?;
        let file_date = exec::datetime_to_sql(artwork.file_date, "file date")?;
        exec::execute(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::UPSERT_ARTWORK)
                .bind(id)
                .bind(user_id)
                .bind(i64::from(artwork.page_count))
                .bind(i64::from(artwork.width))
                .bind(i64::from(artwork.height))
                .bind(i64::from(artwork.kind as u8))
                .bind(i64::from(artwork.extension as u8))
                .bind(artwork.flags.restricted())
                .bind(artwork.flags.visible())
                .bind(artwork.flags.muted())
                .bind(artwork.flags.hide_last_page())
                .bind(created_at.as_str())
                .bind(file_date.as_str())
                .bind(total_view)
                .bind(total_bookmarks)
                .bind(i64::from(artwork.hide_reason as u8))
                .bind(artwork.is_officially_removed)
                .bind(artwork.flags.bookmarked())
                .bind(artwork.title.as_str())
                .bind(artwork.caption.as_str())
                .bind(artwork.memo.as_deref())
        })
        .await?;
        Ok(())
    }

    async fn insert_artwork_tag_rows(
        &mut self,
        id: i64,
        kinds: &BTreeMap<u32, u8>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if kinds.is_empty() {
            return Ok(());
        }
        let Self { conn, retry, insert_artwork_tags, .. } = self;
        let stmt = insert_artwork_tags.get(kinds.len());
        exec::execute(conn, retry, cancel, || {
            let mut query = sqlx::query(stmt).bind(id);
            for (&tag, &kind) in kinds {
                query = query.bind(i64::from(tag)).bind(i64::from(kind));
            }
            query
        })
        .await?;
        Ok(())
    }

    async fn insert_artwork_tool_rows(&mut self, id: i64, tools: &[u32], cancel: &CancellationToken) -> Result<()> {
        if tools.is_empty() {
            return Ok(());
        }
        let Self { conn, retry, insert_artwork_tools, .. } = self;
        let stmt = insert_artwork_tools.get(tools.len());
        exec::execute(conn, retry, cancel, || {
            let mut query = sqlx::query(stmt).bind(id);
            for &tool in tools {
                query = query.bind(i64::from(tool));
            }
            query
        })
        .await?;
        Ok(())
    }

    async fn insert_hidden_page_rows(
        &mut self,
        id: i64,
        pages: Option<&BTreeMap<u32, HideReason>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(pages) = pages.filter(|p| !p.is_empty()) else {
            return Ok(());
        };
        let Self { conn, retry, insert_hidden_pages, .. } = self;
        let stmt = insert_hidden_pages.get(pages.len());
        exec::execute(conn, retry, cancel, || {
            let mut query = sqlx::query(stmt).bind(id);
            for (&page, &reason) in pages {
                query = query.bind(i64::from(page)).bind(i64::from(reason as u8));
            }
            query
        })
        .await?;
        Ok(())
    }

    async fn insert_frame_rows(&mut self, id: i64, frames: &[u16], cancel: &CancellationToken) -> Result<()> {
        let Self { conn, retry, insert_frames, .. } = self;
        let stmt = insert_frames.get(frames.len());
        exec::execute(conn, retry, cancel, || {
            let mut query = sqlx::query(stmt).bind(id);
            for (index, &delay) in frames.iter().enumerate() {
                query = query.bind(index as i64).bind(i64::from(delay));
            }
            query
        })
        .await?;
        Ok(())
    }

    /// Fetch one full aggregate, or `None` for an unknown id.
    pub async fn get_artwork(&mut self, id: u64, cancel: &CancellationToken) -> Result<Option<Artwork>> {
        if id == 0 {
            return Ok(None);
        }
        let bound = bind_u64(id, "artwork id")?;
        let row = exec::fetch_optional(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::GET_ARTWORK).bind(bound)
        })
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut artwork = artwork_from_row(&row, id, 0)?;
        self.load_artwork_relations(&mut artwork, cancel).await?;
        Ok(Some(artwork))
    }

    async fn load_artwork_relations(&mut self, artwork: &mut Artwork, cancel: &CancellationToken) -> Result<()> {
        let id = bind_u64(artwork.id, "artwork id")?;

        let tools = exec::fetch_all(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::GET_ARTWORK_TOOLS).bind(id)
        })
        .await?;
        artwork.tools = tools
            .iter()
            .map(|row| exec::col_u32(row, 0, "tool id"))
            .collect::<Result<Vec<_>>>()?;

        let tags = exec::fetch_all(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::GET_ARTWORK_TAGS).bind(id)
        })
        .await?;
        for row in &tags {
            let tag = exec::col_u32(row, 0, "tag id")?;
            match exec::col_u8(row, 1, "tag value kind")? {
                0 => artwork.fake_tags.get_or_insert_default().push(tag),
                1 => artwork.tags.push(tag),
                2 => artwork.extra_tags.get_or_insert_default().push(tag),
                _ => {}
            }
        }

        let hides = exec::fetch_all(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::GET_HIDDEN_PAGES).bind(id)
        })
        .await?;
        if !hides.is_empty() {
            let mut map = BTreeMap::new();
            for row in &hides {
                let page = exec::col_u32(row, 0, "hidden page index")?;
                let reason = exec::col_u8(row, 1, "hide reason")?;
                let reason = HideReason::try_from(reason).or_raise(|| ErrorKind::InvalidData("hide reason"))?;
                map.insert(page, reason);
            }
            artwork.hidden_pages = Some(map);
        }

        let frames = exec::fetch_all(&mut self.conn, &self.retry, cancel, || {
            sqlx::query(sql::GET_FRAMES).bind(id)
        })
        .await?;
        if !frames.is_empty() {
            artwork.frame_delays = Some(
                frames
                    .iter()
                    .map(|row| exec::col_u16(row, 0, "frame delay"))
                    .collect::<Result<Vec<_>>>()?,
            );
        }

        Ok(())
    }

    /// Stream every artwork matching the filter.
    ///
    /// The compiled query is evaluated first; each matching id is
    /// re-queried into a full aggregate. A file-existence filter runs per
    /// record after that, and when one is present the filter's count/offset
    /// apply to the *post-filtered* sequence - the relational query was
    /// compiled without LIMIT/OFFSET in that case.
    pub fn filter_artworks<'a>(
        &'a mut self,
        filter: &'a ArtworkFilter,
        cancel: &'a CancellationToken,
    ) -> impl Stream<Item = Result<Artwork>> + 'a {
        try_stream! {
            if filter.existence.is_some() && self.files.is_none() {
                raise::<()>(ErrorKind::MalformedFilter("existence filter without a file source"))?;
            }
            let compiled = compile_artwork_query(filter, Projection::Columns);
            debug!(query = %compiled.sql, "compiled artwork filter");

            let rows = exec::fetch_all(&mut self.conn, &self.retry, cancel, || {
                sqlx::query(&compiled.sql).persistent(false)
            })
            .await?;

            let files = self.files.clone();
            let mut skipped = 0u32;
            let mut emitted = 0u32;
            for row in rows {
                exec::ensure_active(cancel)?;
                let id = exec::col_u64(&row, 0, "artwork id")?;
                if id == 0 {
                    continue;
                }
                let mut artwork = artwork_from_row(&row, id, 1)?;
                self.load_artwork_relations(&mut artwork, cancel).await?;

                if let (Some(existence), Some(files)) = (filter.existence.as_ref(), files.as_deref()) {
                    if !existence_matches(existence, &artwork, files) {
                        continue;
                    }
                }
                if compiled.deferred_paging {
                    if skipped < filter.offset {
                        skipped += 1;
                        continue;
                    }
                    if filter.count.is_some_and(|count| emitted >= count) {
                        break;
                    }
                }
                emitted += 1;
                yield artwork;
            }
        }
    }

    /// Flag a record as no longer served by the remote site. The record
    /// itself stays in the archive.
    pub async fn mark_artwork_removed(&mut self, id: u64, cancel: &CancellationToken) -> Result<()> {
        let id = bind_u64(id, "artwork id")?;
        self.execute_id(sql::MARK_ARTWORK_REMOVED, id, cancel).await?;
        Ok(())
    }

    /// Delete every aggregate matching the filter. Returns how many were
    /// deleted.
    pub async fn delete_artworks(&mut self, filter: &ArtworkFilter, cancel: &CancellationToken) -> Result<u64> {
        use futures::TryStreamExt;

        let ids: Vec<u64> = {
            let stream = self.filter_artworks(filter, cancel);
            futures::pin_mut!(stream);
            let mut ids = Vec::new();
            while let Some(artwork) = stream.try_next().await? {
                ids.push(artwork.id);
            }
            ids
        };

        for &id in &ids {
            let id = bind_u64(id, "artwork id")?;
            self.execute_id(sql::DELETE_ARTWORK_TAGS, id, cancel).await?;
            self.execute_id(sql::DELETE_ARTWORK_TOOLS, id, cancel).await?;
            self.execute_id(sql::DELETE_HIDDEN_PAGES, id, cancel).await?;
            self.execute_id(sql::DELETE_FRAMES, id, cancel).await?;
            self.execute_id(sql::DELETE_ARTWORK, id, cancel).await?;
        }
        Ok(ids.len() as u64)
    }
}

/// Decode the base columns of an artwork row starting at `offset`.
pub(crate) fn artwork_from_row(row: &SqliteRow, id: u64, offset: usize) -> Result<Artwork> {
    let mut flags = ArtworkFlags::default();
    flags.set_restricted(exec::col_bool(row, offset + 6)?);
    flags.set_visible(exec::col_bool(row, offset + 7)?);
    flags.set_muted(exec::col_bool(row, offset + 8)?);
    flags.set_hide_last_page(exec::col_bool(row, offset + 9)?);
    flags.set_bookmarked(exec::col_bool(row, offset + 16)?);

    let kind = exec::col_u8(row, offset + 4, "artwork kind")?;
    let extension = exec::col_u8(row, offset + 5, "extension kind")?;
    let hide_reason = exec::col_u8(row, offset + 14, "hide reason")?;

    Ok(Artwork {
        id,
        user_id: exec::col_u64(row, offset, "user id")?,
        page_count: exec::col_u32(row, offset + 1, "page count")?,
        width: exec::col_u32(row, offset + 2, "width")?,
        height: exec::col_u32(row, offset + 3, "height")?,
        kind: ArtworkKind::try_from(kind).or_raise(|| ErrorKind::InvalidData("artwork kind"))?,
        extension: ExtensionKind::try_from(extension).or_raise(|| ErrorKind::InvalidData("extension kind"))?,
        flags,
        created_at: exec::col_datetime(row, offset + 10, "created at")?,
        file_date: exec::col_datetime(row, offset + 11, "file date")?,
        total_view: exec::col_u64(row, offset + 12, "total view")?,
        total_bookmarks: exec::col_u64(row, offset + 13, "total bookmarks")?,
        hide_reason: HideReason::try_from(hide_reason).or_raise(|| ErrorKind::InvalidData("hide reason"))?,
        is_officially_removed: exec::col_bool(row, offset + 15)?,
        title: exec::col_str(row, offset + 17)?,
        caption: exec::col_str(row, offset + 18)?,
        memo: exec::col_opt_str(row, offset + 19)?,
        ..Artwork::default()
    })
}
