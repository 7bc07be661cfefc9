use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use kura_model::{Artwork, ArtworkFlags, ArtworkKind, ExtensionKind, HideReason};
use std::collections::BTreeMap;
use time::UtcDateTime;

/// Fixed-width scalar block: four u64, three u32, three enum bytes, one
/// flag byte, then the two timestamps as unix seconds.
const BLOCK_LEN: usize = 8 * 4 + 4 * 3 + 4 + 8 * 2;

/// Length sentinel marking an optional field as absent (vs. empty).
const ABSENT: u32 = u32::MAX;

/// Pack an artwork record into its snapshot byte layout.
pub fn encode_artwork(artwork: &Artwork) -> Vec<u8> {
    // Scalar block plus a rough guess for the variable tail.
    let mut buf = Vec::with_capacity(BLOCK_LEN + 64 + artwork.title.len() + artwork.caption.len());

    buf.extend_from_slice(&artwork.id.to_le_bytes());
    buf.extend_from_slice(&artwork.user_id.to_le_bytes());
    buf.extend_from_slice(&artwork.total_view.to_le_bytes());
    buf.extend_from_slice(&artwork.total_bookmarks.to_le_bytes());
    buf.extend_from_slice(&artwork.page_count.to_le_bytes());
    buf.extend_from_slice(&artwork.width.to_le_bytes());
    buf.extend_from_slice(&artwork.height.to_le_bytes());
    buf.push(artwork.kind as u8);
    buf.push(artwork.extension as u8);
    buf.push(artwork.hide_reason as u8);
    // The officially-removed marker is intentionally not part of this byte;
    // it travels out-of-band in the relational store.
    buf.push(artwork.flags.bits());
    buf.extend_from_slice(&artwork.created_at.unix_timestamp().to_le_bytes());
    buf.extend_from_slice(&artwork.file_date.unix_timestamp().to_le_bytes());

    push_u32_run(&mut buf, &artwork.tags);
    push_opt_u32_run(&mut buf, artwork.extra_tags.as_deref());
    push_opt_u32_run(&mut buf, artwork.fake_tags.as_deref());
    push_u32_run(&mut buf, &artwork.tools);
    push_str(&mut buf, &artwork.title);
    push_str(&mut buf, &artwork.caption);
    push_opt_str(&mut buf, artwork.memo.as_deref());
    push_hide_run(&mut buf, artwork.hidden_pages.as_ref());
    push_opt_u16_run(&mut buf, artwork.frame_delays.as_deref());

    buf
}

/// Unpack an artwork record; the input must be exactly one encoded record.
pub fn decode_artwork(bytes: &[u8]) -> Result<Artwork> {
    let mut reader = Reader { buf: bytes, pos: 0 };

    let mut artwork = Artwork {
        id: reader.u64("id")?,
        user_id: reader.u64("user-id")?,
        total_view: reader.u64("total-view")?,
        total_bookmarks: reader.u64("total-bookmarks")?,
        page_count: reader.u32("page-count")?,
        width: reader.u32("width")?,
        height: reader.u32("height")?,
        ..Artwork::default()
    };

    let kind = reader.byte("kind")?;
    artwork.kind = ArtworkKind::try_from(kind).or_raise(|| ErrorKind::InvalidValue("kind", kind))?;
    let extension = reader.byte("extension")?;
    artwork.extension =
        ExtensionKind::try_from(extension).or_raise(|| ErrorKind::InvalidValue("extension", extension))?;
    let reason = reader.byte("hide-reason")?;
    artwork.hide_reason = HideReason::try_from(reason).or_raise(|| ErrorKind::InvalidValue("hide-reason", reason))?;
    artwork.flags = ArtworkFlags::from_bits(reader.byte("flags")?);

    artwork.created_at =
        UtcDateTime::from_unix_timestamp(reader.i64("created-at")?).or_raise(|| ErrorKind::Timestamp)?;
    artwork.file_date = UtcDateTime::from_unix_timestamp(reader.i64("file-date")?).or_raise(|| ErrorKind::Timestamp)?;

    artwork.tags = reader
        .field("tags")?
        .map(|run| u32_run("tags", run))
        .transpose()?
        .ok_or_raise(|| ErrorKind::Absent("tags"))?;
    artwork.extra_tags = reader.field("extra-tags")?.map(|run| u32_run("extra-tags", run)).transpose()?;
    artwork.fake_tags = reader.field("fake-tags")?.map(|run| u32_run("fake-tags", run)).transpose()?;
    artwork.tools = reader
        .field("tools")?
        .map(|run| u32_run("tools", run))
        .transpose()?
        .ok_or_raise(|| ErrorKind::Absent("tools"))?;

    artwork.title = required_str("title", reader.field("title")?)?;
    artwork.caption = required_str("caption", reader.field("caption")?)?;
    artwork.memo = reader.field("memo")?.map(|run| utf8("memo", run)).transpose()?;

    artwork.hidden_pages = reader.field("hidden-pages")?.map(hide_run).transpose()?;
    artwork.frame_delays = reader
        .field("frame-delays")?
        .map(|run| u16_run("frame-delays", run))
        .transpose()?;

    if reader.pos != reader.buf.len() {
        exn::bail!(ErrorKind::Trailing);
    }

    Ok(artwork)
}

fn push_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u32).to_le_bytes());
}

fn push_u32_run(buf: &mut Vec<u8>, values: &[u32]) {
    push_len(buf, values.len() * 4);
    for value in values {
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

fn push_opt_u32_run(buf: &mut Vec<u8>, values: Option<&[u32]>) {
    match values {
        Some(values) => push_u32_run(buf, values),
        None => buf.extend_from_slice(&ABSENT.to_le_bytes()),
    }
}

fn push_opt_u16_run(buf: &mut Vec<u8>, values: Option<&[u16]>) {
    match values {
        Some(values) => {
            push_len(buf, values.len() * 2);
            for value in values {
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }
        None => buf.extend_from_slice(&ABSENT.to_le_bytes()),
    }
}

fn push_str(buf: &mut Vec<u8>, value: &str) {
    push_len(buf, value.len());
    buf.extend_from_slice(value.as_bytes());
}

fn push_opt_str(buf: &mut Vec<u8>, value: Option<&str>) {
    match value {
        Some(value) => push_str(buf, value),
        None => buf.extend_from_slice(&ABSENT.to_le_bytes()),
    }
}

fn push_hide_run(buf: &mut Vec<u8>, map: Option<&BTreeMap<u32, HideReason>>) {
    match map {
        Some(map) => {
            push_len(buf, map.len() * 5);
            for (page, reason) in map {
                buf.extend_from_slice(&page.to_le_bytes());
                buf.push(*reason as u8);
            }
        }
        None => buf.extend_from_slice(&ABSENT.to_le_bytes()),
    }
}

fn u32_run(field: &'static str, run: &[u8]) -> Result<Vec<u32>> {
    if run.len() % 4 != 0 {
        exn::bail!(ErrorKind::Misaligned(field));
    }
    Ok(run
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn u16_run(field: &'static str, run: &[u8]) -> Result<Vec<u16>> {
    if run.len() % 2 != 0 {
        exn::bail!(ErrorKind::Misaligned(field));
    }
    Ok(run.chunks_exact(2).map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]])).collect())
}

fn utf8(field: &'static str, run: &[u8]) -> Result<String> {
    String::from_utf8(run.to_vec()).or_raise(|| ErrorKind::Utf8(field))
}

fn required_str(field: &'static str, run: Option<&[u8]>) -> Result<String> {
    match run {
        Some(run) => utf8(field, run),
        None => exn::bail!(ErrorKind::Absent(field)),
    }
}

fn hide_run(run: &[u8]) -> Result<BTreeMap<u32, HideReason>> {
    let mut decoder = crate::hide_run::HideRunDecoder::default();
    let mut map = BTreeMap::new();
    decoder.feed(run, &mut map)?;
    decoder.finish()?;
    Ok(map)
}

/// Bounds-checked little-endian reader over the input slice.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => exn::bail!(ErrorKind::Truncated(field)),
        }
    }

    fn byte(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    fn u32(&mut self, field: &'static str) -> Result<u32> {
        let bytes = self.take(4, field)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self, field: &'static str) -> Result<u64> {
        let b = self.take(8, field)?;
        Ok(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    fn i64(&mut self, field: &'static str) -> Result<i64> {
        let b = self.take(8, field)?;
        Ok(i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    /// Read a length-delimited field; `None` means the absent sentinel.
    fn field(&mut self, field: &'static str) -> Result<Option<&'a [u8]>> {
        let len = self.u32(field)?;
        if len == ABSENT {
            return Ok(None);
        }
        let len = len as usize;
        if self.buf.len() - self.pos < len {
            exn::bail!(ErrorKind::LengthOverrun(field));
        }
        Ok(Some(self.take(len, field)?))
    }
}
