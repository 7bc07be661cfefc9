use crate::hide::HideReason;
use derive_more::{Display, Error};
use std::collections::BTreeMap;
use time::UtcDateTime;

/// What kind of artwork a record describes.
///
/// Stored as a single byte in both the relational column and the packed
/// snapshot; values are fixed.
#[repr(u8)]
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtworkKind {
    #[default]
    None = 0,
    Illustration = 1,
    Manga = 2,
    /// Multi-frame animation; the only kind that carries frame delays and
    /// an archive file on disk.
    Animation = 3,
}

#[derive(Debug, Display, Error)]
#[display("unknown artwork kind: {_0}")]
pub struct UnknownArtworkKind(#[error(not(source))] pub u8);

impl TryFrom<u8> for ArtworkKind {
    type Error = UnknownArtworkKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::None,
            1 => Self::Illustration,
            2 => Self::Manga,
            3 => Self::Animation,
            other => return Err(UnknownArtworkKind(other)),
        })
    }
}

/// On-disk file format of the archived pages.
#[repr(u8)]
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionKind {
    #[default]
    None = 0,
    Jpg = 1,
    Png = 2,
    Gif = 3,
    Zip = 4,
}

#[derive(Debug, Display, Error)]
#[display("unknown extension kind: {_0}")]
pub struct UnknownExtensionKind(#[error(not(source))] pub u8);

impl TryFrom<u8> for ExtensionKind {
    type Error = UnknownExtensionKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::None,
            1 => Self::Jpg,
            2 => Self::Png,
            3 => Self::Gif,
            4 => Self::Zip,
            other => return Err(UnknownExtensionKind(other)),
        })
    }
}

/// The packed boolean flags of an [`Artwork`], one bit each.
///
/// Bit positions are part of the snapshot format (byte 47 of the flat
/// block): bit 0 hide-last-page, bit 1 muted, bit 2 visible, bit 3
/// bookmarked, bit 4 restricted. The officially-removed marker is *not*
/// part of this byte; it lives out-of-band in the relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArtworkFlags(u8);

impl ArtworkFlags {
    const HIDE_LAST_PAGE: u8 = 1 << 0;
    const MUTED: u8 = 1 << 1;
    const VISIBLE: u8 = 1 << 2;
    const BOOKMARKED: u8 = 1 << 3;
    const RESTRICTED: u8 = 1 << 4;
    const KNOWN: u8 = Self::HIDE_LAST_PAGE | Self::MUTED | Self::VISIBLE | Self::BOOKMARKED | Self::RESTRICTED;

    /// Reconstruct from a raw snapshot byte. Unknown bits are dropped.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::KNOWN)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    const fn get(self, mask: u8) -> bool {
        self.0 & mask != 0
    }

    const fn set(&mut self, mask: u8, value: bool) {
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    pub const fn hide_last_page(self) -> bool {
        self.get(Self::HIDE_LAST_PAGE)
    }

    pub const fn set_hide_last_page(&mut self, value: bool) {
        self.set(Self::HIDE_LAST_PAGE, value);
    }

    pub const fn muted(self) -> bool {
        self.get(Self::MUTED)
    }

    pub const fn set_muted(&mut self, value: bool) {
        self.set(Self::MUTED, value);
    }

    pub const fn visible(self) -> bool {
        self.get(Self::VISIBLE)
    }

    pub const fn set_visible(&mut self, value: bool) {
        self.set(Self::VISIBLE, value);
    }

    pub const fn bookmarked(self) -> bool {
        self.get(Self::BOOKMARKED)
    }

    pub const fn set_bookmarked(&mut self, value: bool) {
        self.set(Self::BOOKMARKED, value);
    }

    pub const fn restricted(self) -> bool {
        self.get(Self::RESTRICTED)
    }

    pub const fn set_restricted(&mut self, value: bool) {
        self.set(Self::RESTRICTED, value);
    }
}

/// One archived artwork and everything known about it.
///
/// `tags` and `tools` are always present (empty, never absent); the
/// `extra_*` fields distinguish empty from unknown because partial refreshes
/// (a listing response without tag detail) must not erase previously known
/// data - see [`Artwork::merge_from`].
#[derive(Debug, Clone, PartialEq)]
pub struct Artwork {
    pub id: u64,
    pub user_id: u64,
    pub total_view: u64,
    pub total_bookmarks: u64,
    pub page_count: u32,
    pub width: u32,
    pub height: u32,
    pub kind: ArtworkKind,
    pub extension: ExtensionKind,
    pub hide_reason: HideReason,
    pub flags: ArtworkFlags,
    /// Out-of-band of the flag byte: set when the remote site no longer
    /// serves the artwork (or its owner changed/vanished).
    pub is_officially_removed: bool,
    pub created_at: UtcDateTime,
    pub file_date: UtcDateTime,
    /// Tag ids reported by the remote site (cross-reference value kind 1).
    pub tags: Vec<u32>,
    /// Locally added tag ids (value kind 2). `None` means "never fetched".
    pub extra_tags: Option<Vec<u32>>,
    /// Tag ids locally marked as wrong (value kind 0); they suppress the
    /// matching entry of `tags`/`extra_tags`.
    pub fake_tags: Option<Vec<u32>>,
    pub tools: Vec<u32>,
    pub title: String,
    pub caption: String,
    pub memo: Option<String>,
    /// Page index -> reason for per-page suppression.
    pub hidden_pages: Option<BTreeMap<u32, HideReason>>,
    /// Per-frame delays in milliseconds; animation kind only.
    pub frame_delays: Option<Vec<u16>>,
}

impl Default for Artwork {
    fn default() -> Self {
        Self {
            id: 0,
            user_id: 0,
            total_view: 0,
            total_bookmarks: 0,
            page_count: 0,
            width: 0,
            height: 0,
            kind: ArtworkKind::default(),
            extension: ExtensionKind::default(),
            hide_reason: HideReason::default(),
            flags: ArtworkFlags::default(),
            is_officially_removed: false,
            created_at: UtcDateTime::UNIX_EPOCH,
            file_date: UtcDateTime::UNIX_EPOCH,
            tags: Vec::new(),
            extra_tags: None,
            fake_tags: None,
            tools: Vec::new(),
            title: String::new(),
            caption: String::new(),
            memo: None,
            hidden_pages: None,
            frame_delays: None,
        }
    }
}

impl Artwork {
    /// Collapse the three tag arrays into the cross-reference map of
    /// tag id -> value kind (0 = locally faked, 1 = remote, 2 = locally
    /// added).
    ///
    /// A fake entry demotes a remote tag to kind 0 but erases a locally
    /// added one entirely: faking a tag you added yourself just undoes the
    /// addition.
    pub fn tag_kinds(&self) -> BTreeMap<u32, u8> {
        let mut map = BTreeMap::new();
        if let Some(extra) = &self.extra_tags {
            for &id in extra {
                map.insert(id, 2u8);
            }
        }
        for &id in &self.tags {
            map.insert(id, 1u8);
        }
        if let Some(fakes) = &self.fake_tags {
            for &id in fakes {
                match map.get(&id).copied() {
                    Some(1) => {
                        map.insert(id, 0u8);
                    }
                    Some(_) => {
                        map.remove(&id);
                    }
                    None => {}
                }
            }
        }
        map
    }

    /// Iterate the page indexes that are not suppressed.
    ///
    /// Empty when the record-level hide reason is set; otherwise skips pages
    /// hidden via the per-page map. The hide-last-page flag is presentation
    /// metadata and does not participate here.
    pub fn visible_pages(&self) -> VisiblePages<'_> {
        VisiblePages {
            next: 0,
            max_exclusive: if self.hide_reason == HideReason::NotHidden {
                self.page_count
            } else {
                0
            },
            hidden: self.hidden_pages.as_ref(),
        }
    }

    /// Merge a fresher snapshot of the same artwork into this record.
    ///
    /// Identity-bearing fields and the primary arrays are replaced outright;
    /// `total_view` never regresses; optional "extra" fields are taken from
    /// the source only when it actually carries them, so a partial refresh
    /// cannot erase known detail. A source with a different (or zero) owner
    /// marks the record officially removed.
    pub fn merge_from(&mut self, source: Artwork) {
        if self.id != source.id {
            return;
        }

        if self.user_id != source.user_id || source.user_id == 0 {
            self.is_officially_removed = true;
        }

        if self.total_view < source.total_view {
            self.total_view = source.total_view;
        }
        self.total_bookmarks = source.total_bookmarks;
        self.page_count = source.page_count;
        self.width = source.width;
        self.height = source.height;
        self.kind = source.kind;
        self.extension = source.extension;
        self.hide_reason = source.hide_reason;
        self.flags = source.flags;
        self.created_at = source.created_at;
        self.file_date = source.file_date;
        self.tags = source.tags;
        self.tools = source.tools;
        self.title = source.title;
        self.caption = source.caption;

        if let Some(extra) = source.extra_tags {
            self.extra_tags = Some(extra);
        }
        if let Some(fakes) = source.fake_tags {
            self.fake_tags = Some(fakes);
        }
        if let Some(memo) = source.memo {
            self.memo = Some(memo);
        }
        if let Some(hidden) = source.hidden_pages {
            self.hidden_pages = Some(hidden);
        }
        if let Some(frames) = source.frame_delays {
            self.frame_delays = Some(frames);
        }
    }
}

/// Iterator over the non-suppressed page indexes of an [`Artwork`].
#[derive(Debug)]
pub struct VisiblePages<'a> {
    next: u32,
    max_exclusive: u32,
    hidden: Option<&'a BTreeMap<u32, HideReason>>,
}

impl Iterator for VisiblePages<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        while self.next < self.max_exclusive {
            let index = self.next;
            self.next += 1;
            let suppressed = self
                .hidden
                .is_some_and(|map| map.get(&index).is_some_and(|reason| *reason != HideReason::NotHidden));
            if !suppressed {
                return Some(index);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn artwork() -> Artwork {
        Artwork {
            id: 1,
            user_id: 7,
            page_count: 3,
            ..Artwork::default()
        }
    }

    #[test]
    fn test_flag_bits_are_stable() {
        let mut flags = ArtworkFlags::default();
        flags.set_hide_last_page(true);
        assert_eq!(flags.bits(), 0b00001);
        flags.set_muted(true);
        assert_eq!(flags.bits(), 0b00011);
        flags.set_visible(true);
        assert_eq!(flags.bits(), 0b00111);
        flags.set_bookmarked(true);
        assert_eq!(flags.bits(), 0b01111);
        flags.set_restricted(true);
        assert_eq!(flags.bits(), 0b11111);
        flags.set_muted(false);
        assert_eq!(flags.bits(), 0b11101);
    }

    #[test]
    fn test_flags_from_bits_drops_unknown() {
        let flags = ArtworkFlags::from_bits(0b1110_0101);
        assert_eq!(flags.bits(), 0b0000_0101);
        assert!(flags.hide_last_page());
        assert!(flags.visible());
        assert!(!flags.muted());
    }

    #[test]
    fn test_tag_kinds_distributes_value_kinds() {
        let mut art = artwork();
        art.tags = vec![10, 20];
        art.extra_tags = Some(vec![30]);
        art.fake_tags = Some(vec![20, 30, 40]);
        let kinds = art.tag_kinds();
        // 10 stays remote, 20 demoted to fake, 30 (local) erased, 40 ignored.
        assert_eq!(kinds.get(&10), Some(&1));
        assert_eq!(kinds.get(&20), Some(&0));
        assert_eq!(kinds.get(&30), None);
        assert_eq!(kinds.get(&40), None);
    }

    #[test]
    fn test_visible_pages_skips_hidden() {
        let mut art = artwork();
        art.hidden_pages = Some(BTreeMap::from([(1, HideReason::Dislike), (2, HideReason::NotHidden)]));
        assert_eq!(art.visible_pages().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_visible_pages_empty_when_record_hidden() {
        let mut art = artwork();
        art.hide_reason = HideReason::LowQuality;
        assert_eq!(art.visible_pages().count(), 0);
    }

    #[test]
    fn test_merge_view_count_never_regresses() {
        let mut current = artwork();
        current.total_view = 500;
        let mut stale = artwork();
        stale.total_view = 200;
        stale.total_bookmarks = 9;
        current.merge_from(stale);
        assert_eq!(current.total_view, 500);
        assert_eq!(current.total_bookmarks, 9);
    }

    #[test]
    fn test_merge_keeps_extras_on_partial_source() {
        let mut current = artwork();
        current.extra_tags = Some(vec![30]);
        current.memo = Some("keep".to_string());
        let partial = artwork();
        current.merge_from(partial);
        assert_eq!(current.extra_tags.as_deref(), Some(&[30][..]));
        assert_eq!(current.memo.as_deref(), Some("keep"));
    }

    #[rstest]
    #[case(0, false)]
    #[case(7, false)]
    #[case(8, true)]
    fn test_merge_marks_removed_on_owner_change(#[case] source_user: u64, #[case] removed: bool) {
        let mut current = artwork();
        let mut source = artwork();
        source.user_id = source_user;
        let expect = removed || source_user == 0;
        current.merge_from(source);
        assert_eq!(current.is_officially_removed, expect);
    }

    #[test]
    fn test_merge_ignores_different_id() {
        let mut current = artwork();
        let mut other = artwork();
        other.id = 2;
        other.total_bookmarks = 99;
        current.merge_from(other);
        assert_eq!(current.total_bookmarks, 0);
    }
}
