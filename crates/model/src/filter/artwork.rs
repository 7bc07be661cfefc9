use crate::ArtworkKind;
use crate::filter::{
    ArtworkOrder, DateTimeFilter, ExistenceFilter, HideFilter, IdFilter, MinMaxFilter, TagFilter, TextFilter,
    UserFilter,
};

/// The full declarative query over artworks.
///
/// Every field is independent; absent fields contribute nothing. The
/// compiler walks the fields in a fixed order, so two equal filters always
/// produce identical query text.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ArtworkFilter {
    pub id_filter: Option<IdFilter>,
    pub tag_filter: Option<TagFilter>,
    pub hide_filter: Option<HideFilter>,
    pub officially_removed: Option<bool>,
    pub bookmarked: Option<bool>,
    pub visible: Option<bool>,
    pub muted: Option<bool>,
    pub total_view: Option<MinMaxFilter>,
    pub total_bookmarks: Option<MinMaxFilter>,
    pub page_count: Option<MinMaxFilter>,
    pub width: Option<MinMaxFilter>,
    pub height: Option<MinMaxFilter>,
    pub kind: Option<ArtworkKind>,
    pub restricted: Option<bool>,
    #[serde(rename = "date")]
    pub date_filter: Option<DateTimeFilter>,
    #[serde(rename = "text")]
    pub text_filter: Option<TextFilter>,
    pub user_filter: Option<Box<UserFilter>>,
    #[serde(rename = "file")]
    pub existence: Option<ExistenceFilter>,
    pub order: ArtworkOrder,
    pub count: Option<u32>,
    pub offset: u32,
}

impl ArtworkFilter {
    /// True when LIMIT/OFFSET must not be compiled into the query because a
    /// post-query existence probe can still reject rows; paging then happens
    /// after that probe.
    pub fn defers_paging(&self) -> bool {
        self.existence.is_some()
    }
}
