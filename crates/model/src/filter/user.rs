use crate::filter::{HideFilter, IdFilter, TagFilter, TextFilter};

/// Declarative query over users; also nested inside an
/// [`ArtworkFilter`](crate::filter::ArtworkFilter) to constrain the owning
/// user, where it compiles into its own alias namespace.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserFilter {
    pub id_filter: Option<IdFilter>,
    pub tag_filter: Option<TagFilter>,
    pub hide_filter: Option<HideFilter>,
    pub followed: Option<bool>,
    pub muted: Option<bool>,
    #[serde(rename = "name")]
    pub name_filter: Option<TextFilter>,
}
