/// Closed set of orderings a compiled artwork query may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtworkOrder {
    /// No ORDER BY clause; row order is whatever the engine produces.
    #[default]
    None,
    Id,
    ReverseId,
    View,
    ReverseView,
    Bookmarks,
    ReverseBookmarks,
    UserId,
    ReverseUserId,
}
