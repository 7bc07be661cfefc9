use crate::filter::default_true;

/// Free-text search over a record's text columns.
///
/// `exact` compares whole columns; `partials` search within them, using
/// substring matching for terms shorter than three characters and token
/// (full-text) matching otherwise. The `ignore_*` groups negate their
/// sub-predicate as a whole.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TextFilter {
    pub exact: Option<String>,
    #[serde(rename = "partial")]
    pub partials: Vec<String>,
    pub partial_or: bool,
    pub ignore_exact: Option<String>,
    #[serde(rename = "ignore-partial")]
    pub ignore_partials: Vec<String>,
    pub ignore_partial_or: bool,
}

impl Default for TextFilter {
    fn default() -> Self {
        Self {
            exact: None,
            partials: Vec::new(),
            partial_or: default_true(),
            ignore_exact: None,
            ignore_partials: Vec::new(),
            ignore_partial_or: default_true(),
        }
    }
}
