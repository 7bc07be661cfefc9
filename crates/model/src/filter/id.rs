/// Explicit id inclusion/exclusion.
///
/// An empty filter (both lists empty) contributes nothing to a query.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct IdFilter {
    #[serde(rename = "id")]
    pub ids: Vec<u64>,
    #[serde(rename = "ignore-id")]
    pub ignore_ids: Vec<u64>,
}

impl IdFilter {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.ignore_ids.is_empty()
    }
}
