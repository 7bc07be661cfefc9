use crate::hide::HideReason;

/// Which hide reasons a query accepts.
///
/// Absence of the whole filter means "only records that are not hidden".
/// When both lists are populated, `allow` wins - at most one of the two is
/// meaningful at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HideFilter {
    pub allow: Vec<HideReason>,
    pub disallow: Vec<HideReason>,
}

impl HideFilter {
    pub fn accepts(&self, reason: HideReason) -> bool {
        if !self.allow.is_empty() {
            self.allow.contains(&reason)
        } else if !self.disallow.is_empty() {
            !self.disallow.contains(&reason)
        } else {
            true
        }
    }
}
