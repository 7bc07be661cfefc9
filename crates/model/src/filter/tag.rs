use crate::filter::default_true;

/// Tag set algebra over a record's tag memberships.
///
/// The intersect side (`exacts`/`partials`) selects records *having* the
/// tag combination, the except side (`ignore_*`) subtracts records having
/// the ignored combination. Each side has its own or-flag: `false` requires
/// every term, `true` accepts any term. Both sides present at once is
/// legal - except is applied by set subtraction after the intersect chain.
///
/// Partial terms shorter than three characters are matched by substring,
/// longer ones through the tag full-text index.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TagFilter {
    #[serde(rename = "exact")]
    pub exacts: Vec<String>,
    #[serde(rename = "partial")]
    pub partials: Vec<String>,
    pub or: bool,
    #[serde(rename = "ignore-exact")]
    pub ignore_exacts: Vec<String>,
    #[serde(rename = "ignore-partial")]
    pub ignore_partials: Vec<String>,
    pub ignore_or: bool,
}

impl Default for TagFilter {
    fn default() -> Self {
        Self {
            exacts: Vec::new(),
            partials: Vec::new(),
            or: default_true(),
            ignore_exacts: Vec::new(),
            ignore_partials: Vec::new(),
            ignore_or: default_true(),
        }
    }
}

impl TagFilter {
    pub fn has_intersect(&self) -> bool {
        !self.exacts.is_empty() || !self.partials.is_empty()
    }

    pub fn has_except(&self) -> bool {
        !self.ignore_exacts.is_empty() || !self.ignore_partials.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_intersect() && !self.has_except()
    }
}
