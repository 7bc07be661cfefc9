/// Post-query filter over the physical presence of archived files.
///
/// This cannot be expressed relationally: the store evaluates the rest of
/// the filter first, then probes the filesystem per matched record. Its
/// presence defers LIMIT/OFFSET to after the probe (two-phase contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExistenceFilter {
    /// Rule over how many of the record's visible pages must exist on disk.
    pub pages: Option<CountRule>,
    /// For animation records only: whether the frame archive must (or must
    /// not) exist.
    pub archive: Option<bool>,
    /// How the page rule and the archive rule combine when both apply.
    pub relation: Relation,
}

/// How many pages must pass the existence probe.
///
/// `Min`/`Max` bounds are compared against the count of *visible* pages, so
/// `Min(1)` means "at least one page present" and `Max(0)` means "nothing
/// present".
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountRule {
    /// Every visible page must exist.
    All,
    Min(u32),
    Max(u32),
}

/// Boolean combinator for the page and archive checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    #[default]
    And,
    Or,
    Xor,
}

impl CountRule {
    pub fn accepts(&self, present: u32, total: u32) -> bool {
        match *self {
            Self::All => present == total,
            Self::Min(min) => present >= min,
            Self::Max(max) => present <= max,
        }
    }
}

impl Relation {
    pub fn combine(&self, left: bool, right: bool) -> bool {
        match self {
            Self::And => left && right,
            Self::Or => left || right,
            Self::Xor => left ^ right,
        }
    }
}
