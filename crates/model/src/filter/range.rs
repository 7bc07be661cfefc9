use time::UtcDateTime;

/// Inclusive numeric range over a single column.
///
/// A `max` of exactly zero is a documented short-circuit: it compiles to a
/// constant-false predicate rather than an error, so "show nothing" filters
/// stay expressible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MinMaxFilter {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl MinMaxFilter {
    /// True when the range cannot exclude anything.
    pub fn is_no_filter(&self) -> bool {
        self.min.is_none_or(|min| min == 0) && self.max.is_none_or(|max| max == u64::MAX)
    }

    pub fn contains(&self, value: u64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Inclusive creation-date range, compared as seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DateTimeFilter {
    pub since: Option<UtcDateTime>,
    pub until: Option<UtcDateTime>,
}

impl DateTimeFilter {
    pub fn is_empty(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }
}
