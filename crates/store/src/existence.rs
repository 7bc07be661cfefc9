//! File-existence post-filtering.
//!
//! Some filters ask about the physical archive ("which bookmarked works are
//! missing pages on disk?"), which no relational predicate can answer. The
//! store evaluates the compiled query first and probes the filesystem per
//! matched record through the [`ArtworkFiles`] trait; LIMIT/OFFSET were
//! deferred by the compiler, so paging happens after this probe.

use kura_model::filter::ExistenceFilter;
use kura_model::{Artwork, ArtworkKind, ExtensionKind};
use std::path::PathBuf;

/// Probe for the archived files of an artwork.
pub trait ArtworkFiles: Send + Sync {
    /// Whether the given page's image file is present.
    fn page_exists(&self, artwork: &Artwork, page: u32) -> bool;

    /// Whether the animation frame archive is present. Only consulted for
    /// animation-kind records.
    fn archive_exists(&self, artwork: &Artwork) -> bool;
}

/// Directory-layout probe over the configured library roots: pages live at
/// `<originals>/<id>_p<page>.<ext>`, frame archives at `<archives>/<id>.zip`.
#[derive(Debug, Clone)]
pub struct LibraryFiles {
    originals: PathBuf,
    archives: PathBuf,
}

impl LibraryFiles {
    pub fn new(originals: impl Into<PathBuf>, archives: impl Into<PathBuf>) -> Self {
        Self {
            originals: originals.into(),
            archives: archives.into(),
        }
    }
}

impl ArtworkFiles for LibraryFiles {
    fn page_exists(&self, artwork: &Artwork, page: u32) -> bool {
        let Some(extension) = extension_str(artwork.extension) else {
            return false;
        };
        self.originals.join(format!("{}_p{}.{}", artwork.id, page, extension)).is_file()
    }

    fn archive_exists(&self, artwork: &Artwork) -> bool {
        self.archives.join(format!("{}.zip", artwork.id)).is_file()
    }
}

fn extension_str(extension: ExtensionKind) -> Option<&'static str> {
    match extension {
        ExtensionKind::None => None,
        ExtensionKind::Jpg => Some("jpg"),
        ExtensionKind::Png => Some("png"),
        ExtensionKind::Gif => Some("gif"),
        ExtensionKind::Zip => Some("zip"),
    }
}

/// Evaluate the post-filter for one record.
///
/// The page rule counts probes over the *visible* pages; the archive rule
/// applies to animation records only; when both apply they combine through
/// the filter's relation. A filter with neither rule accepts everything.
pub(crate) fn existence_matches(filter: &ExistenceFilter, artwork: &Artwork, files: &dyn ArtworkFiles) -> bool {
    let pages = filter.pages.map(|rule| {
        let mut total = 0u32;
        let mut present = 0u32;
        for page in artwork.visible_pages() {
            total += 1;
            if files.page_exists(artwork, page) {
                present += 1;
            }
        }
        rule.accepts(present, total)
    });

    let archive = if artwork.kind == ArtworkKind::Animation {
        filter.archive.map(|wanted| files.archive_exists(artwork) == wanted)
    } else {
        None
    };

    match (pages, archive) {
        (Some(pages), Some(archive)) => filter.relation.combine(pages, archive),
        (Some(pages), None) => pages,
        (None, Some(archive)) => archive,
        (None, None) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kura_model::filter::{CountRule, Relation};
    use std::collections::HashSet;

    struct FakeFiles {
        pages: HashSet<(u64, u32)>,
        archives: HashSet<u64>,
    }

    impl ArtworkFiles for FakeFiles {
        fn page_exists(&self, artwork: &Artwork, page: u32) -> bool {
            self.pages.contains(&(artwork.id, page))
        }

        fn archive_exists(&self, artwork: &Artwork) -> bool {
            self.archives.contains(&artwork.id)
        }
    }

    fn artwork(kind: ArtworkKind, pages: u32) -> Artwork {
        Artwork {
            id: 1,
            page_count: pages,
            kind,
            ..Artwork::default()
        }
    }

    #[test]
    fn test_all_rule_counts_visible_pages() {
        let files = FakeFiles {
            pages: HashSet::from([(1, 0), (1, 1)]),
            archives: HashSet::new(),
        };
        let filter = ExistenceFilter {
            pages: Some(CountRule::All),
            ..ExistenceFilter::default()
        };
        assert!(existence_matches(&filter, &artwork(ArtworkKind::Manga, 2), &files));
        assert!(!existence_matches(&filter, &artwork(ArtworkKind::Manga, 3), &files));
    }

    #[test]
    fn test_archive_rule_only_applies_to_animations() {
        let files = FakeFiles {
            pages: HashSet::new(),
            archives: HashSet::new(),
        };
        let filter = ExistenceFilter {
            archive: Some(true),
            ..ExistenceFilter::default()
        };
        // Missing archive fails the animation, but an illustration never
        // consults the rule.
        assert!(!existence_matches(&filter, &artwork(ArtworkKind::Animation, 1), &files));
        assert!(existence_matches(&filter, &artwork(ArtworkKind::Illustration, 1), &files));
    }

    #[test]
    fn test_xor_relation() {
        let files = FakeFiles {
            pages: HashSet::from([(1, 0)]),
            archives: HashSet::new(),
        };
        let filter = ExistenceFilter {
            pages: Some(CountRule::Min(1)),
            archive: Some(true),
            relation: Relation::Xor,
        };
        // Pages pass, archive fails: XOR accepts.
        assert!(existence_matches(&filter, &artwork(ArtworkKind::Animation, 1), &files));
    }

    #[test]
    fn test_empty_filter_accepts() {
        let files = FakeFiles {
            pages: HashSet::new(),
            archives: HashSet::new(),
        };
        assert!(existence_matches(&ExistenceFilter::default(), &artwork(ArtworkKind::Manga, 4), &files));
    }
}
