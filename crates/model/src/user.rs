use crate::hide::HideReason;

/// One archived user (artwork owner).
///
/// Most fields are optional because the crawler learns about users from
/// several response shapes of very different depth; the merge rule keeps
/// whatever was known when a shallower snapshot arrives later.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub id: u64,
    pub name: Option<String>,
    pub account: Option<String>,
    pub is_followed: bool,
    pub is_muted: bool,
    pub is_officially_removed: bool,
    pub hide_reason: HideReason,
    pub image_urls: Option<String>,
    pub comment: Option<String>,
    pub memo: Option<String>,
    pub profile: Option<UserProfile>,
    pub workspace: Option<UserWorkspace>,
    /// Locally attached tag ids. `None` means "never tagged".
    pub extra_tags: Option<Vec<u32>>,
}

/// Rich profile detail, present only after a full user fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub webpage: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<String>,
    pub region: Option<String>,
    pub job: Option<String>,
    pub total_following: u64,
    pub total_artworks: u64,
    pub total_public_bookmarks: u64,
    pub twitter_account: Option<String>,
    pub is_premium: bool,
}

/// Workspace detail, present only after a full user fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserWorkspace {
    pub pc: Option<String>,
    pub monitor: Option<String>,
    pub tool: Option<String>,
    pub tablet: Option<String>,
    pub desk: Option<String>,
    pub music: Option<String>,
    pub comment: Option<String>,
    pub image_url: Option<String>,
}

impl User {
    /// Merge a fresher snapshot of the same user into this record.
    ///
    /// Boolean and identity fields are replaced outright; every optional
    /// field is taken from the source only when it carries a value, so a
    /// shallow preview response cannot erase a previously fetched profile.
    pub fn merge_from(&mut self, source: User) {
        if self.id != source.id {
            return;
        }

        self.is_followed = source.is_followed;
        self.is_muted = source.is_muted;
        self.is_officially_removed = source.is_officially_removed;
        self.hide_reason = source.hide_reason;

        if let Some(name) = source.name {
            self.name = Some(name);
        }
        if let Some(account) = source.account {
            self.account = Some(account);
        }
        if let Some(urls) = source.image_urls {
            self.image_urls = Some(urls);
        }
        if let Some(comment) = source.comment {
            self.comment = Some(comment);
        }
        if let Some(memo) = source.memo {
            self.memo = Some(memo);
        }
        if let Some(profile) = source.profile {
            self.profile = Some(profile);
        }
        if let Some(workspace) = source.workspace {
            self.workspace = Some(workspace);
        }
        if let Some(tags) = source.extra_tags {
            self.extra_tags = Some(tags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_detail_on_shallow_source() {
        let mut current = User {
            id: 1,
            name: Some("alpha".to_string()),
            profile: Some(UserProfile {
                total_artworks: 12,
                ..UserProfile::default()
            }),
            ..User::default()
        };
        let shallow = User {
            id: 1,
            is_followed: true,
            ..User::default()
        };
        current.merge_from(shallow);
        assert!(current.is_followed);
        assert_eq!(current.name.as_deref(), Some("alpha"));
        assert_eq!(current.profile.as_ref().map(|p| p.total_artworks), Some(12));
    }

    #[test]
    fn test_merge_replaces_present_fields() {
        let mut current = User {
            id: 1,
            name: Some("old".to_string()),
            ..User::default()
        };
        let fresh = User {
            id: 1,
            name: Some("new".to_string()),
            extra_tags: Some(vec![3]),
            ..User::default()
        };
        current.merge_from(fresh);
        assert_eq!(current.name.as_deref(), Some("new"));
        assert_eq!(current.extra_tags.as_deref(), Some(&[3][..]));
    }
}
