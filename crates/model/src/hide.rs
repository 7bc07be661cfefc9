use derive_more::{Display, Error};

/// Why a record (or a single page of it) is suppressed from default views.
///
/// Distinct from deletion: hidden records stay in the archive and can be
/// filtered back in with an explicit [`HideFilter`](crate::filter::HideFilter).
/// The numeric values are part of the on-disk format (both the relational
/// column and the packed snapshot byte) and must not be reordered.
#[repr(u8)]
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HideReason {
    #[default]
    NotHidden = 0,
    LowQuality = 1,
    Irrelevant = 2,
    ExternalLink = 3,
    Dislike = 4,
    Crop = 5,
}

/// Error for a byte that does not name a [`HideReason`].
#[derive(Debug, Display, Error)]
#[display("unknown hide reason: {_0}")]
pub struct UnknownHideReason(#[error(not(source))] pub u8);

impl TryFrom<u8> for HideReason {
    type Error = UnknownHideReason;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::NotHidden,
            1 => Self::LowQuality,
            2 => Self::Irrelevant,
            3 => Self::ExternalLink,
            4 => Self::Dislike,
            5 => Self::Crop,
            other => return Err(UnknownHideReason(other)),
        })
    }
}

impl From<HideReason> for u8 {
    fn from(value: HideReason) -> Self {
        value as u8
    }
}
