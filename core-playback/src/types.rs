//! Verse coordinates and the value objects passed between the playback
//! components.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};

/// Number of surahs in the Quran.
pub const SURAH_COUNT: u16 = 114;

/// What is currently loaded, not necessarily playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackPosition {
    pub surah_id: u16,
    pub verse_id: u16,
    pub total_verses: u16,
    pub surah_name: String,
}

impl PlaybackPosition {
    pub fn new(
        surah_id: u16,
        verse_id: u16,
        total_verses: u16,
        surah_name: impl Into<String>,
    ) -> Result<Self> {
        validate_coordinates(surah_id, verse_id, total_verses)?;
        Ok(Self {
            surah_id,
            verse_id,
            total_verses,
            surah_name: surah_name.into(),
        })
    }

    pub fn is_last_verse(&self) -> bool {
        self.verse_id >= self.total_verses
    }

    /// Same surah, different verse (clamped to the surah).
    pub fn with_verse(&self, verse_id: u16) -> Self {
        Self {
            verse_id: verse_id.clamp(1, self.total_verses),
            ..self.clone()
        }
    }

    pub fn is_at(&self, surah_id: u16, verse_id: u16) -> bool {
        self.surah_id == surah_id && self.verse_id == verse_id
    }
}

/// A surah and its verse count, used by batch cache status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurahSummary {
    pub surah_id: u16,
    pub total_verses: u16,
}

impl SurahSummary {
    pub fn new(surah_id: u16, total_verses: u16) -> Self {
        Self {
            surah_id,
            total_verses,
        }
    }
}

/// A play request for an uncached surah waiting for the user's decision.
///
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPrompt {
    pub surah_id: u16,
    pub verse_id: u16,
    pub total_verses: u16,
    pub surah_name: String,
}

impl DownloadPrompt {
    pub fn position(&self) -> PlaybackPosition {
        PlaybackPosition {
            surah_id: self.surah_id,
            verse_id: self.verse_id,
            total_verses: self.total_verses,
            surah_name: self.surah_name.clone(),
        }
    }
}

impl From<&PlaybackPosition> for DownloadPrompt {
    fn from(position: &PlaybackPosition) -> Self {
        Self {
            surah_id: position.surah_id,
            verse_id: position.verse_id,
            total_verses: position.total_verses,
            surah_name: position.surah_name.clone(),
        }
    }
}

/// Checks `1 <= surah <= 114` and `1 <= verse <= total`.
pub fn validate_coordinates(surah_id: u16, verse_id: u16, total_verses: u16) -> Result<()> {
    if !(1..=SURAH_COUNT).contains(&surah_id) {
        return Err(PlaybackError::InvalidVerse(format!(
            "surah {} is outside 1..={}",
            surah_id, SURAH_COUNT
        )));
    }
    if total_verses == 0 {
        return Err(PlaybackError::InvalidVerse(format!(
            "surah {} must have at least one verse",
            surah_id
        )));
    }
    if !(1..=total_verses).contains(&verse_id) {
        return Err(PlaybackError::InvalidVerse(format!(
            "verse {} is outside 1..={} of surah {}",
            verse_id, total_verses, surah_id
        )));
    }
    Ok(())
}
