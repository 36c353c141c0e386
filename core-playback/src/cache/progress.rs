//! Download progress reporting

use serde::{Deserialize, Serialize};

/// Progress of a surah download, reported after every verse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub surah_id: u16,

    /// Verses processed so far, skipped and failed ones included
    pub completed: u16,

    pub total: u16,

    /// Verses that could not be fetched
    pub failed: u16,
}

impl DownloadProgress {
    pub fn new(surah_id: u16, total: u16) -> Self {
        Self {
            surah_id,
            completed: 0,
            total,
            failed: 0,
        }
    }

    /// Percentage of processed verses (0-100).
    pub fn percent_complete(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let percent = u32::from(self.completed.min(self.total)) * 100 / u32::from(self.total);
        percent as u8
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}
