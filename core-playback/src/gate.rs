//! Download gate: holds the play request for an uncached surah until the user
//! picks streaming, downloading or cancelling.

use crate::types::DownloadPrompt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The user's answer to a download prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateResolution {
    /// Play straight from the audio host.
    Stream,
    /// Download the whole surah first, then play.
    Download,
    /// Dismiss without playing.
    Cancel,
}

/// At most one pending prompt. A newer prompt replaces the older one.
#[derive(Debug, Default)]
pub struct DownloadGate {
    pending: Mutex<Option<DownloadPrompt>>,
}

impl DownloadGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds `prompt`, returning the one it replaced.
    pub fn prompt(&self, prompt: DownloadPrompt) -> Option<DownloadPrompt> {
        debug!(surah = prompt.surah_id, verse = prompt.verse_id, "Download prompt raised");
        self.pending.lock().replace(prompt)
    }

    pub fn pending(&self) -> Option<DownloadPrompt> {
        self.pending.lock().clone()
    }

    /// Removes and returns the pending prompt.
    pub fn take(&self) -> Option<DownloadPrompt> {
        self.pending.lock().take()
    }

    pub fn clear(&self) {
        self.pending.lock().take();
    }
}
