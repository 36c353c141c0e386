//! # Playback Error Types
//!
//! Error types for verse playback, offline downloads and repeat settings.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback and download operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Download Errors
    // ========================================================================
    /// Too many verses of a surah could not be fetched.
    #[error("Download of surah {surah} failed: {failed} of {total} verses could not be fetched")]
    DownloadFailed { surah: u16, failed: u16, total: u16 },

    /// The download was cancelled before every verse was processed.
    #[error("Download of surah {surah} cancelled after {completed} verses")]
    DownloadCancelled { surah: u16, completed: u16 },

    /// Another surah download is still running.
    #[error("A download is already in progress (surah {surah})")]
    DownloadInProgress { surah: u16 },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// No reciter is registered under this id.
    #[error("Unknown reciter: {0}")]
    UnknownReciter(String),

    /// Repeat settings violate their range invariants.
    #[error("Invalid repeat configuration: {0}")]
    InvalidRepeatConfig(String),

    /// Surah or verse coordinates are out of range.
    #[error("Invalid verse: {0}")]
    InvalidVerse(String),

    // ========================================================================
    // Storage / Platform Errors
    // ========================================================================
    /// Cache store operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Host bridge failure (media handle, settings store, HTTP client).
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Persisted settings could not be encoded or decoded.
    #[error("Settings serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if the user cancelled the operation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PlaybackError::DownloadCancelled { .. })
    }

    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::DownloadFailed { .. }
                | PlaybackError::DownloadInProgress { .. }
                | PlaybackError::Bridge(BridgeError::OperationFailed(_))
        )
    }

    /// Returns `true` for failures of a surah download other than cancellation.
    pub fn is_download_failure(&self) -> bool {
        matches!(
            self,
            PlaybackError::DownloadFailed { .. } | PlaybackError::DownloadInProgress { .. }
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
