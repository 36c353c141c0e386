//! Media handle bridge trait and host media events.
//!
//! The host owns a single platform media element (an `<audio>` element on the
//! web, an `AVPlayer` on iOS, a `MediaPlayer` on Android). The core drives it
//! through [`MediaHandle`] and the host reports what happened to it by
//! forwarding [`MediaEvent`]s back into the core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Why the host media element reported an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaErrorKind {
    /// Loading was aborted, typically because a new source replaced the
    /// previous one before it finished loading.
    Aborted,
    /// The source could not be fetched.
    Network,
    /// The source was fetched but could not be decoded.
    Decode,
    /// The source format is not supported by the host engine.
    SourceNotSupported,
    /// Anything the host cannot classify.
    Other(String),
}

impl MediaErrorKind {
    /// Returns `true` for errors caused by rapid source switching.
    pub fn is_abort(&self) -> bool {
        matches!(self, MediaErrorKind::Aborted)
    }
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaErrorKind::Aborted => write!(f, "loading aborted"),
            MediaErrorKind::Network => write!(f, "network error"),
            MediaErrorKind::Decode => write!(f, "decode error"),
            MediaErrorKind::SourceNotSupported => write!(f, "source not supported"),
            MediaErrorKind::Other(message) => write!(f, "{}", message),
        }
    }
}

/// Events the host forwards from its media element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaEvent {
    /// The most recently loaded source can start playing.
    Ready,
    /// Playback reached the natural end of the source.
    Ended,
    /// The media element failed.
    Error(MediaErrorKind),
}

/// Control surface of the host media element.
///
/// Exactly one implementation instance exists per application and only the
/// playback engine calls it.
#[async_trait]
pub trait MediaHandle: Send + Sync {
    /// Replace the current source. Completion is reported asynchronously via
    /// [`MediaEvent::Ready`] or [`MediaEvent::Error`].
    async fn load(&self, url: &str) -> Result<()>;

    /// Start or resume playback of the loaded source.
    async fn play(&self) -> Result<()>;

    /// Pause without changing the playhead.
    async fn pause(&self) -> Result<()>;

    /// Halt playback and rewind the playhead to the start.
    async fn stop(&self) -> Result<()>;

    /// Rewind to the start of the loaded source and play it again.
    async fn replay(&self) -> Result<()>;

    /// Whether the element is currently paused.
    async fn is_paused(&self) -> bool;
}
