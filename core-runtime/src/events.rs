//! # Event Bus System
//!
//! Provides an event-driven architecture for the recitation audio core using
//! `tokio::sync::broadcast`. Playback and download modules publish typed events
//! here; hosts subscribe to drive UI side effects (toasts, analytics, logs).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   emit   ┌───────────┐
//! │ Playback Engine├─────────>│           │   subscribe   ┌────────────┐
//! └────────────────┘          │ EventBus  ├──────────────>│ Subscriber │
//! ┌────────────────┐   emit   │ (broadcast│               └────────────┘
//! │ Download Cache ├─────────>│  channel) │
//! └────────────────┘          └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::Stopped))
//!     .ok();
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber was too slow and missed `n`
//!   events. Non-fatal; keep receiving.
//! - **`RecvError::Closed`**: all senders were dropped. Treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`, which publishers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback engine and repeat machine events
    Playback(PlaybackEvent),
    /// Offline download and cache events
    Download(DownloadEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::FellBackToStreaming { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Download(DownloadEvent::Completed { .. })
            | CoreEvent::Download(DownloadEvent::Cancelled { .. })
            | CoreEvent::Download(DownloadEvent::Deleted { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::ReciterChanged { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to verse playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A play request was accepted and the verse became the current position.
    VerseStarted {
        reciter_id: String,
        surah_id: u16,
        verse_id: u16,
    },
    /// Playback paused.
    Paused { surah_id: u16, verse_id: u16 },
    /// Playback resumed after pause.
    Resumed { surah_id: u16, verse_id: u16 },
    /// Playback stopped and the position was cleared.
    Stopped,
    /// A verse finished playing naturally.
    VerseCompleted {
        surah_id: u16,
        verse_id: u16,
        loop_counter: u32,
    },
    /// The repeat machine restarted the current verse or range.
    RepeatLooped {
        surah_id: u16,
        verse_id: u16,
        loop_counter: u32,
    },
    /// Automatic playback halted at the end of a surah or repeat unit.
    Halted {
        surah_id: u16,
        /// Verse the position was parked at.
        rest_at: u16,
    },
    /// A play request for an uncached surah is waiting for a decision.
    DownloadPrompted {
        surah_id: u16,
        verse_id: u16,
        total_verses: u16,
    },
    /// The active reciter changed.
    ReciterChanged { reciter_id: String },
    /// The media handle reported a non-abort error.
    Error {
        surah_id: Option<u16>,
        verse_id: Option<u16>,
        /// Human-readable error message.
        message: String,
        /// Whether playing again may succeed.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::VerseStarted { .. } => "Verse playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped => "Playback stopped",
            PlaybackEvent::VerseCompleted { .. } => "Verse completed",
            PlaybackEvent::RepeatLooped { .. } => "Repeat loop restarted",
            PlaybackEvent::Halted { .. } => "Automatic playback halted",
            PlaybackEvent::DownloadPrompted { .. } => "Download decision requested",
            PlaybackEvent::ReciterChanged { .. } => "Reciter changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Download Events
// ============================================================================

/// Events related to offline surah downloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// A surah download started.
    Started {
        reciter_id: String,
        surah_id: u16,
        total_verses: u16,
    },
    /// Reported after every processed verse, skipped verses included.
    Progress {
        reciter_id: String,
        surah_id: u16,
        completed: u16,
        total: u16,
        failed: u16,
        percent: u8,
    },
    /// The download finished within the failure threshold.
    Completed {
        reciter_id: String,
        surah_id: u16,
        /// Verses that could not be fetched but stayed under the threshold.
        failed: u16,
    },
    /// Too many verses failed.
    Failed {
        reciter_id: String,
        surah_id: u16,
        message: String,
    },
    /// The download was cancelled before finishing.
    Cancelled {
        reciter_id: String,
        surah_id: u16,
        completed: u16,
    },
    /// Downloaded audio for a surah was removed.
    Deleted {
        reciter_id: String,
        surah_id: u16,
        removed: usize,
    },
    /// A download requested from the play prompt failed; playback streams instead.
    FellBackToStreaming { reciter_id: String, surah_id: u16 },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Started { .. } => "Download started",
            DownloadEvent::Progress { .. } => "Download progress",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
            DownloadEvent::Cancelled { .. } => "Download cancelled",
            DownloadEvent::Deleted { .. } => "Downloaded audio deleted",
            DownloadEvent::FellBackToStreaming { .. } => "Falling back to streaming",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus yields another publisher on the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let downloads = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Download(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
