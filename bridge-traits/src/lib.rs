//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the recitation audio core and the
//! platform it runs on. Each trait represents a capability the core requires
//! but that must be implemented differently per platform (desktop, iOS,
//! Android, web).
//!
//! ## Traits
//!
//! ### Networking & Storage
//! - [`HttpClient`](http::HttpClient) - Fetching verse audio from the audio host
//! - [`AudioCacheStore`](storage::AudioCacheStore) - Named binary caches for offline audio
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Playback & UI
//! - [`MediaHandle`](playback::MediaHandle) - The single host media element
//! - [`Notifier`](notification::Notifier) - Toast-style user notifications
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert platform-specific errors into it and keep
//! messages actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod logging;
pub mod notification;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use notification::{NotificationSeverity, Notifier};
pub use playback::{MediaErrorKind, MediaEvent, MediaHandle};
pub use storage::{AudioCacheStore, SettingsStore};
