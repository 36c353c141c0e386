//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `AudioCacheStore` using one `tokio::fs` directory per cache
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `Notifier` forwarding toasts to `tracing`
//!
//! The media handle is not provided here: desktop hosts embed their own audio
//! engine and implement `MediaHandle` against it.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FsAudioCacheStore, ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let cache = FsAudioCacheStore::new();
//!     let settings = SqliteSettingsStore::new("settings.db".into()).await.unwrap();
//!
//!     // Use in core configuration
//! }
//! ```

mod cache_store;
mod http;
mod notifier;
mod settings;

pub use cache_store::FsAudioCacheStore;
pub use http::ReqwestHttpClient;
pub use notifier::TracingNotifier;
pub use settings::SqliteSettingsStore;
