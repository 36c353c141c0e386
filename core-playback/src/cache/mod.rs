//! # Offline Cache Module
//!
//! Per-reciter offline storage of verse audio.
//!
//! ## Overview
//!
//! Each reciter owns one named cache (`audio-cache-<reciterId>`) inside the
//! host's [`AudioCacheStore`](bridge_traits::AudioCacheStore). Entries are keyed
//! by the zero-padded `SSSVVV` verse code derived from the
//! `(reciter, surah, verse)` tuple; the remote URL is derived separately, so
//! moving to another audio host keeps existing downloads valid.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     DownloadCacheManager               │
//! │  - download_surah()                    │
//! │  - is_surah_fully_cached()             │
//! │  - delete_surah()                      │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> AudioCacheStore (named caches)
//!          ├──> HttpClient (verse fetches)
//!          └──> EventBus (progress events)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, DownloadCacheManager};
//! use tokio_util::sync::CancellationToken;
//!
//! let manager = DownloadCacheManager::new(CacheConfig::default(), store, http_client);
//! manager
//!     .download_surah(&reciter, 112, 4, |p| println!("{}%", p.percent_complete()), CancellationToken::new())
//!     .await?;
//! assert!(manager.is_surah_fully_cached(&reciter.id, 112, 4).await?);
//! ```

pub mod config;
pub mod key;
pub mod manager;
pub mod progress;

pub use config::CacheConfig;
pub use key::AudioCacheKey;
pub use manager::DownloadCacheManager;
pub use progress::DownloadProgress;
