//! # Recitation Playback Core
//!
//! Verse-by-verse Quran recitation playback with an offline cache.
//!
//! ## Overview
//!
//! - [`cache`]: per-reciter verse cache, surah downloads with progress and
//!   cancellation, cache status queries
//! - [`resolver`]: picks the cached copy of a verse or its remote URL
//! - [`repeat`]: the muraja'ah (memorisation review) state machine run on
//!   every natural verse completion
//! - [`engine`]: drives the single host media handle
//! - [`gate`]: the pending "stream, download or cancel" prompt for uncached
//!   surahs
//! - [`player`]: [`AudioPlayer`], the facade tying all of the above together

pub mod cache;
pub mod engine;
pub mod error;
pub mod gate;
pub mod player;
pub mod reciter;
pub mod repeat;
pub mod resolver;
pub mod types;

pub use cache::{AudioCacheKey, CacheConfig, DownloadCacheManager, DownloadProgress};
pub use error::{PlaybackError, Result};
pub use gate::GateResolution;
pub use player::{AudioPlayer, GateOutcome, PlayRequest, PlayerDependencies, PlayerSnapshot};
pub use reciter::{ReciterProfile, ReciterRegistry};
pub use repeat::{RepeatConfig, RepeatCount, RepeatMode};
pub use resolver::{ResolvedSource, SourceOrigin, SourceResolver};
pub use types::{DownloadPrompt, PlaybackPosition, SurahSummary};
