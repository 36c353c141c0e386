//! # Audio Player
//!
//! The single owned playback object the presentation layer talks to. It ties
//! the engine, the download gate, the repeat settings and the download cache
//! manager together and publishes a [`PlayerSnapshot`] after every change.
//!
//! ## Example
//!
//! ```ignore
//! let player = service.audio_player(media)?;
//! player.initialize().await?;
//!
//! match player.play_verse(2, 255, 286, "Al-Baqarah").await? {
//!     PlayRequest::Prompted => {
//!         // Ask the user, then:
//!         player.resolve_download_prompt(GateResolution::Stream).await?;
//!     }
//!     PlayRequest::Started | PlayRequest::Toggled => {}
//! }
//! ```

use crate::cache::{DownloadCacheManager, DownloadProgress};
use crate::engine::PlaybackEngine;
use crate::error::Result;
use crate::gate::{DownloadGate, GateResolution};
use crate::reciter::{ReciterProfile, ReciterRegistry, ACTIVE_RECITER_KEY};
use crate::repeat::{LoopCounter, RepeatConfig, RepeatDecision, REPEAT_SETTINGS_KEY};
use crate::types::{DownloadPrompt, PlaybackPosition, SurahSummary};
use bridge_traits::{MediaEvent, MediaHandle, NotificationSeverity, Notifier, SettingsStore};
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// What a `play_verse` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayRequest {
    /// The verse was already current; play/pause was toggled.
    Toggled,
    /// Playback started.
    Started,
    /// The surah is not cached; a download prompt is pending.
    Prompted,
}

/// What resolving a download prompt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Playback started (streamed or from the fresh download).
    Started,
    /// The download failed and the verse is streamed instead.
    StreamingFallback,
    /// Nothing plays.
    Cancelled,
    /// There was no pending prompt.
    NoPrompt,
    /// The download finished but the user moved on (played, stepped or
    /// stopped) while it ran, so nothing was started.
    Superseded,
}

/// Observable player state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub is_playing: bool,
    pub position: Option<PlaybackPosition>,
    pub is_source_loading: bool,
    pub repeat_config: RepeatConfig,
    pub loop_counter: LoopCounter,
    pub pending_prompt: Option<DownloadPrompt>,
    pub download_progress: Option<DownloadProgress>,
    pub active_reciter_id: String,
}

/// Everything an [`AudioPlayer`] is built from.
pub struct PlayerDependencies {
    pub media: Arc<dyn MediaHandle>,
    pub downloads: Arc<DownloadCacheManager>,
    pub settings: Arc<dyn SettingsStore>,
    pub notifier: Arc<dyn Notifier>,
    pub event_bus: EventBus,
    pub registry: ReciterRegistry,
}

pub struct AudioPlayer {
    engine: PlaybackEngine,
    gate: DownloadGate,
    downloads: Arc<DownloadCacheManager>,
    settings: Arc<dyn SettingsStore>,
    notifier: Arc<dyn Notifier>,
    event_bus: EventBus,
    registry: ReciterRegistry,
    repeat: Mutex<RepeatConfig>,
    download_progress: Mutex<Option<DownloadProgress>>,
    snapshot_tx: watch::Sender<PlayerSnapshot>,
    /// Bumped by every user transport request; a gated download only
    /// starts playback if it is unchanged when the download ends.
    intent: AtomicU64,
}

impl AudioPlayer {
    pub fn new(deps: PlayerDependencies) -> Self {
        let reciter = deps.registry.default_reciter().clone();
        let engine = PlaybackEngine::new(deps.media, deps.downloads.resolver(), reciter.clone());
        let (snapshot_tx, _) = watch::channel(PlayerSnapshot {
            is_playing: false,
            position: None,
            is_source_loading: false,
            repeat_config: RepeatConfig::default(),
            loop_counter: crate::repeat::LOOP_START,
            pending_prompt: None,
            download_progress: None,
            active_reciter_id: reciter.id,
        });

        Self {
            engine,
            gate: DownloadGate::new(),
            downloads: deps.downloads,
            settings: deps.settings,
            notifier: deps.notifier,
            event_bus: deps.event_bus,
            registry: deps.registry,
            repeat: Mutex::new(RepeatConfig::default()),
            download_progress: Mutex::new(None),
            snapshot_tx,
            intent: AtomicU64::new(0),
        }
    }

    /// Restores the persisted reciter and repeat settings. Unreadable or
    /// invalid values are logged and the defaults kept.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        match self.settings.get_string(ACTIVE_RECITER_KEY).await {
            Ok(Some(id)) => match self.registry.get(&id) {
                Ok(reciter) => self.engine.set_reciter(reciter.clone()).await?,
                Err(e) => warn!(error = %e, "Ignoring persisted reciter"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read active reciter"),
        }

        match self.settings.get_string(REPEAT_SETTINGS_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<RepeatConfig>(&json) {
                Ok(config) if config.validate_shape().is_ok() => *self.repeat.lock() = config,
                Ok(_) => warn!("Ignoring persisted repeat settings with an invalid range"),
                Err(e) => warn!(error = %e, "Ignoring unreadable repeat settings"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read repeat settings"),
        }

        info!(reciter = %self.engine.reciter().id, "Audio player initialized");
        self.publish();
        Ok(())
    }

    // ========================================================================
    // Observability
    // ========================================================================

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn reciters(&self) -> &[ReciterProfile] {
        self.registry.all()
    }

    pub fn active_reciter(&self) -> ReciterProfile {
        self.engine.reciter()
    }

    pub fn repeat_config(&self) -> RepeatConfig {
        *self.repeat.lock()
    }

    fn publish(&self) {
        let engine = self.engine.state();
        let snapshot = PlayerSnapshot {
            is_playing: engine.is_playing,
            position: engine.position,
            is_source_loading: engine.is_source_loading,
            repeat_config: *self.repeat.lock(),
            loop_counter: engine.loop_counter,
            pending_prompt: self.gate.pending(),
            download_progress: *self.download_progress.lock(),
            active_reciter_id: engine.reciter.id,
        };
        self.snapshot_tx.send_replace(snapshot);
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine.
        let _ = self.event_bus.emit(CoreEvent::Playback(event));
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Plays a verse, going through the download gate for uncached surahs.
    #[instrument(skip(self, surah_name))]
    pub async fn play_verse(
        &self,
        surah_id: u16,
        verse_id: u16,
        total_verses: u16,
        surah_name: impl Into<String>,
    ) -> Result<PlayRequest> {
        let position = PlaybackPosition::new(surah_id, verse_id, total_verses, surah_name)?;
        self.bump_intent();

        if self
            .engine
            .position()
            .is_some_and(|current| current.is_at(surah_id, verse_id))
        {
            self.toggle_play_pause().await?;
            return Ok(PlayRequest::Toggled);
        }

        let reciter = self.engine.reciter();
        let cached = match self
            .downloads
            .is_surah_fully_cached(&reciter.id, surah_id, total_verses)
            .await
        {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "Cache status check failed, asking the user");
                false
            }
        };

        if cached {
            self.gate.clear();
            self.start(position).await?;
            return Ok(PlayRequest::Started);
        }

        if let Some(replaced) = self.gate.prompt(DownloadPrompt::from(&position)) {
            debug!(surah = replaced.surah_id, verse = replaced.verse_id, "Replaced pending prompt");
        }
        self.emit(PlaybackEvent::DownloadPrompted {
            surah_id,
            verse_id,
            total_verses,
        });
        self.publish();
        Ok(PlayRequest::Prompted)
    }

    /// Applies the user's answer to the pending download prompt.
    #[instrument(skip(self))]
    pub async fn resolve_download_prompt(&self, resolution: GateResolution) -> Result<GateOutcome> {
        let Some(prompt) = self.gate.take() else {
            return Ok(GateOutcome::NoPrompt);
        };
        let intent = self.bump_intent();
        self.publish();

        match resolution {
            GateResolution::Cancel => Ok(GateOutcome::Cancelled),
            GateResolution::Stream => {
                self.start(prompt.position()).await?;
                Ok(GateOutcome::Started)
            }
            GateResolution::Download => {
                let reciter = self.engine.reciter();
                match self
                    .run_download(&reciter, prompt.surah_id, prompt.total_verses)
                    .await
                {
                    Ok(()) => {
                        if self.superseded(intent) {
                            return Ok(GateOutcome::Superseded);
                        }
                        self.start(prompt.position()).await?;
                        Ok(GateOutcome::Started)
                    }
                    Err(e) if e.is_cancellation() => Ok(GateOutcome::Cancelled),
                    Err(e) => {
                        warn!(error = %e, "Download failed, streaming instead");
                        self.notifier.notify(
                            "Download failed. Streaming the recitation instead.",
                            NotificationSeverity::Warning,
                        );
                        let _ = self.event_bus.emit(CoreEvent::Download(
                            DownloadEvent::FellBackToStreaming {
                                reciter_id: reciter.id.clone(),
                                surah_id: prompt.surah_id,
                            },
                        ));
                        if self.superseded(intent) {
                            return Ok(GateOutcome::Superseded);
                        }
                        self.start(prompt.position()).await?;
                        Ok(GateOutcome::StreamingFallback)
                    }
                }
            }
        }
    }

    fn bump_intent(&self) -> u64 {
        self.intent.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    fn superseded(&self, intent: u64) -> bool {
        let current = self.intent.load(Ordering::SeqCst);
        if current != intent {
            debug!(intent, current, "Transport changed during download, not starting");
            return true;
        }
        false
    }

    async fn start(&self, position: PlaybackPosition) -> Result<()> {
        let (surah_id, verse_id) = (position.surah_id, position.verse_id);

        if let Err(e) = self.engine.start(position).await {
            self.emit(PlaybackEvent::Error {
                surah_id: Some(surah_id),
                verse_id: Some(verse_id),
                message: e.to_string(),
                recoverable: true,
            });
            self.publish();
            return Err(e);
        }

        self.emit(PlaybackEvent::VerseStarted {
            reciter_id: self.engine.reciter().id,
            surah_id,
            verse_id,
        });
        self.publish();
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.engine.pause().await?;
        if let Some(position) = self.engine.position() {
            self.emit(PlaybackEvent::Paused {
                surah_id: position.surah_id,
                verse_id: position.verse_id,
            });
        }
        self.publish();
        Ok(())
    }

    /// No-op when nothing is loaded.
    pub async fn resume(&self) -> Result<()> {
        self.engine.resume().await?;
        if let Some(position) = self.engine.position() {
            self.emit(PlaybackEvent::Resumed {
                surah_id: position.surah_id,
                verse_id: position.verse_id,
            });
        }
        self.publish();
        Ok(())
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        if self.engine.is_playing() {
            self.pause().await
        } else {
            self.resume().await
        }
    }

    pub async fn stop(&self) -> Result<()> {
        self.bump_intent();
        self.engine.stop().await?;
        self.emit(PlaybackEvent::Stopped);
        self.publish();
        Ok(())
    }

    pub async fn next_verse(&self) -> Result<()> {
        self.step(1).await
    }

    pub async fn prev_verse(&self) -> Result<()> {
        self.step(-1).await
    }

    async fn step(&self, delta: i32) -> Result<()> {
        self.bump_intent();
        let changed = self.engine.step(delta).await?;
        if changed && self.engine.is_playing() {
            if let Some(position) = self.engine.position() {
                self.emit(PlaybackEvent::VerseStarted {
                    reciter_id: self.engine.reciter().id,
                    surah_id: position.surah_id,
                    verse_id: position.verse_id,
                });
            }
        }
        self.publish();
        Ok(())
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Switches and persists the active reciter. The current verse is
    /// reloaded under the new reciter without stopping playback.
    #[instrument(skip(self))]
    pub async fn set_reciter(&self, reciter_id: &str) -> Result<()> {
        let reciter = self.registry.get(reciter_id)?.clone();
        if self.engine.reciter().id == reciter.id {
            return Ok(());
        }

        self.settings
            .set_string(ACTIVE_RECITER_KEY, &reciter.id)
            .await?;
        self.engine.set_reciter(reciter).await?;

        info!(reciter = reciter_id, "Active reciter changed");
        self.emit(PlaybackEvent::ReciterChanged {
            reciter_id: reciter_id.to_string(),
        });
        self.publish();
        Ok(())
    }

    /// Validates against the current surah (or just the range shape when
    /// nothing is loaded), persists, and restarts the loop count.
    #[instrument(skip(self))]
    pub async fn set_repeat_config(&self, config: RepeatConfig) -> Result<()> {
        match self.engine.position() {
            Some(position) => config.validate(position.total_verses)?,
            None => config.validate_shape()?,
        }

        let json = serde_json::to_string(&config)?;
        self.settings.set_string(REPEAT_SETTINGS_KEY, &json).await?;

        *self.repeat.lock() = config;
        self.engine.reset_loop_counter();
        self.publish();
        Ok(())
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    async fn run_download(&self, reciter: &ReciterProfile, surah_id: u16, total_verses: u16) -> Result<()> {
        *self.download_progress.lock() = Some(DownloadProgress::new(surah_id, total_verses));
        self.publish();

        let result = self
            .downloads
            .download_surah(
                reciter,
                surah_id,
                total_verses,
                |progress| {
                    *self.download_progress.lock() = Some(progress);
                    self.publish();
                },
                CancellationToken::new(),
            )
            .await;

        *self.download_progress.lock() = None;
        self.publish();
        result
    }

    /// Downloads a surah for the active reciter outside the play flow.
    #[instrument(skip(self))]
    pub async fn download_surah(&self, surah_id: u16, total_verses: u16) -> Result<()> {
        let reciter = self.engine.reciter();
        match self.run_download(&reciter, surah_id, total_verses).await {
            Ok(()) => {
                self.notifier
                    .notify("Surah downloaded for offline listening.", NotificationSeverity::Success);
                Ok(())
            }
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                self.notifier
                    .notify("Surah download failed.", NotificationSeverity::Error);
                Err(e)
            }
        }
    }

    /// Cancels the running download. Returns `false` if none was running.
    pub fn cancel_download(&self) -> bool {
        self.downloads.cancel_active_download()
    }

    pub async fn delete_surah_audio(&self, surah_id: u16) -> Result<usize> {
        let reciter = self.engine.reciter();
        self.downloads.delete_surah(&reciter.id, surah_id).await
    }

    pub async fn is_surah_downloaded(&self, surah_id: u16, total_verses: u16) -> Result<bool> {
        let reciter = self.engine.reciter();
        self.downloads
            .is_surah_fully_cached(&reciter.id, surah_id, total_verses)
            .await
    }

    /// Cache status of many surahs for the active reciter.
    pub async fn downloaded_status(&self, surahs: &[SurahSummary]) -> Result<HashMap<u16, bool>> {
        let reciter = self.engine.reciter();
        self.downloads
            .cached_status_for_surahs(&reciter.id, surahs)
            .await
    }

    // ========================================================================
    // Host media events
    // ========================================================================

    /// Feeds an event from the host media element into the player.
    #[instrument(skip(self))]
    pub async fn handle_media_event(&self, event: MediaEvent) -> Result<()> {
        match event {
            MediaEvent::Ready => self.engine.on_ready().await?,
            MediaEvent::Ended => self.on_ended().await?,
            MediaEvent::Error(kind) => {
                let position = self.engine.position();
                if self.engine.on_error(&kind) {
                    self.emit(PlaybackEvent::Error {
                        surah_id: position.as_ref().map(|p| p.surah_id),
                        verse_id: position.as_ref().map(|p| p.verse_id),
                        message: kind.to_string(),
                        recoverable: true,
                    });
                    self.notifier
                        .notify("The recitation could not be played.", NotificationSeverity::Error);
                }
            }
        }
        self.publish();
        Ok(())
    }

    async fn on_ended(&self) -> Result<()> {
        let Some(finished) = self.engine.position() else {
            return Ok(());
        };
        let config = *self.repeat.lock();
        let Some(step) = self.engine.on_ended(&config).await? else {
            return Ok(());
        };

        self.emit(PlaybackEvent::VerseCompleted {
            surah_id: finished.surah_id,
            verse_id: finished.verse_id,
            loop_counter: step.loop_counter,
        });

        match step.decision {
            RepeatDecision::ReplayVerse | RepeatDecision::JumpToRangeStart { .. } => {
                self.emit(PlaybackEvent::RepeatLooped {
                    surah_id: finished.surah_id,
                    verse_id: self
                        .engine
                        .position()
                        .map_or(finished.verse_id, |p| p.verse_id),
                    loop_counter: step.loop_counter,
                });
            }
            RepeatDecision::Advance { verse } => {
                self.emit(PlaybackEvent::VerseStarted {
                    reciter_id: self.engine.reciter().id,
                    surah_id: finished.surah_id,
                    verse_id: verse,
                });
            }
            RepeatDecision::Stop { rest_at } => {
                self.emit(PlaybackEvent::Halted {
                    surah_id: finished.surah_id,
                    rest_at,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repeat::{RepeatCount, LOOP_START};

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = PlayerSnapshot {
            is_playing: true,
            position: Some(PlaybackPosition::new(1, 2, 7, "Al-Fatiha").unwrap()),
            is_source_loading: false,
            repeat_config: RepeatConfig::range(1, 3, RepeatCount::Unbounded),
            loop_counter: LOOP_START,
            pending_prompt: None,
            download_progress: None,
            active_reciter_id: "alafasy".to_string(),
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["isPlaying"], true);
        assert_eq!(value["position"]["verseId"], 2);
        assert_eq!(value["repeatConfig"]["rangeEnd"], 3);
        assert_eq!(value["activeReciterId"], "alafasy");
        assert!(value["pendingPrompt"].is_null());
    }
}
