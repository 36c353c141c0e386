//! # Playback Engine
//!
//! Drives the single host [`MediaHandle`] from the playback state.
//!
//! Whenever the `(surah, verse, reciter)` triple changes, the engine bumps a
//! generation counter and re-resolves the source. When the resolution comes
//! back it is applied only if no newer change happened meanwhile; otherwise
//! it is dropped. A resolved URL equal to the loaded one is not reloaded: the
//! handle is just resumed if playback was requested and it is paused.
//!
//! The state lock is never held across a host call.

use crate::error::Result;
use crate::reciter::ReciterProfile;
use crate::repeat::{self, LoopCounter, RepeatConfig, RepeatDecision, RepeatStep, LOOP_START};
use crate::resolver::SourceResolver;
use crate::types::PlaybackPosition;
use bridge_traits::{MediaErrorKind, MediaHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Engine state as seen by the player facade.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub is_playing: bool,
    pub position: Option<PlaybackPosition>,
    pub is_source_loading: bool,
    /// URL currently loaded into the media handle.
    pub loaded_url: Option<String>,
    pub loop_counter: LoopCounter,
    pub reciter: ReciterProfile,
    generation: u64,
}

impl EngineState {
    fn new(reciter: ReciterProfile) -> Self {
        Self {
            is_playing: false,
            position: None,
            is_source_loading: false,
            loaded_url: None,
            loop_counter: LOOP_START,
            reciter,
            generation: 0,
        }
    }

    fn bump(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }
}

enum SourceAction {
    Load(String),
    Resume,
    Keep,
}

enum ResumeAction {
    Play,
    Reload,
    Wait,
}

enum CompletionAction {
    Replay,
    Sync,
    Rest,
}

pub struct PlaybackEngine {
    media: Arc<dyn MediaHandle>,
    resolver: SourceResolver,
    state: Mutex<EngineState>,
}

impl PlaybackEngine {
    pub fn new(media: Arc<dyn MediaHandle>, resolver: SourceResolver, reciter: ReciterProfile) -> Self {
        Self {
            media,
            resolver,
            state: Mutex::new(EngineState::new(reciter)),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state.lock().clone()
    }

    pub fn position(&self) -> Option<PlaybackPosition> {
        self.state.lock().position.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().is_playing
    }

    pub fn reciter(&self) -> ReciterProfile {
        self.state.lock().reciter.clone()
    }

    pub fn reset_loop_counter(&self) {
        self.state.lock().loop_counter = LOOP_START;
    }

    /// Plays `position` from the start with a fresh loop counter.
    #[instrument(skip(self, position), fields(surah = position.surah_id, verse = position.verse_id))]
    pub async fn start(&self, position: PlaybackPosition) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.position = Some(position);
            state.loop_counter = LOOP_START;
            state.is_playing = true;
            state.bump();
        }
        self.sync_source().await
    }

    pub async fn toggle(&self) -> Result<()> {
        if self.is_playing() {
            self.pause().await
        } else {
            self.resume().await
        }
    }

    pub async fn pause(&self) -> Result<()> {
        let loaded = {
            let mut state = self.state.lock();
            state.is_playing = false;
            state.loaded_url.is_some()
        };
        if loaded {
            self.media.pause().await?;
        }
        Ok(())
    }

    /// Resumes the current position. No-op without one.
    pub async fn resume(&self) -> Result<()> {
        let action = {
            let mut state = self.state.lock();
            if state.position.is_none() {
                return Ok(());
            }
            state.is_playing = true;
            if state.is_source_loading {
                // The ready event starts playback.
                ResumeAction::Wait
            } else if state.loaded_url.is_some() {
                ResumeAction::Play
            } else {
                ResumeAction::Reload
            }
        };

        match action {
            ResumeAction::Play => Ok(self.media.play().await?),
            ResumeAction::Reload => self.sync_source().await,
            ResumeAction::Wait => Ok(()),
        }
    }

    /// Clears the position and rewinds the handle. The loaded source stays.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.position = None;
            state.loop_counter = LOOP_START;
            state.is_playing = false;
            state.is_source_loading = false;
            state.bump();
        }
        self.media.stop().await?;
        Ok(())
    }

    /// Moves by `delta` verses, clamped to the surah. Always resets the loop
    /// counter. Returns whether the verse changed.
    pub async fn step(&self, delta: i32) -> Result<bool> {
        let changed = {
            let mut state = self.state.lock();
            let Some(position) = state.position.clone() else {
                return Ok(false);
            };
            state.loop_counter = LOOP_START;

            let target = (i32::from(position.verse_id) + delta)
                .clamp(1, i32::from(position.total_verses));
            let target = u16::try_from(target).unwrap_or(position.verse_id);
            if target == position.verse_id {
                false
            } else {
                state.position = Some(position.with_verse(target));
                state.bump();
                true
            }
        };

        if changed {
            self.sync_source().await?;
        }
        Ok(changed)
    }

    /// Switches reciter without interrupting playback.
    pub async fn set_reciter(&self, reciter: ReciterProfile) -> Result<()> {
        let has_position = {
            let mut state = self.state.lock();
            state.reciter = reciter;
            state.bump();
            state.position.is_some()
        };
        if has_position {
            self.sync_source().await?;
        }
        Ok(())
    }

    /// The loaded source can play.
    pub async fn on_ready(&self) -> Result<()> {
        let play = {
            let mut state = self.state.lock();
            state.is_source_loading = false;
            state.is_playing && state.position.is_some()
        };
        if play {
            self.media.play().await?;
        }
        Ok(())
    }

    /// Natural completion of the current verse.
    #[instrument(skip(self, config))]
    pub async fn on_ended(&self, config: &RepeatConfig) -> Result<Option<RepeatStep>> {
        let (step, action) = {
            let mut state = self.state.lock();
            let Some(position) = state.position.clone() else {
                return Ok(None);
            };

            let step = repeat::on_completion(config, state.loop_counter, &position);
            state.loop_counter = step.loop_counter;

            let action = match step.decision {
                RepeatDecision::ReplayVerse => CompletionAction::Replay,
                RepeatDecision::Advance { verse } | RepeatDecision::JumpToRangeStart { verse } => {
                    if verse == position.verse_id {
                        CompletionAction::Replay
                    } else {
                        state.position = Some(position.with_verse(verse));
                        state.bump();
                        CompletionAction::Sync
                    }
                }
                RepeatDecision::Stop { rest_at } => {
                    state.is_playing = false;
                    if rest_at == position.verse_id {
                        CompletionAction::Rest
                    } else {
                        state.position = Some(position.with_verse(rest_at));
                        state.bump();
                        CompletionAction::Sync
                    }
                }
            };
            (step, action)
        };

        debug!(decision = ?step.decision, loop_counter = step.loop_counter, "Verse completed");

        match action {
            CompletionAction::Replay => self.media.replay().await?,
            CompletionAction::Sync => self.sync_source().await?,
            CompletionAction::Rest => {}
        }
        Ok(Some(step))
    }

    /// Media failure. Aborts from rapid switching are ignored; anything else
    /// stops playback and forgets the loaded source. Returns whether the
    /// error was applied.
    pub fn on_error(&self, kind: &MediaErrorKind) -> bool {
        if kind.is_abort() {
            debug!("Ignoring aborted load");
            return false;
        }

        warn!(error = %kind, "Media error, stopping playback");
        let mut state = self.state.lock();
        state.is_playing = false;
        state.is_source_loading = false;
        state.loaded_url = None;
        true
    }

    /// Resolves the current triple and applies the result unless stale.
    async fn sync_source(&self) -> Result<()> {
        let (generation, reciter, position) = {
            let state = self.state.lock();
            match &state.position {
                Some(position) => (state.generation, state.reciter.clone(), position.clone()),
                None => return Ok(()),
            }
        };

        let source = self
            .resolver
            .resolve(&reciter, position.surah_id, position.verse_id)
            .await;

        let action = {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(surah = position.surah_id, verse = position.verse_id, "Dropping stale source");
                return Ok(());
            }
            if state.loaded_url.as_deref() != Some(source.url.as_str()) {
                state.loaded_url = Some(source.url.clone());
                state.is_source_loading = true;
                SourceAction::Load(source.url)
            } else if state.is_playing && !state.is_source_loading {
                SourceAction::Resume
            } else {
                SourceAction::Keep
            }
        };

        match action {
            SourceAction::Load(url) => {
                debug!(
                    surah = position.surah_id,
                    verse = position.verse_id,
                    origin = ?source.origin,
                    "Loading source"
                );
                if let Err(e) = self.media.load(&url).await {
                    let mut state = self.state.lock();
                    if state.generation == generation {
                        state.is_playing = false;
                        state.is_source_loading = false;
                        state.loaded_url = None;
                    }
                    return Err(e.into());
                }
            }
            SourceAction::Resume => {
                if self.media.is_paused().await {
                    self.media.play().await?;
                }
            }
            SourceAction::Keep => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::repeat::RepeatCount;
    use async_trait::async_trait;
    use bridge_traits::{error::Result as BridgeResult, AudioCacheStore};
    use bytes::Bytes;
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Load(String),
        Play,
        Pause,
        Stop,
        Replay,
    }

    #[derive(Default)]
    struct Media {
        calls: Mutex<Vec<Call>>,
        paused: Mutex<bool>,
    }

    impl Media {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn loads(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Load(url) => Some(url),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl MediaHandle for Media {
        async fn load(&self, url: &str) -> BridgeResult<()> {
            *self.paused.lock() = true;
            self.calls.lock().push(Call::Load(url.to_string()));
            Ok(())
        }

        async fn play(&self) -> BridgeResult<()> {
            *self.paused.lock() = false;
            self.calls.lock().push(Call::Play);
            Ok(())
        }

        async fn pause(&self) -> BridgeResult<()> {
            *self.paused.lock() = true;
            self.calls.lock().push(Call::Pause);
            Ok(())
        }

        async fn stop(&self) -> BridgeResult<()> {
            *self.paused.lock() = true;
            self.calls.lock().push(Call::Stop);
            Ok(())
        }

        async fn replay(&self) -> BridgeResult<()> {
            *self.paused.lock() = false;
            self.calls.lock().push(Call::Replay);
            Ok(())
        }

        async fn is_paused(&self) -> bool {
            *self.paused.lock()
        }
    }

    /// Empty cache whose lookup for one key blocks until released.
    #[derive(Default)]
    struct SlowStore {
        slow_key: Option<String>,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl AudioCacheStore for SlowStore {
        async fn put(&self, _cache: &str, _key: &str, _data: Bytes) -> BridgeResult<()> {
            Ok(())
        }

        async fn contains(&self, _cache: &str, _key: &str) -> BridgeResult<bool> {
            Ok(false)
        }

        async fn keys(&self, _cache: &str) -> BridgeResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn delete(&self, _cache: &str, _key: &str) -> BridgeResult<bool> {
            Ok(false)
        }

        async fn local_url(&self, _cache: &str, key: &str) -> BridgeResult<Option<String>> {
            if self.slow_key.as_deref() == Some(key) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(None)
        }
    }

    fn alafasy() -> ReciterProfile {
        ReciterProfile::new("alafasy", "Mishary Rashid Alafasy", "Alafasy_128kbps")
    }

    fn engine_with(store: Arc<SlowStore>) -> (Arc<PlaybackEngine>, Arc<Media>) {
        let media = Arc::new(Media::default());
        let resolver = SourceResolver::new(store, CacheConfig::default());
        let engine = Arc::new(PlaybackEngine::new(media.clone(), resolver, alafasy()));
        (engine, media)
    }

    fn engine() -> (Arc<PlaybackEngine>, Arc<Media>) {
        engine_with(Arc::new(SlowStore::default()))
    }

    fn url(surah: u16, verse: u16) -> String {
        format!(
            "https://everyayah.com/data/Alafasy_128kbps/{:03}{:03}.mp3",
            surah, verse
        )
    }

    fn position(surah: u16, verse: u16, total: u16) -> PlaybackPosition {
        PlaybackPosition::new(surah, verse, total, "").unwrap()
    }

    #[tokio::test]
    async fn test_start_loads_and_ready_plays() {
        let (engine, media) = engine();
        engine.start(position(1, 1, 7)).await.unwrap();

        assert!(engine.state().is_source_loading);
        assert_eq!(media.calls(), vec![Call::Load(url(1, 1))]);

        engine.on_ready().await.unwrap();
        assert!(!engine.state().is_source_loading);
        assert_eq!(media.calls(), vec![Call::Load(url(1, 1)), Call::Play]);
    }

    #[tokio::test]
    async fn test_pause_resume_does_not_reload() {
        let (engine, media) = engine();
        engine.start(position(1, 1, 7)).await.unwrap();
        engine.on_ready().await.unwrap();

        engine.toggle().await.unwrap();
        assert!(!engine.is_playing());
        engine.toggle().await.unwrap();
        assert!(engine.is_playing());

        assert_eq!(media.loads(), vec![url(1, 1)]);
        assert_eq!(
            media.calls(),
            vec![Call::Load(url(1, 1)), Call::Play, Call::Pause, Call::Play]
        );
    }

    #[tokio::test]
    async fn test_resume_without_position_is_noop() {
        let (engine, media) = engine();
        engine.resume().await.unwrap();

        assert!(!engine.is_playing());
        assert!(media.calls().is_empty());
    }

    #[tokio::test]
    async fn test_step_is_clamped_and_resets_loop_counter() {
        let (engine, media) = engine();
        engine.start(position(1, 7, 7)).await.unwrap();
        engine.state.lock().loop_counter = 3;

        assert!(!engine.step(1).await.unwrap());
        assert_eq!(engine.state().loop_counter, LOOP_START);

        engine.state.lock().loop_counter = 2;
        assert!(engine.step(-1).await.unwrap());
        assert_eq!(engine.position().unwrap().verse_id, 6);
        assert_eq!(engine.state().loop_counter, LOOP_START);
        assert_eq!(media.loads(), vec![url(1, 7), url(1, 6)]);
    }

    #[tokio::test]
    async fn test_stop_clears_position_and_rewinds() {
        let (engine, media) = engine();
        engine.start(position(1, 3, 7)).await.unwrap();
        engine.stop().await.unwrap();

        let state = engine.state();
        assert!(state.position.is_none());
        assert!(!state.is_playing);
        assert_eq!(state.loop_counter, LOOP_START);
        assert_eq!(media.calls().last(), Some(&Call::Stop));
    }

    #[tokio::test]
    async fn test_reciter_switch_reloads_same_verse() {
        let (engine, media) = engine();
        engine.start(position(1, 2, 7)).await.unwrap();
        engine
            .set_reciter(ReciterProfile::new("husary", "Husary", "Husary_128kbps"))
            .await
            .unwrap();

        assert!(engine.is_playing());
        assert_eq!(
            media.loads(),
            vec![
                url(1, 2),
                "https://everyayah.com/data/Husary_128kbps/001002.mp3".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_single_verse_replays_then_advances() {
        let (engine, media) = engine();
        let config = RepeatConfig::single_verse(RepeatCount::times(2).unwrap());
        engine.start(position(1, 1, 7)).await.unwrap();

        let first = engine.on_ended(&config).await.unwrap().unwrap();
        assert_eq!(first.decision, RepeatDecision::ReplayVerse);
        assert_eq!(media.calls().last(), Some(&Call::Replay));

        let second = engine.on_ended(&config).await.unwrap().unwrap();
        assert_eq!(second.decision, RepeatDecision::Advance { verse: 2 });
        assert_eq!(media.loads(), vec![url(1, 1), url(1, 2)]);
        assert!(engine.is_playing());
    }

    #[tokio::test]
    async fn test_degenerate_range_replays_in_place() {
        let (engine, media) = engine();
        let config = RepeatConfig::range(5, 5, RepeatCount::times(3).unwrap());
        engine.start(position(2, 5, 286)).await.unwrap();

        for _ in 0..2 {
            engine.on_ended(&config).await.unwrap();
        }
        let last = engine.on_ended(&config).await.unwrap().unwrap();

        assert_eq!(last.decision, RepeatDecision::Stop { rest_at: 5 });
        assert!(!engine.is_playing());
        assert_eq!(media.loads(), vec![url(2, 5)]);
        assert_eq!(
            media.calls().iter().filter(|c| **c == Call::Replay).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_abort_error_is_ignored() {
        let (engine, _media) = engine();
        engine.start(position(1, 1, 7)).await.unwrap();

        assert!(!engine.on_error(&MediaErrorKind::Aborted));
        assert!(engine.is_playing());

        assert!(engine.on_error(&MediaErrorKind::Network));
        let state = engine.state();
        assert!(!state.is_playing);
        assert!(state.loaded_url.is_none());
    }

    #[tokio::test]
    async fn test_stale_resolution_is_dropped() {
        let store = Arc::new(SlowStore {
            slow_key: Some("002001".to_string()),
            ..SlowStore::default()
        });
        let (engine, media) = engine_with(store.clone());

        let slow = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.start(position(2, 1, 286)).await })
        };
        store.entered.notified().await;

        engine.start(position(3, 1, 200)).await.unwrap();
        store.release.notify_one();
        slow.await.unwrap().unwrap();

        assert_eq!(media.loads(), vec![url(3, 1)]);
        assert_eq!(engine.position().unwrap().surah_id, 3);
    }
}
