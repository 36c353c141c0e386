//! In-memory bridge fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::{
    AudioCacheStore, HttpClient, HttpRequest, HttpResponse, MediaHandle, NotificationSeverity,
    Notifier, SettingsStore,
};
use bytes::Bytes;
use core_playback::cache::{key, CacheConfig, DownloadCacheManager};
use core_playback::{AudioPlayer, PlayerDependencies, ReciterProfile, ReciterRegistry};
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub const ALAFASY_CACHE: &str = "audio-cache-alafasy";

pub fn alafasy() -> ReciterProfile {
    ReciterProfile::new("alafasy", "Mishary Rashid Alafasy", "Alafasy_128kbps")
}

pub fn remote(segment: &str, surah: u16, verse: u16) -> String {
    format!(
        "https://everyayah.com/data/{}/{}.mp3",
        segment,
        key::verse_code(surah, verse)
    )
}

pub fn local(cache: &str, surah: u16, verse: u16) -> String {
    format!("memory://{}/{}", cache, key::verse_code(surah, verse))
}

// ============================================================================
// Audio cache
// ============================================================================

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<BTreeMap<(String, String), Bytes>>,
    local_url_calls: AtomicUsize,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches verses `1..=total` of a surah.
    pub fn seed_surah(&self, cache: &str, surah: u16, total: u16) {
        let mut entries = self.entries.lock();
        for verse in 1..=total {
            entries.insert(
                (cache.to_string(), key::verse_code(surah, verse)),
                Bytes::from_static(b"ID3"),
            );
        }
    }

    pub fn keys_in(&self, cache: &str) -> Vec<String> {
        self.entries
            .lock()
            .keys()
            .filter(|(c, _)| c == cache)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn local_url_calls(&self) -> usize {
        self.local_url_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioCacheStore for MemoryCacheStore {
    async fn put(&self, cache: &str, key: &str, data: Bytes) -> Result<()> {
        self.entries
            .lock()
            .insert((cache.to_string(), key.to_string()), data);
        Ok(())
    }

    async fn contains(&self, cache: &str, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .lock()
            .contains_key(&(cache.to_string(), key.to_string())))
    }

    async fn keys(&self, cache: &str) -> Result<Vec<String>> {
        Ok(self.keys_in(cache))
    }

    async fn delete(&self, cache: &str, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .lock()
            .remove(&(cache.to_string(), key.to_string()))
            .is_some())
    }

    async fn local_url(&self, cache: &str, key: &str) -> Result<Option<String>> {
        self.local_url_calls.fetch_add(1, Ordering::SeqCst);
        let present = self.contains(cache, key).await?;
        Ok(present.then(|| format!("memory://{}/{}", cache, key)))
    }
}

// ============================================================================
// Media handle
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCall {
    Load(String),
    Play,
    Pause,
    Stop,
    Replay,
}

#[derive(Default)]
pub struct RecordingMedia {
    calls: Mutex<Vec<MediaCall>>,
    paused: Mutex<bool>,
}

impl RecordingMedia {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            paused: Mutex::new(true),
        }
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.calls.lock().clone()
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MediaCall::Load(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &MediaCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: MediaCall, paused: bool) {
        *self.paused.lock() = paused;
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl MediaHandle for RecordingMedia {
    async fn load(&self, url: &str) -> Result<()> {
        self.record(MediaCall::Load(url.to_string()), true);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record(MediaCall::Play, false);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(MediaCall::Pause, true);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record(MediaCall::Stop, true);
        Ok(())
    }

    async fn replay(&self) -> Result<()> {
        self.record(MediaCall::Replay, false);
        Ok(())
    }

    async fn is_paused(&self) -> bool {
        *self.paused.lock()
    }
}

// ============================================================================
// Settings & notifications
// ============================================================================

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.value(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, NotificationSeverity)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn severities(&self) -> Vec<NotificationSeverity> {
        self.messages.lock().iter().map(|(_, s)| *s).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: NotificationSeverity) {
        self.messages.lock().push((message.to_string(), severity));
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Serves every verse with a small body, except the configured failing
/// verses (404) and an optional verse whose fetch is held until `release`
/// is notified.
#[derive(Default)]
pub struct FakeHttp {
    failing: HashSet<String>,
    hang_on: Option<String>,
    requests: Mutex<Vec<String>>,
    pub hanging: Notify,
    pub release: Notify,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, surah: u16, verses: impl IntoIterator<Item = u16>) -> Self {
        self.failing
            .extend(verses.into_iter().map(|v| key::verse_code(surah, v)));
        self
    }

    pub fn hang_on(mut self, surah: u16, verse: u16) -> Self {
        self.hang_on = Some(key::verse_code(surah, verse));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn code_of(url: &str) -> String {
        url.rsplit('/')
            .next()
            .unwrap_or_default()
            .trim_end_matches(".mp3")
            .to_string()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().push(request.url.clone());
        let code = Self::code_of(&request.url);

        if self.hang_on.as_deref() == Some(code.as_str()) {
            self.hanging.notify_one();
            self.release.notified().await;
        }

        let status = if self.failing.contains(&code) { 404 } else { 200 };
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(format!("audio {}", code)),
        })
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub struct Harness {
    pub player: Arc<AudioPlayer>,
    pub downloads: Arc<DownloadCacheManager>,
    pub media: Arc<RecordingMedia>,
    pub store: Arc<MemoryCacheStore>,
    pub settings: Arc<MemorySettings>,
    pub notifier: Arc<RecordingNotifier>,
    pub http: Arc<dyn HttpClient>,
    pub events: EventBus,
}

pub fn download_manager(
    store: Arc<MemoryCacheStore>,
    http: Arc<dyn HttpClient>,
) -> DownloadCacheManager {
    DownloadCacheManager::new(CacheConfig::default(), store, http)
}

pub fn harness() -> Harness {
    harness_with(Arc::new(FakeHttp::new()), Arc::new(MemoryCacheStore::new()))
}

pub fn harness_with(http: Arc<dyn HttpClient>, store: Arc<MemoryCacheStore>) -> Harness {
    harness_on(http, store, Arc::new(MemorySettings::new()))
}

pub fn harness_on(
    http: Arc<dyn HttpClient>,
    store: Arc<MemoryCacheStore>,
    settings: Arc<MemorySettings>,
) -> Harness {
    let events = EventBus::new(256);
    let downloads = Arc::new(
        download_manager(store.clone(), http.clone()).with_event_bus(events.clone()),
    );
    let media = Arc::new(RecordingMedia::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let player = Arc::new(AudioPlayer::new(PlayerDependencies {
        media: media.clone(),
        downloads: downloads.clone(),
        settings: settings.clone(),
        notifier: notifier.clone(),
        event_bus: events.clone(),
        registry: ReciterRegistry::built_in(),
    }));

    Harness {
        player,
        downloads,
        media,
        store,
        settings,
        notifier,
        http,
        events,
    }
}
