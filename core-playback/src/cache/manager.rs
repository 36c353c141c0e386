//! # Download Cache Manager
//!
//! Downloads whole surahs into the reciter's cache and answers cache status
//! queries.
//!
//! - Verses are fetched strictly in order, one at a time, so progress is
//!   monotonic and the audio host sees a single request at a time
//! - Already cached verses are skipped
//! - Single verse failures are counted, not fatal; the download fails only
//!   when the failure ratio exceeds `CacheConfig::max_failure_ratio`
//! - Cancellation is checked before every verse and also aborts the fetch in
//!   flight. A verse already being written to the store is finished first
//! - Leftovers of interrupted writes are purged before a download starts and
//!   when a surah is deleted
//! - Only one surah download runs at a time

use crate::cache::{
    config::CacheConfig,
    key::{self, AudioCacheKey},
    progress::DownloadProgress,
};
use crate::error::{PlaybackError, Result};
use crate::reciter::ReciterProfile;
use crate::resolver::SourceResolver;
use crate::types::{SurahSummary, SURAH_COUNT};
use bridge_traits::{AudioCacheStore, HttpClient, HttpRequest, RetryPolicy};
use bytes::Bytes;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Debug)]
struct ActiveDownload {
    surah_id: u16,
    token: CancellationToken,
}

/// Clears the active download slot when the download ends, however it ends.
struct ActiveDownloadGuard<'a> {
    slot: &'a Mutex<Option<ActiveDownload>>,
}

impl Drop for ActiveDownloadGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

enum VerseFetch {
    Cached,
    Fetched(Bytes),
    Failed,
}

enum VerseOutcome {
    Skipped,
    Stored,
    Failed,
}

/// Per-reciter verse audio cache backed by an [`AudioCacheStore`].
pub struct DownloadCacheManager {
    config: CacheConfig,
    store: Arc<dyn AudioCacheStore>,
    http_client: Arc<dyn HttpClient>,
    event_bus: Option<EventBus>,
    active: Mutex<Option<ActiveDownload>>,
}

impl DownloadCacheManager {
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn AudioCacheStore>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            config,
            store,
            http_client,
            event_bus: None,
            active: Mutex::new(None),
        }
    }

    /// Set event bus for download events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Resolver reading from the same store.
    pub fn resolver(&self) -> SourceResolver {
        SourceResolver::new(Arc::clone(&self.store), self.config.clone())
    }

    fn namespace(&self, reciter_id: &str) -> String {
        key::namespace(&self.config.namespace_prefix, reciter_id)
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine.
            let _ = bus.emit(CoreEvent::Download(event));
        }
    }

    /// Whether the exact verse is present in the reciter's cache.
    #[instrument(skip(self))]
    pub async fn is_verse_cached(&self, reciter_id: &str, surah_id: u16, verse_id: u16) -> Result<bool> {
        let key = AudioCacheKey::new(reciter_id, surah_id, verse_id);
        Ok(self
            .store
            .contains(&key.namespace(&self.config.namespace_prefix), &key.entry_key())
            .await?)
    }

    /// True iff the number of entries carrying the surah's prefix is at least
    /// `total_verses`.
    #[instrument(skip(self))]
    pub async fn is_surah_fully_cached(
        &self,
        reciter_id: &str,
        surah_id: u16,
        total_verses: u16,
    ) -> Result<bool> {
        let keys = self.store.keys(&self.namespace(reciter_id)).await?;
        let count = keys
            .iter()
            .filter_map(|k| key::parse_entry_key(k))
            .filter(|(surah, _)| *surah == surah_id)
            .count();
        Ok(count >= usize::from(total_verses))
    }

    /// Cache status for many surahs from a single key enumeration.
    #[instrument(skip(self, surahs), fields(surahs = surahs.len()))]
    pub async fn cached_status_for_surahs(
        &self,
        reciter_id: &str,
        surahs: &[SurahSummary],
    ) -> Result<HashMap<u16, bool>> {
        let keys = self.store.keys(&self.namespace(reciter_id)).await?;

        let mut counts: HashMap<u16, usize> = HashMap::new();
        for (surah, _) in keys.iter().filter_map(|k| key::parse_entry_key(k)) {
            *counts.entry(surah).or_default() += 1;
        }

        Ok(surahs
            .iter()
            .map(|s| {
                let cached = counts.get(&s.surah_id).copied().unwrap_or(0);
                (s.surah_id, cached >= usize::from(s.total_verses))
            })
            .collect())
    }

    /// Surah currently being downloaded, if any.
    pub fn active_download(&self) -> Option<u16> {
        self.active.lock().as_ref().map(|a| a.surah_id)
    }

    /// Cancels the running download. Returns `false` if none was running.
    pub fn cancel_active_download(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(active) => {
                info!(surah = active.surah_id, "Cancelling active download");
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    fn begin(&self, surah_id: u16, token: &CancellationToken) -> Result<ActiveDownloadGuard<'_>> {
        let mut slot = self.active.lock();
        if let Some(active) = slot.as_ref() {
            return Err(PlaybackError::DownloadInProgress {
                surah: active.surah_id,
            });
        }
        *slot = Some(ActiveDownload {
            surah_id,
            token: token.clone(),
        });
        Ok(ActiveDownloadGuard { slot: &self.active })
    }

    /// Downloads verses `1..=total_verses` of a surah into the reciter's cache.
    ///
    /// `on_progress` is called after every verse, skipped and failed ones
    /// included.
    ///
    /// # Errors
    ///
    /// - `DownloadInProgress` if another download is running
    /// - `DownloadCancelled` if `cancel` fires before the last verse
    /// - `DownloadFailed` if more than `max_failure_ratio` of the verses failed
    #[instrument(skip(self, reciter, on_progress, cancel), fields(reciter = %reciter.id))]
    pub async fn download_surah<F>(
        &self,
        reciter: &ReciterProfile,
        surah_id: u16,
        total_verses: u16,
        on_progress: F,
        cancel: CancellationToken,
    ) -> Result<()>
    where
        F: Fn(DownloadProgress) + Send + Sync,
    {
        if !(1..=SURAH_COUNT).contains(&surah_id) {
            return Err(PlaybackError::InvalidVerse(format!(
                "surah {} is outside 1..={}",
                surah_id, SURAH_COUNT
            )));
        }

        let _guard = self.begin(surah_id, &cancel)?;

        if total_verses == 0 {
            return Ok(());
        }

        info!(surah = surah_id, total = total_verses, "Starting surah download");
        self.emit(DownloadEvent::Started {
            reciter_id: reciter.id.clone(),
            surah_id,
            total_verses,
        });

        let namespace = self.namespace(&reciter.id);
        match self.store.purge_incomplete(&namespace).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Purged incomplete cache writes"),
            Err(e) => warn!(error = %e, "Failed to purge incomplete cache writes"),
        }

        let mut progress = DownloadProgress::new(surah_id, total_verses);

        for verse_id in 1..=total_verses {
            if cancel.is_cancelled() {
                return Err(self.cancelled(reciter, progress));
            }

            let key = AudioCacheKey::new(reciter.id.as_str(), surah_id, verse_id);
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.cancelled(reciter, progress));
                }
                fetched = self.fetch_missing(reciter, &key) => fetched,
            };

            // Stores run to completion; dropping a write half-way strands its
            // temporary file.
            let outcome = match fetched {
                VerseFetch::Cached => VerseOutcome::Skipped,
                VerseFetch::Failed => VerseOutcome::Failed,
                VerseFetch::Fetched(data) => self.store_verse(&key, data).await,
            };

            if matches!(outcome, VerseOutcome::Failed) {
                progress.failed += 1;
            }
            progress.completed = verse_id;

            on_progress(progress);
            self.emit(DownloadEvent::Progress {
                reciter_id: reciter.id.clone(),
                surah_id,
                completed: progress.completed,
                total: progress.total,
                failed: progress.failed,
                percent: progress.percent_complete(),
            });
        }

        if self
            .config
            .exceeds_failure_threshold(progress.failed, total_verses)
        {
            let error = PlaybackError::DownloadFailed {
                surah: surah_id,
                failed: progress.failed,
                total: total_verses,
            };
            warn!(surah = surah_id, failed = progress.failed, "Surah download failed");
            self.emit(DownloadEvent::Failed {
                reciter_id: reciter.id.clone(),
                surah_id,
                message: error.to_string(),
            });
            return Err(error);
        }

        info!(
            surah = surah_id,
            failed = progress.failed,
            "Surah download completed"
        );
        self.emit(DownloadEvent::Completed {
            reciter_id: reciter.id.clone(),
            surah_id,
            failed: progress.failed,
        });

        Ok(())
    }

    fn cancelled(&self, reciter: &ReciterProfile, progress: DownloadProgress) -> PlaybackError {
        info!(
            surah = progress.surah_id,
            completed = progress.completed,
            "Surah download cancelled"
        );
        self.emit(DownloadEvent::Cancelled {
            reciter_id: reciter.id.clone(),
            surah_id: progress.surah_id,
            completed: progress.completed,
        });
        PlaybackError::DownloadCancelled {
            surah: progress.surah_id,
            completed: progress.completed,
        }
    }

    async fn fetch_missing(&self, reciter: &ReciterProfile, key: &AudioCacheKey) -> VerseFetch {
        let namespace = key.namespace(&self.config.namespace_prefix);

        match self.store.contains(&namespace, &key.entry_key()).await {
            Ok(true) => return VerseFetch::Cached,
            Ok(false) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache lookup failed, fetching anyway"),
        }

        let url = key::remote_url(
            &self.config.audio_host,
            &reciter.remote_path_segment,
            key.surah_id,
            key.verse_id,
        );

        match self.fetch_verse(&url).await {
            Ok(data) => VerseFetch::Fetched(data),
            Err(e) => {
                warn!(key = %key, error = %e, "Verse fetch failed");
                VerseFetch::Failed
            }
        }
    }

    async fn store_verse(&self, key: &AudioCacheKey, data: Bytes) -> VerseOutcome {
        let namespace = key.namespace(&self.config.namespace_prefix);

        match self.store.put(&namespace, &key.entry_key(), data).await {
            Ok(()) => {
                debug!(key = %key, "Cached verse");
                VerseOutcome::Stored
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to store verse");
                VerseOutcome::Failed
            }
        }
    }

    async fn fetch_verse(&self, url: &str) -> Result<Bytes> {
        let request = HttpRequest::get(url).timeout(self.config.request_timeout);
        let policy = RetryPolicy {
            max_attempts: self.config.retry_attempts,
            ..RetryPolicy::default()
        };

        let response = self.http_client.execute_with_retry(request, policy).await?;

        if !response.is_success() {
            return Err(PlaybackError::Cache(format!(
                "HTTP {} for {}",
                response.status, url
            )));
        }
        if response.body.is_empty() {
            return Err(PlaybackError::Cache(format!("Empty body for {}", url)));
        }

        Ok(response.body)
    }

    /// Removes every cached verse of the surah. Returns how many entries were
    /// deleted; deleting an uncached surah is a no-op.
    #[instrument(skip(self))]
    pub async fn delete_surah(&self, reciter_id: &str, surah_id: u16) -> Result<usize> {
        let namespace = self.namespace(reciter_id);
        let keys = self.store.keys(&namespace).await?;
        if let Err(e) = self.store.purge_incomplete(&namespace).await {
            warn!(error = %e, "Failed to purge incomplete cache writes");
        }

        let mut removed = 0;
        for entry_key in keys.iter().filter(|k| {
            key::parse_entry_key(k).is_some_and(|(surah, _)| surah == surah_id)
        }) {
            if self.store.delete(&namespace, entry_key).await? {
                removed += 1;
            }
        }

        info!(surah = surah_id, removed, "Deleted surah audio");
        self.emit(DownloadEvent::Deleted {
            reciter_id: reciter_id.to_string(),
            surah_id,
            removed,
        });

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, HttpResponse};
    use mockall::mock;
    use std::collections::BTreeMap;
    use tokio::sync::Notify;

    mock! {
        pub Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
            async fn execute_with_retry(
                &self,
                request: HttpRequest,
                policy: RetryPolicy,
            ) -> bridge_traits::error::Result<HttpResponse>;
        }
    }

    /// In-memory store. A put of `slow_key` counts as an unfinished write
    /// until `put_release` is notified.
    #[derive(Default)]
    struct MapStore {
        entries: Mutex<BTreeMap<(String, String), Bytes>>,
        slow_key: Option<String>,
        put_started: Notify,
        put_release: Notify,
        unfinished: Mutex<usize>,
        purges: Mutex<usize>,
    }

    #[async_trait]
    impl AudioCacheStore for MapStore {
        async fn put(&self, cache: &str, key: &str, data: Bytes) -> bridge_traits::error::Result<()> {
            if self.slow_key.as_deref() == Some(key) {
                *self.unfinished.lock() += 1;
                self.put_started.notify_one();
                self.put_release.notified().await;
                *self.unfinished.lock() -= 1;
            }
            self.entries
                .lock()
                .insert((cache.to_string(), key.to_string()), data);
            Ok(())
        }

        async fn contains(&self, cache: &str, key: &str) -> bridge_traits::error::Result<bool> {
            Ok(self
                .entries
                .lock()
                .contains_key(&(cache.to_string(), key.to_string())))
        }

        async fn keys(&self, cache: &str) -> bridge_traits::error::Result<Vec<String>> {
            Ok(self
                .entries
                .lock()
                .keys()
                .filter(|(c, _)| c == cache)
                .map(|(_, k)| k.clone())
                .collect())
        }

        async fn delete(&self, cache: &str, key: &str) -> bridge_traits::error::Result<bool> {
            Ok(self
                .entries
                .lock()
                .remove(&(cache.to_string(), key.to_string()))
                .is_some())
        }

        async fn local_url(&self, cache: &str, key: &str) -> bridge_traits::error::Result<Option<String>> {
            Ok(self
                .entries
                .lock()
                .contains_key(&(cache.to_string(), key.to_string()))
                .then(|| format!("blob:{}/{}", cache, key)))
        }

        async fn purge_incomplete(&self, _cache: &str) -> bridge_traits::error::Result<usize> {
            *self.purges.lock() += 1;
            Ok(0)
        }
    }

    fn ok_response(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            headers: Default::default(),
            body: Bytes::from_static(b"ID3\x04"),
        }
    }

    fn reciter() -> ReciterProfile {
        ReciterProfile::new("alafasy", "Mishary Rashid Alafasy", "Alafasy_128kbps")
    }

    #[tokio::test]
    async fn test_cached_verses_are_not_fetched() {
        let store = Arc::new(MapStore::default());
        for verse in 1..=4 {
            store
                .put("audio-cache-alafasy", &key::verse_code(112, verse), Bytes::new())
                .await
                .unwrap();
        }

        let mut http = MockHttp::new();
        http.expect_execute_with_retry().never();
        http.expect_execute().never();

        let manager = DownloadCacheManager::new(CacheConfig::default(), store, Arc::new(http));
        let seen = Mutex::new(Vec::new());
        manager
            .download_surah(&reciter(), 112, 4, |p| seen.lock().push(p.completed), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_requests_use_remote_url_and_single_attempt() {
        let store = Arc::new(MapStore::default());
        let mut http = MockHttp::new();
        http.expect_execute_with_retry()
            .withf(|request, policy| {
                request
                    .url
                    .starts_with("https://everyayah.com/data/Alafasy_128kbps/108")
                    && request.url.ends_with(".mp3")
                    && policy.max_attempts == 1
            })
            .times(3)
            .returning(|_, _| Ok(ok_response(200)));

        let manager = DownloadCacheManager::new(CacheConfig::default(), store.clone(), Arc::new(http));
        manager
            .download_surah(&reciter(), 108, 3, |_| {}, CancellationToken::new())
            .await
            .unwrap();

        assert!(manager.is_surah_fully_cached("alafasy", 108, 3).await.unwrap());
        assert!(manager.is_verse_cached("alafasy", 108, 2).await.unwrap());
        assert!(!manager.is_verse_cached("husary", 108, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_http_errors_count_as_failures() {
        let store = Arc::new(MapStore::default());
        let mut http = MockHttp::new();
        http.expect_execute_with_retry().returning(|request, _| {
            if request.url.ends_with("103002.mp3") {
                Ok(ok_response(404))
            } else if request.url.ends_with("103003.mp3") {
                Err(BridgeError::OperationFailed("connection reset".to_string()))
            } else {
                Ok(ok_response(200))
            }
        });

        let manager = DownloadCacheManager::new(CacheConfig::default(), store, Arc::new(http));
        let result = manager
            .download_surah(&reciter(), 103, 3, |_| {}, CancellationToken::new())
            .await;

        match result {
            Err(PlaybackError::DownloadFailed { surah, failed, total }) => {
                assert_eq!((surah, failed, total), (103, 2, 3));
            }
            other => panic!("expected DownloadFailed, got {:?}", other),
        }
        assert!(manager.is_verse_cached("alafasy", 103, 1).await.unwrap());
        assert!(!manager.is_surah_fully_cached("alafasy", 103, 3).await.unwrap());
        assert_eq!(manager.active_download(), None);
    }

    #[tokio::test]
    async fn test_cancel_during_store_finishes_the_write() {
        let store = Arc::new(MapStore {
            slow_key: Some(key::verse_code(113, 2)),
            ..Default::default()
        });
        let mut http = MockHttp::new();
        http.expect_execute_with_retry()
            .times(2)
            .returning(|_, _| Ok(ok_response(200)));

        let manager = Arc::new(DownloadCacheManager::new(
            CacheConfig::default(),
            store.clone(),
            Arc::new(http),
        ));
        let token = CancellationToken::new();
        let download = tokio::spawn({
            let manager = manager.clone();
            let token = token.clone();
            async move {
                manager
                    .download_surah(&reciter(), 113, 5, |_| {}, token)
                    .await
            }
        });

        store.put_started.notified().await;
        assert!(manager.cancel_active_download());
        store.put_release.notify_one();

        match download.await.unwrap() {
            Err(PlaybackError::DownloadCancelled { surah, completed }) => {
                assert_eq!((surah, completed), (113, 2));
            }
            other => panic!("expected DownloadCancelled, got {:?}", other),
        }
        assert_eq!(*store.unfinished.lock(), 0);
        assert_eq!(*store.purges.lock(), 1);
        assert!(manager.is_verse_cached("alafasy", 113, 2).await.unwrap());
        assert!(!manager.is_verse_cached("alafasy", 113, 3).await.unwrap());
        assert_eq!(manager.active_download(), None);
    }

    #[tokio::test]
    async fn test_batch_status_groups_by_surah() {
        let store = Arc::new(MapStore::default());
        for (surah, verse) in [(1, 1), (1, 2), (1, 3), (1, 4), (1, 5), (1, 6), (1, 7), (2, 1)] {
            store
                .put("audio-cache-alafasy", &key::verse_code(surah, verse), Bytes::new())
                .await
                .unwrap();
        }
        store
            .put("audio-cache-alafasy", "notes", Bytes::new())
            .await
            .unwrap();

        let manager = DownloadCacheManager::new(CacheConfig::default(), store, Arc::new(MockHttp::new()));
        let status = manager
            .cached_status_for_surahs(
                "alafasy",
                &[
                    SurahSummary::new(1, 7),
                    SurahSummary::new(2, 286),
                    SurahSummary::new(3, 200),
                ],
            )
            .await
            .unwrap();

        assert_eq!(status.get(&1), Some(&true));
        assert_eq!(status.get(&2), Some(&false));
        assert_eq!(status.get(&3), Some(&false));
    }

    #[tokio::test]
    async fn test_delete_surah_is_idempotent() {
        let store = Arc::new(MapStore::default());
        for verse in 1..=3 {
            store
                .put("audio-cache-alafasy", &key::verse_code(110, verse), Bytes::new())
                .await
                .unwrap();
        }
        store
            .put("audio-cache-alafasy", &key::verse_code(111, 1), Bytes::new())
            .await
            .unwrap();

        let manager = DownloadCacheManager::new(CacheConfig::default(), store.clone(), Arc::new(MockHttp::new()));
        assert_eq!(manager.delete_surah("alafasy", 110).await.unwrap(), 3);
        assert_eq!(*store.purges.lock(), 1);
        assert_eq!(manager.delete_surah("alafasy", 110).await.unwrap(), 0);
        assert!(manager.is_verse_cached("alafasy", 111, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_invalid_surah() {
        let manager = DownloadCacheManager::new(
            CacheConfig::default(),
            Arc::new(MapStore::default()),
            Arc::new(MockHttp::new()),
        );
        let result = manager
            .download_surah(&reciter(), 0, 7, |_| {}, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(PlaybackError::InvalidVerse(_))));
    }

    #[test]
    fn test_cancel_without_download() {
        let manager = DownloadCacheManager::new(
            CacheConfig::default(),
            Arc::new(MapStore::default()),
            Arc::new(MockHttp::new()),
        );
        assert!(!manager.cancel_active_download());
    }
}
