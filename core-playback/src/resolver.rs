//! Chooses between the cached copy of a verse and its remote URL.

use crate::cache::{config::CacheConfig, key::{self, AudioCacheKey}};
use crate::reciter::ReciterProfile;
use bridge_traits::AudioCacheStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceOrigin {
    Cached,
    Remote,
}

/// A playable URL and where it points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub url: String,
    pub origin: SourceOrigin,
}

/// Resolves verse audio, preferring the local cache.
///
/// Resolution never fails: a cache lookup error degrades to the remote URL.
#[derive(Clone)]
pub struct SourceResolver {
    store: Arc<dyn AudioCacheStore>,
    config: CacheConfig,
}

impl SourceResolver {
    pub fn new(store: Arc<dyn AudioCacheStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    pub fn remote_url(&self, reciter: &ReciterProfile, surah_id: u16, verse_id: u16) -> String {
        key::remote_url(
            &self.config.audio_host,
            &reciter.remote_path_segment,
            surah_id,
            verse_id,
        )
    }

    pub async fn resolve(
        &self,
        reciter: &ReciterProfile,
        surah_id: u16,
        verse_id: u16,
    ) -> ResolvedSource {
        let key = AudioCacheKey::new(reciter.id.as_str(), surah_id, verse_id);

        match self
            .store
            .local_url(&key.namespace(&self.config.namespace_prefix), &key.entry_key())
            .await
        {
            Ok(Some(url)) => {
                trace!(key = %key, "Resolved verse from cache");
                return ResolvedSource {
                    url,
                    origin: SourceOrigin::Cached,
                };
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache lookup failed, streaming instead"),
        }

        ResolvedSource {
            url: self.remote_url(reciter, surah_id, verse_id),
            origin: SourceOrigin::Remote,
        }
    }
}
