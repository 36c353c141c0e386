//! Storage Abstractions
//!
//! Provides platform-agnostic traits for the two kinds of persistent state the
//! core relies on: a key-value settings store and named binary caches that
//! hold downloaded recitation audio.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences storage:
/// - iOS: UserDefaults
/// - Android: SharedPreferences / DataStore
/// - Desktop: SQLite-backed key-value table
/// - Web: localStorage / IndexedDB
///
/// Values are opaque strings; callers that need structured values serialize
/// them themselves.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_reciter(store: &dyn SettingsStore) -> Result<()> {
///     store.set_string("activeReciterId", "alafasy").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }
}

/// Named binary cache storage trait
///
/// Mirrors the browser Cache Storage model: any number of caches, each
/// identified by a name, each holding binary entries under string keys.
/// The core uses one cache per reciter.
///
/// - Desktop: one directory per cache
/// - Web: Cache Storage / IndexedDB
/// - Mobile: app-private cache directory
///
/// # Atomicity
///
/// `put` must never leave a partially written entry visible to `contains`,
/// `keys` or `local_url`, even if the write is interrupted.
#[async_trait]
pub trait AudioCacheStore: Send + Sync {
    /// Store an entry, replacing any previous value under the same key.
    async fn put(&self, cache: &str, key: &str, data: Bytes) -> Result<()>;

    /// Check whether an entry exists.
    async fn contains(&self, cache: &str, key: &str) -> Result<bool>;

    /// List every key present in the named cache. A missing cache yields an
    /// empty list.
    async fn keys(&self, cache: &str) -> Result<Vec<String>>;

    /// Remove an entry. Returns `true` when something was deleted.
    async fn delete(&self, cache: &str, key: &str) -> Result<bool>;

    /// Produce a URL the host media engine can play the entry from, or `None`
    /// when the entry does not exist.
    ///
    /// The returned reference is only valid for the current process and must
    /// not be persisted.
    async fn local_url(&self, cache: &str, key: &str) -> Result<Option<String>>;

    /// Remove leftovers of interrupted writes in the named cache. Returns how
    /// many were removed. Stores whose writes cannot be interrupted keep the
    /// default.
    async fn purge_incomplete(&self, cache: &str) -> Result<usize> {
        let _ = cache;
        Ok(0)
    }
}
