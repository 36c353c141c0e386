//! Directory-backed audio cache store.
//!
//! Layout: `<root>/<cache name>/<key>.mp3`. Writes go to a uniquely named
//! `.part` file first and are renamed into place, so readers never observe a
//! truncated entry. A write abandoned mid-way leaves its `.part` file behind
//! until [`AudioCacheStore::purge_incomplete`] runs.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::AudioCacheStore,
};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const ENTRY_EXTENSION: &str = "mp3";
const PARTIAL_EXTENSION: &str = "part";

/// `AudioCacheStore` backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct FsAudioCacheStore {
    root: PathBuf,
}

impl FsAudioCacheStore {
    /// Store rooted at the platform cache directory
    /// (`~/.cache/quran-audio` on Linux).
    pub fn new() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("quran-audio");
        Self::with_root(root)
    }

    /// Store rooted at an explicit directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate_segment(segment: &str) -> Result<()> {
        let valid = !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(BridgeError::OperationFailed(format!(
                "Invalid cache path segment: {:?}",
                segment
            )))
        }
    }

    fn cache_dir(&self, cache: &str) -> Result<PathBuf> {
        Self::validate_segment(cache)?;
        Ok(self.root.join(cache))
    }

    fn entry_path(&self, cache: &str, key: &str) -> Result<PathBuf> {
        Self::validate_segment(key)?;
        Ok(self
            .cache_dir(cache)?
            .join(format!("{}.{}", key, ENTRY_EXTENSION)))
    }

    fn file_url(path: &Path) -> String {
        let raw = path.to_string_lossy().replace('\\', "/");
        let encoded = raw.replace('%', "%25").replace(' ', "%20");
        if encoded.starts_with('/') {
            format!("file://{}", encoded)
        } else {
            format!("file:///{}", encoded)
        }
    }
}

impl Default for FsAudioCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioCacheStore for FsAudioCacheStore {
    async fn put(&self, cache: &str, key: &str, data: Bytes) -> Result<()> {
        let final_path = self.entry_path(cache, key)?;
        let dir = self.cache_dir(cache)?;
        fs::create_dir_all(&dir).await?;

        let temp_path = dir.join(format!(
            "{}.{}.{}",
            key,
            uuid::Uuid::new_v4().simple(),
            PARTIAL_EXTENSION
        ));

        if let Err(e) = fs::write(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            warn!(error = %e, cache, key, "Failed to move cache entry into place");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(cache, key, bytes = data.len(), "Stored cache entry");
        Ok(())
    }

    async fn contains(&self, cache: &str, key: &str) -> Result<bool> {
        let path = self.entry_path(cache, key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, cache: &str) -> Result<Vec<String>> {
        let dir = self.cache_dir(cache)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, cache: &str, key: &str) -> Result<bool> {
        let path = self.entry_path(cache, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(cache, key, "Deleted cache entry");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn local_url(&self, cache: &str, key: &str) -> Result<Option<String>> {
        if !self.contains(cache, key).await? {
            return Ok(None);
        }
        let path = self.entry_path(cache, key)?;
        let absolute = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()?.join(path)
        };
        Ok(Some(Self::file_url(&absolute)))
    }

    async fn purge_incomplete(&self, cache: &str) -> Result<usize> {
        let dir = self.cache_dir(cache)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PARTIAL_EXTENSION) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if removed > 0 {
            debug!(cache, removed, "Removed incomplete cache writes");
        }
        Ok(removed)
    }
}
