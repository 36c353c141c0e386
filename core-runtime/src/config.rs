//! # Core Configuration Module
//!
//! Provides configuration management for the recitation audio core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every host bridge and tunable the core needs. `build()` fails fast
//! with actionable messages when a capability is missing or a value is out of
//! range.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Fetching verse audio (desktop default: reqwest)
//! - `AudioCacheStore` - Offline verse audio (desktop default: tokio fs)
//! - `SettingsStore` - Active reciter and repeat preferences (desktop default: SQLite)
//!
//! ## Optional Dependencies
//!
//! - `Notifier` - Toasts for non-fatal warnings (default: forwards to `tracing`)
//!
//! When the `desktop-shims` feature is enabled, desktop implementations are
//! injected for every required bridge that was not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(MyHttpClient))
//!     .audio_cache(Arc::new(MyCacheStore))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .download_failure_threshold(0.05)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
#[cfg(not(feature = "desktop-shims"))]
use bridge_traits::notification::NotificationSeverity;
use bridge_traits::{AudioCacheStore, HttpClient, Notifier, SettingsStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default host serving verse audio.
pub const DEFAULT_AUDIO_HOST: &str = "https://everyayah.com";

/// Reciter used until the user picks one.
pub const DEFAULT_RECITER_ID: &str = "alafasy";

/// Fraction of verses allowed to fail before a surah download is rejected.
pub const DEFAULT_DOWNLOAD_FAILURE_THRESHOLD: f64 = 0.10;

/// Per-verse request timeout for downloads.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Core configuration for the recitation audio core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client used for verse downloads
    pub http_client: Arc<dyn HttpClient>,

    /// Named binary caches holding downloaded verse audio
    pub audio_cache: Arc<dyn AudioCacheStore>,

    /// User preferences storage
    pub settings_store: Arc<dyn SettingsStore>,

    /// Toast emitter for non-fatal warnings
    pub notifier: Arc<dyn Notifier>,

    /// Root directory used by the desktop defaults, if any
    pub cache_dir: Option<PathBuf>,

    /// Scheme and host of the audio provider, without a trailing slash
    pub audio_host: String,

    /// Reciter selected when no preference is stored
    pub default_reciter_id: String,

    /// Failure ratio in `[0.0, 1.0]` above which a surah download fails
    pub download_failure_threshold: f64,

    /// Timeout applied to each verse request
    pub request_timeout: Duration,

    /// Buffer size of the broadcast event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("audio_cache", &"AudioCacheStore { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("notifier", &"Notifier { ... }")
            .field("cache_dir", &self.cache_dir)
            .field("audio_host", &self.audio_host)
            .field("default_reciter_id", &self.default_reciter_id)
            .field(
                "download_failure_threshold",
                &self.download_failure_threshold,
            )
            .field("request_timeout", &self.request_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates value ranges. Bridges are checked by the builder.
    pub fn validate(&self) -> Result<()> {
        if !(self.audio_host.starts_with("https://") || self.audio_host.starts_with("http://")) {
            return Err(Error::Config(format!(
                "Audio host must be an http(s) URL, got {:?}",
                self.audio_host
            )));
        }

        if self.audio_host.ends_with('/') {
            return Err(Error::Config(
                "Audio host must not end with a slash".to_string(),
            ));
        }

        if self.default_reciter_id.trim().is_empty() {
            return Err(Error::Config(
                "Default reciter id cannot be empty".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.download_failure_threshold) {
            return Err(Error::Config(format!(
                "Download failure threshold must be within [0.0, 1.0], got {}",
                self.download_failure_threshold
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Defaults
// ============================================================================

#[cfg(feature = "desktop-shims")]
fn provide_default_notifier() -> Arc<dyn Notifier> {
    Arc::new(bridge_desktop::TracingNotifier::new())
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_notifier() -> Arc<dyn Notifier> {
    Arc::new(LogNotifier)
}

/// Notifier used when the host does not provide one.
#[cfg(not(feature = "desktop-shims"))]
struct LogNotifier;

#[cfg(not(feature = "desktop-shims"))]
impl Notifier for LogNotifier {
    fn notify(&self, message: &str, severity: NotificationSeverity) {
        match severity {
            NotificationSeverity::Error => tracing::error!(target: "notification", "{}", message),
            NotificationSeverity::Warning => tracing::warn!(target: "notification", "{}", message),
            _ => tracing::info!(target: "notification", "{}", message),
        }
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str, platforms: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: ensure the 'desktop-shims' feature is enabled to use the default. {}",
            capability, purpose, platforms
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn default_cache_root(cache_dir: Option<&Path>) -> PathBuf {
    cache_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| bridge_desktop::FsAudioCacheStore::new().root().to_path_buf())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing(
        "HttpClient",
        "downloading verse audio",
        "Mobile: inject URLSession/OkHttp. Web: inject a fetch-based client.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_audio_cache(cache_dir: Option<&Path>) -> Result<Arc<dyn AudioCacheStore>> {
    let root = default_cache_root(cache_dir).join("audio");
    Ok(Arc::new(bridge_desktop::FsAudioCacheStore::with_root(root)))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_audio_cache(_cache_dir: Option<&Path>) -> Result<Arc<dyn AudioCacheStore>> {
    Err(capability_missing(
        "AudioCacheStore",
        "offline verse audio",
        "Mobile: inject an app-private cache directory store. Web: inject Cache Storage.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(cache_dir: Option<&Path>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let path = default_cache_root(cache_dir).join("settings.db");

    let init_store = |path: PathBuf| -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create Tokio runtime for default settings store: {}",
                    e
                ))
            })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on panics inside a runtime, so hop to a plain thread there.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_cache_dir: Option<&Path>) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing(
        "SettingsStore",
        "persisting the active reciter and repeat preferences",
        "Mobile: inject UserDefaults/DataStore. Web: inject a localStorage-based store.",
    ))
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    audio_cache: Option<Arc<dyn AudioCacheStore>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    cache_dir: Option<PathBuf>,
    audio_host: Option<String>,
    default_reciter_id: Option<String>,
    download_failure_threshold: Option<f64>,
    request_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn audio_cache(mut self, cache: Arc<dyn AudioCacheStore>) -> Self {
        self.audio_cache = Some(cache);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Root directory for the desktop default cache and settings database.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Audio provider host, e.g. `https://everyayah.com`. A trailing slash is
    /// trimmed.
    pub fn audio_host(mut self, host: impl Into<String>) -> Self {
        self.audio_host = Some(host.into().trim_end_matches('/').to_string());
        self
    }

    pub fn default_reciter_id(mut self, id: impl Into<String>) -> Self {
        self.default_reciter_id = Some(id.into());
        self
    }

    /// Failure ratio above which a surah download is rejected (default 0.10).
    pub fn download_failure_threshold(mut self, ratio: f64) -> Self {
        self.download_failure_threshold = Some(ratio);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the configuration, filling in platform defaults where enabled.
    ///
    /// # Errors
    ///
    /// - `Error::CapabilityMissing` if a required bridge is absent and no
    ///   desktop default is available
    /// - `Error::Config` if a value is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let cache_dir = self.cache_dir;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let audio_cache = match self.audio_cache {
            Some(cache) => cache,
            None => provide_default_audio_cache(cache_dir.as_deref())?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(cache_dir.as_deref())?,
        };

        let notifier = self.notifier.unwrap_or_else(provide_default_notifier);

        let config = CoreConfig {
            http_client,
            audio_cache,
            settings_store,
            notifier,
            cache_dir,
            audio_host: self
                .audio_host
                .unwrap_or_else(|| DEFAULT_AUDIO_HOST.to_string()),
            default_reciter_id: self
                .default_reciter_id
                .unwrap_or_else(|| DEFAULT_RECITER_ID.to_string()),
            download_failure_threshold: self
                .download_failure_threshold
                .unwrap_or(DEFAULT_DOWNLOAD_FAILURE_THRESHOLD),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
