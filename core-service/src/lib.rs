//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host bridges collected in a
//! [`CoreConfig`](core_runtime::config::CoreConfig) (HTTP, audio cache,
//! settings, notifications) into the recitation playback core. Desktop apps
//! typically enable the `desktop-shims` feature, which fills in every bridge
//! the host did not provide.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let service = CoreService::new(CoreConfig::builder().build()?)?;
//! let player = service.audio_player(media_handle)?;
//! player.initialize().await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use bridge_traits::MediaHandle;
use core_playback::cache::{CacheConfig, DownloadCacheManager};
use core_playback::{AudioPlayer, PlayerDependencies, ReciterRegistry};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Primary façade exposed to host applications.
pub struct CoreService {
    config: CoreConfig,
    registry: ReciterRegistry,
    downloads: Arc<DownloadCacheManager>,
    event_bus: EventBus,
    player_created: AtomicBool,
}

impl CoreService {
    /// Create a new service from a validated configuration.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let cache_config = cache_config_from(&config);
        cache_config
            .validate()
            .map_err(CoreError::InitializationFailed)?;

        let registry = ReciterRegistry::built_in()
            .with_default(&config.default_reciter_id)
            .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let downloads = Arc::new(
            DownloadCacheManager::new(
                cache_config,
                Arc::clone(&config.audio_cache),
                Arc::clone(&config.http_client),
            )
            .with_event_bus(event_bus.clone()),
        );

        info!(
            audio_host = %config.audio_host,
            default_reciter = %config.default_reciter_id,
            "Core service initialized"
        );

        Ok(Self {
            config,
            registry,
            downloads,
            event_bus,
            player_created: AtomicBool::new(false),
        })
    }

    /// Builds the service over the desktop bridges with default settings.
    #[cfg(feature = "desktop-shims")]
    pub fn bootstrap_desktop() -> Result<Self> {
        Self::new(CoreConfig::builder().build()?)
    }

    /// Creates the audio player driving `media`.
    ///
    /// # Errors
    ///
    /// `PlayerAlreadyCreated` on every call after the first: the host has a
    /// single media element and only one player may drive it.
    pub fn audio_player(&self, media: Arc<dyn MediaHandle>) -> Result<Arc<AudioPlayer>> {
        if self.player_created.swap(true, Ordering::SeqCst) {
            return Err(CoreError::PlayerAlreadyCreated);
        }

        Ok(Arc::new(AudioPlayer::new(PlayerDependencies {
            media,
            downloads: Arc::clone(&self.downloads),
            settings: Arc::clone(&self.config.settings_store),
            notifier: Arc::clone(&self.config.notifier),
            event_bus: self.event_bus.clone(),
            registry: self.registry.clone(),
        })))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn reciters(&self) -> &ReciterRegistry {
        &self.registry
    }

    /// Download manager shared with the player, for library screens that
    /// show or manage offline surahs without playing.
    pub fn downloads(&self) -> Arc<DownloadCacheManager> {
        Arc::clone(&self.downloads)
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }
}

fn cache_config_from(config: &CoreConfig) -> CacheConfig {
    CacheConfig::default()
        .with_audio_host(config.audio_host.clone())
        .with_max_failure_ratio(config.download_failure_threshold)
        .with_request_timeout(config.request_timeout)
}
