//! Cache configuration and policies

use std::time::Duration;

/// Configuration for the download cache manager.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Scheme and host of the audio provider (default: `https://everyayah.com`)
    pub audio_host: String,

    /// Prefix of every per-reciter cache name (default: `audio-cache-`)
    pub namespace_prefix: String,

    /// A surah download fails when `failed / total` exceeds this (default: 0.10)
    pub max_failure_ratio: f64,

    /// Timeout for a single verse request (default: 30s)
    pub request_timeout: Duration,

    /// HTTP attempts per verse before it counts as failed (default: 1)
    pub retry_attempts: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            audio_host: "https://everyayah.com".to_string(),
            namespace_prefix: "audio-cache-".to_string(),
            max_failure_ratio: 0.10,
            request_timeout: Duration::from_secs(30),
            retry_attempts: 1,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audio_host(mut self, host: impl Into<String>) -> Self {
        self.audio_host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    pub fn with_max_failure_ratio(mut self, ratio: f64) -> Self {
        self.max_failure_ratio = ratio;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.audio_host.is_empty() {
            return Err("audio_host cannot be empty".to_string());
        }

        if self.namespace_prefix.is_empty() {
            return Err("namespace_prefix cannot be empty".to_string());
        }

        if !(0.0..=1.0).contains(&self.max_failure_ratio) {
            return Err(format!(
                "max_failure_ratio must be within [0.0, 1.0], got {}",
                self.max_failure_ratio
            ));
        }

        if self.request_timeout.is_zero() {
            return Err("request_timeout must be greater than 0".to_string());
        }

        if self.retry_attempts == 0 {
            return Err("retry_attempts must be at least 1".to_string());
        }

        Ok(())
    }

    /// Whether `failed` failures out of `total` verses reject the download.
    pub fn exceeds_failure_threshold(&self, failed: u16, total: u16) -> bool {
        total > 0 && f64::from(failed) / f64::from(total) > self.max_failure_ratio
    }
}
