//! Configuration types for the hostsync system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::resolver::Provider;

/// Domains served by default: the GitHub endpoints whose resolution is
/// commonly interfered with.
pub const DEFAULT_DOMAINS: &[&str] = &[
    "alive.github.com",
    "api.github.com",
    "assets-cdn.github.com",
    "avatars.githubusercontent.com",
    "avatars0.githubusercontent.com",
    "avatars1.githubusercontent.com",
    "avatars2.githubusercontent.com",
    "avatars3.githubusercontent.com",
    "avatars4.githubusercontent.com",
    "avatars5.githubusercontent.com",
    "camo.githubusercontent.com",
    "central.github.com",
    "cloud.githubusercontent.com",
    "codeload.github.com",
    "collector.github.com",
    "desktop.githubusercontent.com",
    "favicons.githubusercontent.com",
    "gist.github.com",
    "github-cloud.s3.amazonaws.com",
    "github-com.s3.amazonaws.com",
    "github-production-release-asset-2e65be.s3.amazonaws.com",
    "github-production-repository-file-5c1aeb.s3.amazonaws.com",
    "github-production-user-asset-6210df.s3.amazonaws.com",
    "github.blog",
    "github.com",
    "github.community",
    "github.githubassets.com",
    "github.global.ssl.fastly.net",
    "github.io",
    "github.map.fastly.net",
    "githubstatus.com",
    "live.github.com",
    "media.githubusercontent.com",
    "objects.githubusercontent.com",
    "pipelines.actions.githubusercontent.com",
    "raw.githubusercontent.com",
    "user-images.githubusercontent.com",
    "education.github.com",
    "private-user-images.githubusercontent.com",
];

/// Main hostsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Domains to keep resolved, in rendering order
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,

    /// Lookup providers in preference order; the first is the default
    #[serde(default = "default_providers")]
    pub providers: Vec<Provider>,

    /// Try the next provider when the selected one fails
    #[serde(default)]
    pub provider_fallback: bool,

    /// Per-lookup retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Batch orchestration settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Cache key and staleness window
    #[serde(default)]
    pub cache: CacheConfig,

    /// Key-value store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Scheduled refresh settings
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl SyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            domains: default_domains(),
            providers: default_providers(),
            provider_fallback: false,
            retry: RetryConfig::default(),
            batch: BatchConfig::default(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }

    /// Create a configuration for an explicit domain list
    pub fn with_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
            ..Self::new()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domains.is_empty() {
            return Err(crate::Error::config("No domains configured"));
        }

        let mut seen = HashSet::new();
        for domain in &self.domains {
            validate_domain_name(domain)?;
            if !seen.insert(domain.as_str()) {
                return Err(crate::Error::config(format!(
                    "Domain listed twice: {}",
                    domain
                )));
            }
        }

        if self.providers.is_empty() {
            return Err(crate::Error::config("No lookup providers configured"));
        }

        self.retry.validate()?;
        self.batch.validate()?;
        self.cache.validate()?;
        self.store.validate()?;
        self.schedule.validate()?;

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

/// Retry policy for a single lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Delay before the first retry (in milliseconds); doubles afterwards
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl RetryConfig {
    /// Validate the retry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_attempts == 0 {
            return Err(crate::Error::config("Retry max_attempts must be >= 1"));
        }
        Ok(())
    }

    /// Delay before the first retry
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

/// Batch orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Domains resolved concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between consecutive batches (in milliseconds)
    ///
    /// Self-throttling against rate limits on the lookup provider.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

impl BatchConfig {
    /// Validate the batch configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.batch_size == 0 {
            return Err(crate::Error::config("Batch size must be > 0"));
        }
        Ok(())
    }

    /// Pause between batches
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Store key holding the whole dataset
    #[serde(default = "default_cache_key")]
    pub key: String,

    /// Age after which the dataset is re-resolved on read (in seconds)
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
}

impl CacheConfig {
    /// Validate the cache configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.key.is_empty() {
            return Err(crate::Error::config("Cache key cannot be empty"));
        }
        if self.staleness_secs == 0 {
            return Err(crate::Error::config("Staleness window must be > 0"));
        }
        Ok(())
    }

    /// Staleness window as a chrono duration
    ///
    /// Saturates at `chrono::Duration::MAX` for windows chrono cannot represent.
    pub fn staleness_window(&self) -> chrono::Duration {
        i64::try_from(self.staleness_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: default_cache_key(),
            staleness_secs: default_staleness_secs(),
        }
    }
}

/// Key-value store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-based store
    File {
        /// Directory holding one JSON file per key
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("File store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
        }
    }
}

/// Scheduled refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Interval between scheduled refreshes (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Run a refresh immediately when the engine starts
    #[serde(default = "default_run_on_start")]
    pub run_on_start: bool,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ScheduleConfig {
    /// Validate the schedule configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Refresh interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Interval between scheduled refreshes
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            run_on_start: default_run_on_start(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_domains() -> Vec<String> {
    DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect()
}

fn default_providers() -> Vec<Provider> {
    Provider::ALL.to_vec()
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    5
}

fn default_pacing_ms() -> u64 {
    2000
}

fn default_cache_key() -> String {
    "domain_data".to_string()
}

fn default_staleness_secs() -> u64 {
    3600
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_run_on_start() -> bool {
    true
}

fn default_event_channel_capacity() -> usize {
    100
}
