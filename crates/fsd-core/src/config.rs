//! Configuration structures for file-based target discovery.
//!
//! - [`DiscoveryConfig`] - Which files to read and how often to re-scan them
//! - [`WatchConfig`] - Change notification settings (debouncing, buffering)
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] and deserialize with
//! `#[serde(default)]`, so a configuration file only needs the fields it
//! changes.

use std::time::Duration;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File extensions accepted in discovery patterns.
const PATTERN_EXTENSIONS: &[&str] = &[".json", ".yml", ".yaml", ".JSON", ".YML", ".YAML"];

/// Which files to discover targets from.
///
/// # Examples
///
/// ```
/// use fsd_core::DiscoveryConfig;
/// use std::time::Duration;
///
/// let config = DiscoveryConfig::default();
/// assert!(config.files.is_empty());
/// assert_eq!(config.refresh_interval(), Duration::from_secs(300));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Glob patterns of target files. Wildcards are allowed in the file name
    /// only, and the pattern must end in `.json`, `.yml` or `.yaml`.
    pub files: Vec<String>,

    /// Fallback re-scan interval in seconds.
    ///
    /// Files are re-read at least this often even if no change notification
    /// arrives.
    pub refresh_interval_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            refresh_interval_secs: 300,
        }
    }
}

impl DiscoveryConfig {
    /// Returns the fallback refresh interval.
    #[inline]
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Validates the file patterns and the refresh interval.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if no patterns are configured or
    /// the interval is zero, and [`ConfigError::InvalidPattern`] for the first
    /// pattern that cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.files.is_empty() {
            return Err(ConfigError::invalid_option(
                "files",
                "at least one file pattern is required",
            ));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::invalid_option(
                "refresh_interval_secs",
                "must be greater than zero",
            ));
        }
        self.files.iter().try_for_each(|p| validate_pattern(p))
    }
}

/// Checks a single discovery pattern.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPattern`] if the pattern is not a valid glob,
/// has a wildcard outside its file name, or has an unsupported extension.
///
/// # Examples
///
/// ```
/// use fsd_core::config::validate_pattern;
///
/// assert!(validate_pattern("targets/*.json").is_ok());
/// assert!(validate_pattern("targets/*/web.json").is_err());
/// assert!(validate_pattern("targets/*.txt").is_err());
/// ```
pub fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    glob::Pattern::new(pattern)
        .map_err(|e| ConfigError::invalid_pattern(pattern, e.to_string()))?;

    let path = Utf8Path::new(pattern);
    if path
        .parent()
        .is_some_and(|dir| dir.as_str().contains('*'))
    {
        return Err(ConfigError::invalid_pattern(
            pattern,
            "wildcards are only allowed in the file name",
        ));
    }
    if !PATTERN_EXTENSIONS.iter().any(|ext| pattern.ends_with(ext)) {
        return Err(ConfigError::invalid_pattern(
            pattern,
            "file extension must be .json, .yml or .yaml",
        ));
    }
    Ok(())
}

/// Configuration for change notifications.
///
/// # Examples
///
/// ```
/// use fsd_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert!(config.enabled);
/// assert_eq!(config.debounce_ms, 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Whether to subscribe to filesystem notifications at all.
    ///
    /// When disabled, only the fallback refresh interval triggers re-scans.
    pub enabled: bool,

    /// Debounce window in milliseconds.
    ///
    /// Change signals arriving within this window of each other are coalesced
    /// into a single refresh.
    pub debounce_ms: u64,

    /// Upper bound in milliseconds on how long a steady stream of change
    /// signals can postpone a refresh.
    pub max_debounce_ms: u64,

    /// Capacity of the notification channel between the watcher thread and
    /// the discovery loop.
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 50,
            max_debounce_ms: 1000,
            channel_capacity: 16,
        }
    }
}

impl WatchConfig {
    /// Returns the debounce window.
    #[inline]
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Returns the longest a refresh may be postponed by ongoing changes.
    ///
    /// Never shorter than the debounce window itself.
    #[inline]
    #[must_use]
    pub fn max_debounce(&self) -> Duration {
        Duration::from_millis(self.max_debounce_ms.max(self.debounce_ms))
    }

    /// Validates the watch settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for a zero debounce window or a
    /// zero channel capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::invalid_option(
                "debounce_ms",
                "must be greater than zero",
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "channel_capacity",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Root configuration.
///
/// # Examples
///
/// ```
/// use fsd_core::Config;
///
/// let config: Config = serde_json::from_str(r#"{"discovery": {"files": ["sd/*.yml"]}}"#)?;
/// assert_eq!(config.discovery.files, vec!["sd/*.yml"]);
/// assert!(config.validate().is_ok());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discovery configuration.
    pub discovery: DiscoveryConfig,

    /// Change notification configuration.
    pub watch: WatchConfig,
}

impl Config {
    /// Reads a JSON configuration file.
    ///
    /// The result is not validated; call [`validate`](Self::validate) once
    /// command line overrides have been applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid JSON for this structure.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Validates all sections.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.discovery.validate()?;
        self.watch.validate()
    }
}
