//! Error types for the fsd-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration loading and
//! validation failures.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use fsd_core::ConfigError;
///
/// let error = ConfigError::invalid_pattern("sd/*/x.json", "wildcards are only allowed in the file name");
/// assert!(error.to_string().contains("sd/*/x.json"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The provided path is invalid or malformed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// A file pattern cannot be used for discovery.
    #[error("path name '{pattern}' is not valid for file discovery: {reason}")]
    InvalidPattern {
        /// The offending glob pattern.
        pattern: String,
        /// Explanation of why the pattern was rejected.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[inline]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`ConfigError::InvalidPattern`] error.
    #[inline]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_display() {
        let error = ConfigError::InvalidPath {
            path: Utf8PathBuf::from("/etc/fsd.json"),
            reason: "not a file".to_owned(),
        };
        let msg = error.to_string();
        assert!(msg.contains("/etc/fsd.json"));
        assert!(msg.contains("not a file"));
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("refresh_interval_secs", "must be positive");
        insta::assert_snapshot!(
            error.to_string(),
            @"invalid configuration option 'refresh_interval_secs': must be positive"
        );
    }

    #[test]
    fn test_invalid_pattern_display() {
        let error = ConfigError::invalid_pattern("targets/*.txt", "unsupported extension");
        insta::assert_snapshot!(
            error.to_string(),
            @"path name 'targets/*.txt' is not valid for file discovery: unsupported extension"
        );
    }

    #[test]
    fn test_parse_error_from_serde() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = ConfigError::from(source);
        assert!(error.to_string().starts_with("failed to parse configuration"));
    }
}
