//! Error types for the fsd-discovery crate.
//!
//! This module provides [`DiscoveryError`] for everything that can go wrong
//! in a refresh cycle, and [`DecodeError`] for the format-specific decoding
//! failures wrapped by [`DiscoveryError::Decode`].

use camino::Utf8PathBuf;
use fsd_watcher::WatchError;

/// Errors that can occur during target discovery.
///
/// # Error Recovery Strategy
///
/// No variant stops discovery:
///
/// - **Path resolution** ([`DiscoveryError::PathResolution`]): the whole cycle is
///   skipped and retried on the next trigger
/// - **Parse failures** ([`Read`](DiscoveryError::Read),
///   [`Decode`](DiscoveryError::Decode), [`Invalid`](DiscoveryError::Invalid),
///   [`NilGroup`](DiscoveryError::NilGroup), [`Empty`](DiscoveryError::Empty)):
///   only that file is affected, and its last valid groups stay published
/// - **Notification** ([`DiscoveryError::Notification`]): discovery continues on
///   the periodic refresh alone
///
/// # Examples
///
/// ```
/// use fsd_discovery::DiscoveryError;
///
/// let err = DiscoveryError::empty("sd/a.json");
/// assert!(err.is_parse_failure());
/// assert_eq!(err.path().map(|p| p.as_str()), Some("sd/a.json"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// A file pattern could not be expanded.
    #[error("failed to resolve pattern '{pattern}': {source}")]
    PathResolution {
        /// The pattern that failed.
        pattern: String,
        /// The underlying glob error.
        #[source]
        source: glob::PatternError,
    },

    /// A matched file could not be read (vanished, permissions, ...).
    #[error("failed to read file {path}: {source}")]
    Read {
        /// The file that couldn't be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A file's content is not a valid target group document.
    #[error("failed to decode file {path}: {source}")]
    Decode {
        /// The file that couldn't be decoded.
        path: Utf8PathBuf,
        /// What went wrong.
        #[source]
        source: DecodeError,
    },

    /// A group decoded but failed validation.
    #[error("invalid target group {index} in {path}: {reason}")]
    Invalid {
        /// The file containing the group.
        path: Utf8PathBuf,
        /// Position of the group in the file.
        index: usize,
        /// Why the group was rejected.
        reason: String,
    },

    /// The group list contains a `null` item.
    #[error("nil target group item found in {path} at index {index}")]
    NilGroup {
        /// The file containing the item.
        path: Utf8PathBuf,
        /// Position of the item in the file.
        index: usize,
    },

    /// The file decoded to nothing (`null`, an empty document or an empty list).
    #[error("no target groups found in {path}")]
    Empty {
        /// The empty file.
        path: Utf8PathBuf,
    },

    /// Change notifications are unavailable.
    #[error("change notifications unavailable: {0}")]
    Notification(#[from] WatchError),
}

impl DiscoveryError {
    /// Creates a new [`DiscoveryError::Read`] error.
    #[inline]
    pub fn read(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`DiscoveryError::Decode`] error.
    #[inline]
    pub fn decode(path: impl Into<Utf8PathBuf>, source: impl Into<DecodeError>) -> Self {
        Self::Decode {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Creates a new [`DiscoveryError::Invalid`] error.
    #[inline]
    pub fn invalid(path: impl Into<Utf8PathBuf>, index: usize, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            index,
            reason: reason.into(),
        }
    }

    /// Creates a new [`DiscoveryError::Empty`] error.
    #[inline]
    pub fn empty(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Empty { path: path.into() }
    }

    /// Returns `true` for failures that keep the file's last valid groups.
    ///
    /// Unreadable, malformed, invalid, nil and empty content are all treated
    /// alike: the file is not downgraded to zero groups.
    #[inline]
    #[must_use]
    pub const fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            Self::Read { .. }
                | Self::Decode { .. }
                | Self::Invalid { .. }
                | Self::NilGroup { .. }
                | Self::Empty { .. }
        )
    }

    /// Returns `true` if the file could not be read at all.
    #[inline]
    #[must_use]
    pub const fn is_read_failure(&self) -> bool {
        matches!(self, Self::Read { .. })
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Read { path, .. }
            | Self::Decode { path, .. }
            | Self::Invalid { path, .. }
            | Self::NilGroup { path, .. }
            | Self::Empty { path } => Some(path),
            Self::PathResolution { .. } | Self::Notification(_) => None,
        }
    }
}

/// Format-level decoding failures.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Malformed JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The file extension does not name a supported format.
    #[error("unhandled file extension '{0}'")]
    UnsupportedExtension(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_read_error() {
        let err = DiscoveryError::read("sd/a.json", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.is_parse_failure());
        assert!(err.is_read_failure());
        assert_eq!(err.path().map(|p| p.as_str()), Some("sd/a.json"));
        assert!(err.to_string().contains("sd/a.json"));
    }

    #[test]
    fn test_decode_error() {
        let err = DiscoveryError::decode("sd/a.txt", DecodeError::UnsupportedExtension("txt".to_owned()));
        assert!(err.is_parse_failure());
        assert!(!err.is_read_failure());
        insta::assert_snapshot!(
            err.to_string(),
            @"failed to decode file sd/a.txt: unhandled file extension 'txt'"
        );
    }

    #[test]
    fn test_nil_group_error() {
        let err = DiscoveryError::NilGroup {
            path: Utf8PathBuf::from("sd/a.yml"),
            index: 1,
        };
        assert!(err.is_parse_failure());
        insta::assert_snapshot!(err.to_string(), @"nil target group item found in sd/a.yml at index 1");
    }

    #[test]
    fn test_path_resolution_error() {
        let err = DiscoveryError::PathResolution {
            pattern: "sd/[.json".to_owned(),
            source: glob::Pattern::new("sd/[.json").unwrap_err(),
        };
        assert!(!err.is_parse_failure());
        assert!(err.path().is_none());
        assert!(err.to_string().contains("sd/[.json"));
    }

    #[test]
    fn test_notification_error() {
        let err = DiscoveryError::from(WatchError::ChannelClosed);
        assert!(!err.is_parse_failure());
        assert!(err.path().is_none());
    }
}
