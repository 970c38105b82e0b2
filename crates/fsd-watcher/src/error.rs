//! Error types for the fsd-watcher crate.

use camino::Utf8PathBuf;

/// Errors that can occur while subscribing to change notifications.
///
/// # Error Recovery Strategy
///
/// None of these errors stop target discovery: without notifications the
/// discovery loop falls back to its periodic refresh. The split below only
/// decides how the notifier treats a failed subscription.
///
/// - **Notify errors** ([`WatchError::Notify`]): Not recoverable by retrying
///   alone (watch limits, permissions)
/// - **Path not found** ([`WatchError::PathNotFound`]): Recoverable - the
///   directory is retried on the next refresh
/// - **Channel closed** ([`WatchError::ChannelClosed`]): The notifier is gone
/// - **Invalid pattern** ([`WatchError::Pattern`]): The notifier never starts
///
/// # Examples
///
/// ```
/// use fsd_watcher::WatchError;
///
/// let err = WatchError::path_not_found("targets");
/// assert!(err.is_recoverable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize or operate the notify watcher.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// A directory to watch does not exist (yet).
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The channel between the watcher thread and the async side is gone.
    #[error("event channel closed unexpectedly")]
    ChannelClosed,

    /// A file pattern used for filtering is not a valid glob.
    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Returns `true` if retrying the same subscription later can succeed
    /// without outside intervention.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::PathNotFound(_))
    }
}
