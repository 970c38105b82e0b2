//! Filtering of change events before they reach the discovery loop.
//!
//! Watched directories usually contain more than the target files (editor
//! swap files, unrelated configuration). Filtering in the watcher thread keeps
//! those from waking the discovery loop at all.
//!
//! # Examples
//!
//! ```
//! use fsd_watcher::{FileFilter, GlobFilter};
//! use camino::Utf8Path;
//!
//! let filter = GlobFilter::new(["sd/_*.yml"])?;
//!
//! assert!(filter.should_process(Utf8Path::new("/srv/sd/_web.yml")));
//! assert!(!filter.should_process(Utf8Path::new("/srv/sd/.web.yml.swp")));
//! # Ok::<(), fsd_watcher::WatchError>(())
//! ```

use camino::Utf8Path;
use smallvec::SmallVec;

use crate::error::WatchError;

/// A predicate deciding which changed paths are worth a re-scan.
///
/// Filters run on the blocking watcher thread, so they must be [`Send`],
/// [`Sync`] and `'static`.
pub trait FileFilter: Send + Sync + 'static {
    /// Returns `true` if a change to `path` should be forwarded.
    fn should_process(&self, path: &Utf8Path) -> bool;
}

/// A filter that accepts every path.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl FileFilter for AcceptAllFilter {
    #[inline]
    fn should_process(&self, _path: &Utf8Path) -> bool {
        true
    }
}

/// Accepts paths whose file name matches the file name part of any
/// discovery pattern.
///
/// Only the last component is compared. Notifications arrive with absolute,
/// OS-resolved paths while patterns are often relative, and the watched
/// directories already restrict where events come from. A same-named file in
/// another watched directory only causes a refresh that publishes nothing.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    names: SmallVec<[glob::Pattern; 4]>,
}

impl GlobFilter {
    /// Builds a filter from discovery patterns.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Pattern`] if a file name part is not a valid glob.
    pub fn new<I, S>(patterns: I) -> Result<Self, WatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                let name = Utf8Path::new(pattern).file_name().unwrap_or(pattern);
                glob::Pattern::new(name)
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { names })
    }

    /// Returns the number of distinct name patterns.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the filter has no patterns and therefore matches nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FileFilter for GlobFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.names.iter().any(|p| p.matches(name)))
    }
}
