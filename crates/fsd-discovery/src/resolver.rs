//! Expansion of discovery patterns into files and watch directories.
//!
//! [`PathResolver`] is re-evaluated on every refresh cycle, because files may
//! appear or disappear between cycles.
//!
//! # Examples
//!
//! ```no_run
//! use fsd_discovery::PathResolver;
//!
//! let resolver = PathResolver::new(["/etc/sd/*.json", "/etc/sd/*.yml"]);
//! let resolution = resolver.resolve()?;
//! for path in &resolution.files {
//!     println!("{path}");
//! }
//! # Ok::<(), fsd_discovery::DiscoveryError>(())
//! ```

use std::collections::BTreeSet;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use fsd_watcher::WatchTarget;
use tracing::{debug, trace};

use crate::error::DiscoveryError;

/// Characters that make a path component a glob rather than a literal.
const GLOB_META: &[char] = &['*', '?', '['];

/// The files matched by one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Every regular file matched by any pattern, in lexicographic order.
    pub files: BTreeSet<Utf8PathBuf>,

    /// Directory entries that could not be inspected during expansion.
    pub skipped: usize,
}

/// Expands glob patterns into matching files.
///
/// Matched paths are kept exactly as the pattern expands them: a relative
/// pattern yields relative paths. These paths become the prefix of every
/// group's source identifier.
#[derive(Debug, Clone)]
pub struct PathResolver {
    patterns: Vec<String>,
}

impl PathResolver {
    /// Creates a resolver for the given patterns.
    ///
    /// Patterns are not compiled here; an invalid pattern fails each
    /// [`resolve`](Self::resolve) call instead.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the configured patterns.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Expands every pattern against the filesystem.
    ///
    /// Directories, unreadable entries and non-UTF-8 paths are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::PathResolution`] for the first pattern that is
    /// not a valid glob. Nothing is resolved in that case.
    pub fn resolve(&self) -> Result<Resolution, DiscoveryError> {
        let mut resolution = Resolution::default();

        for pattern in &self.patterns {
            let paths = glob::glob(pattern).map_err(|source| DiscoveryError::PathResolution {
                pattern: pattern.clone(),
                source,
            })?;

            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(error) => {
                        debug!(pattern = %pattern, error = %error, "Skipping unreadable entry");
                        resolution.skipped += 1;
                        continue;
                    }
                };

                let Ok(path) = Utf8PathBuf::try_from(path) else {
                    debug!(pattern = %pattern, "Skipping non-UTF-8 path");
                    resolution.skipped += 1;
                    continue;
                };

                if !path.is_file() {
                    trace!(path = %path, "Skipping non-file match");
                    continue;
                }

                resolution.files.insert(path);
            }
        }

        Ok(resolution)
    }

    /// Returns the directories to watch so that new matches are noticed.
    ///
    /// For each pattern this is the longest leading run of literal
    /// components of its directory part. A pattern with wildcards in its
    /// directory part is watched recursively from that literal prefix.
    ///
    /// # Examples
    ///
    /// ```
    /// use fsd_discovery::PathResolver;
    /// use fsd_watcher::WatchTarget;
    ///
    /// let resolver = PathResolver::new(["sd/*.json", "sd/*.yml", "*.json"]);
    /// assert_eq!(
    ///     resolver.watch_targets(),
    ///     vec![WatchTarget::directory("."), WatchTarget::directory("sd")]
    /// );
    /// ```
    #[must_use]
    pub fn watch_targets(&self) -> Vec<WatchTarget> {
        let targets: BTreeSet<WatchTarget> = self
            .patterns
            .iter()
            .map(|pattern| watch_target_for(pattern))
            .collect();
        targets.into_iter().collect()
    }
}

/// Computes the directory to watch for one pattern.
fn watch_target_for(pattern: &str) -> WatchTarget {
    let dir = Utf8Path::new(pattern)
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));

    if !dir.as_str().contains(GLOB_META) {
        return WatchTarget::directory(dir);
    }

    let mut literal = Utf8PathBuf::new();
    for component in dir.components() {
        if matches!(component, Utf8Component::Normal(name) if name.contains(GLOB_META)) {
            break;
        }
        literal.push(component);
    }
    if literal.as_str().is_empty() {
        literal.push(".");
    }
    WatchTarget::recursive(literal)
}
