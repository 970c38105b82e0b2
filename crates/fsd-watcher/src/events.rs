//! Change batches delivered by the notifier.
//!
//! A batch only says that something changed below a watched directory. The
//! discovery loop re-reads every matching file on each refresh, so the paths
//! are informational and used for logging.

use camino::Utf8PathBuf;
use smallvec::SmallVec;

/// The paths touched by one debounced burst of filesystem activity.
///
/// Paths are sorted and deduplicated. Create, write, rename, remove and
/// attribute changes are not told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    paths: SmallVec<[Utf8PathBuf; 8]>,
}

impl ChangeBatch {
    /// Returns the number of distinct changed paths.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns `true` if no path changed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Returns the changed paths in sorted order.
    #[inline]
    #[must_use]
    pub fn paths(&self) -> &[Utf8PathBuf] {
        &self.paths
    }
}

impl FromIterator<Utf8PathBuf> for ChangeBatch {
    fn from_iter<I: IntoIterator<Item = Utf8PathBuf>>(iter: I) -> Self {
        let mut paths: SmallVec<[Utf8PathBuf; 8]> = iter.into_iter().collect();
        paths.sort_unstable();
        paths.dedup();
        Self { paths }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_sorts_and_dedups() {
        let batch: ChangeBatch = ["sd/b.yml", "sd/a.yml", "sd/b.yml"]
            .into_iter()
            .map(Utf8PathBuf::from)
            .collect();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.paths(), [Utf8PathBuf::from("sd/a.yml"), Utf8PathBuf::from("sd/b.yml")]);
    }

    #[test]
    fn test_empty_batch() {
        let batch: ChangeBatch = std::iter::empty().collect();
        assert!(batch.is_empty());
    }
}
