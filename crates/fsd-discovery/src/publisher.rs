//! Change detection between published snapshots.
//!
//! The [`Publisher`] remembers what the consumer last received and only
//! releases a new snapshot when a file's contribution was added, changed or
//! retracted. Re-parsing unchanged files therefore produces no output.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;

use fsd_core::TargetGroup;

/// Per-path differences between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Paths that contribute groups for the first time.
    pub added: Vec<Utf8PathBuf>,
    /// Paths whose groups differ from the last snapshot.
    pub changed: Vec<Utf8PathBuf>,
    /// Paths that no longer contribute groups.
    pub retracted: Vec<Utf8PathBuf>,
}

impl Diff {
    /// Computes the difference from `previous` to `next`.
    #[must_use]
    pub fn between(
        previous: &BTreeMap<Utf8PathBuf, Vec<TargetGroup>>,
        next: &BTreeMap<Utf8PathBuf, Vec<TargetGroup>>,
    ) -> Self {
        let mut diff = Self::default();

        for (path, groups) in next {
            match previous.get(path) {
                None => diff.added.push(path.clone()),
                Some(old) if old != groups => diff.changed.push(path.clone()),
                Some(_) => {}
            }
        }
        diff.retracted = previous
            .keys()
            .filter(|path| !next.contains_key(*path))
            .cloned()
            .collect();

        diff
    }

    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.retracted.is_empty()
    }
}

/// Tracks the last published snapshot and decides when to publish again.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use camino::{Utf8Path, Utf8PathBuf};
/// use fsd_core::TargetGroup;
/// use fsd_discovery::Publisher;
///
/// let mut publisher = Publisher::new();
/// let mut candidate = BTreeMap::new();
/// candidate.insert(
///     Utf8PathBuf::from("a.json"),
///     vec![TargetGroup::from_file(Utf8Path::new("a.json"), 0).with_target("x:1")],
/// );
///
/// assert!(publisher.publish(candidate.clone()).is_some());
/// assert!(publisher.publish(candidate).is_none());
/// ```
#[derive(Debug, Default)]
pub struct Publisher {
    published: BTreeMap<Utf8PathBuf, Vec<TargetGroup>>,
    last_diff: Diff,
}

impl Publisher {
    /// Creates a publisher that has published nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a candidate snapshot.
    ///
    /// Returns the full snapshot, ordered by path and then by index, if it
    /// differs from the last one; otherwise `None`. An all-empty candidate
    /// after an empty history is not a change.
    pub fn publish(
        &mut self,
        candidate: BTreeMap<Utf8PathBuf, Vec<TargetGroup>>,
    ) -> Option<Vec<TargetGroup>> {
        let diff = Diff::between(&self.published, &candidate);
        if diff.is_empty() {
            return None;
        }

        self.published = candidate;
        self.last_diff = diff;
        Some(self.snapshot())
    }

    /// Returns the last published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TargetGroup> {
        self.published.values().flatten().cloned().collect()
    }

    /// Returns the diff that produced the last published snapshot.
    #[must_use]
    pub fn last_diff(&self) -> &Diff {
        &self.last_diff
    }
}
