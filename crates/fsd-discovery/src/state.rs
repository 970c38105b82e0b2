//! Per-file discovery state.
//!
//! [`FileStates`] remembers, for every currently matching file, the groups of
//! its last successful parse. A failed parse records the error but keeps those
//! groups, so a half-written or corrupted file never erases its targets. Only
//! a file that stops matching loses them.

use std::collections::BTreeMap;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

use fsd_core::{FxHashMap, TargetGroup, fx_hash_map};

use crate::error::DiscoveryError;
use crate::stats::DiscoveryStats;

/// The result of scanning and parsing every matching file once.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    /// Parse result for each currently matching file.
    pub results: BTreeMap<Utf8PathBuf, Result<Vec<TargetGroup>, DiscoveryError>>,
}

impl CycleOutcome {
    /// Returns the number of files that matched.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if no file matched.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// What is known about one matching file.
#[derive(Debug, Clone)]
pub struct FileState {
    /// The file path as produced by pattern expansion.
    pub path: Utf8PathBuf,

    /// Groups from the last successful parse; empty if none succeeded yet.
    pub last_groups: Vec<TargetGroup>,

    /// Description of the most recent failure, cleared by a successful parse.
    pub last_error: Option<String>,

    /// When the file last parsed successfully.
    pub last_success: Option<Instant>,
}

impl FileState {
    fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            last_groups: Vec::new(),
            last_error: None,
            last_success: None,
        }
    }

    /// Returns `true` if the most recent parse of this file failed.
    #[inline]
    #[must_use]
    pub fn is_failing(&self) -> bool {
        self.last_error.is_some()
    }
}

/// The state of every currently matching file.
#[derive(Debug, Default)]
pub struct FileStates {
    states: FxHashMap<Utf8PathBuf, FileState>,
}

impl FileStates {
    /// Creates an empty state table.
    #[must_use]
    pub fn new() -> Self {
        Self { states: fx_hash_map() }
    }

    /// Merges a cycle outcome into the table.
    ///
    /// Successful parses replace a file's groups, failures only record the
    /// error, and files absent from the outcome are dropped. Returns the
    /// dropped paths in lexicographic order.
    pub fn apply(&mut self, outcome: CycleOutcome, stats: &DiscoveryStats) -> Vec<Utf8PathBuf> {
        let mut removed: Vec<Utf8PathBuf> = self
            .states
            .keys()
            .filter(|path| !outcome.results.contains_key(*path))
            .cloned()
            .collect();
        removed.sort_unstable();

        for path in &removed {
            self.states.remove(path);
            debug!(path = %path, "File no longer matches");
        }

        stats.add_files_scanned(outcome.results.len() as u64);

        for (path, result) in outcome.results {
            let state = self
                .states
                .entry(path.clone())
                .or_insert_with(|| FileState::new(path));

            match result {
                Ok(groups) => {
                    if state.last_error.take().is_some() {
                        debug!(path = %state.path, "File recovered");
                    }
                    state.last_groups = groups;
                    state.last_success = Some(Instant::now());
                }
                Err(error) => {
                    if error.is_read_failure() {
                        stats.increment_read_failures();
                    } else {
                        stats.increment_decode_failures();
                    }

                    let message = error.to_string();
                    if state.last_error.as_deref() == Some(message.as_str()) {
                        debug!(path = %state.path, error = %message, "File still invalid");
                    } else {
                        warn!(
                            path = %state.path,
                            error = %message,
                            retained = state.last_groups.len(),
                            "Failed to parse target file, keeping previous groups"
                        );
                    }
                    state.last_error = Some(message);
                }
            }
        }

        removed
    }

    /// Returns the groups every file currently contributes, keyed by path.
    ///
    /// Files that never parsed successfully contribute nothing and are left
    /// out.
    #[must_use]
    pub fn candidate(&self) -> BTreeMap<Utf8PathBuf, Vec<TargetGroup>> {
        self.states
            .values()
            .filter(|state| !state.last_groups.is_empty())
            .map(|state| (state.path.clone(), state.last_groups.clone()))
            .collect()
    }

    /// Returns the state of one file.
    #[must_use]
    pub fn get(&self, path: &Utf8Path) -> Option<&FileState> {
        self.states.get(path)
    }

    /// Returns every file state in path order.
    #[must_use]
    pub fn sorted(&self) -> Vec<&FileState> {
        let mut states: Vec<_> = self.states.values().collect();
        states.sort_unstable_by(|a, b| a.path.cmp(&b.path));
        states
    }

    /// Returns the number of tracked files.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if no file is tracked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
