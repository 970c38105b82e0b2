//! Directory change notifier with async delivery.
//!
//! This module provides [`ChangeNotifier`], which bridges the synchronous
//! `notify` watcher to the tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Blocking Thread (spawn_blocking)             │
//! │  ┌──────────────────┐    ┌────────────────┐    ┌────────────┐  │
//! │  │ RecommendedWatcher│ -> │ Debouncer      │ -> │ Callback   │  │
//! │  │ (notify)         │    │ (mini)         │    │            │  │
//! │  └──────────────────┘    └────────────────┘    └─────┬──────┘  │
//! │                                              Changed │         │
//! │  ┌───────────────────────────────────────────────────▼──────┐  │
//! │  │ Command loop: subscriptions, root tracking, filtering    │  │
//! │  └──────▲────────────────────────────────────────────┬──────┘  │
//! │         │ Watch / Shutdown commands                   │         │
//! └─────────┼─────────────────────────────────────────────│─────────┘
//!           │                                    try_send │
//!           │                                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                        │
//! │  ┌──────────────────┐    ┌────────────────────────┐             │
//! │  │ ChangeNotifier   │    │ mpsc::Receiver<Batch>  │ -> Discovery│
//! │  └──────────────────┘    └────────────────────────┘             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Batches are sent with `try_send`. When the channel is full the discovery
//! loop already has a change signal queued, so dropping the batch loses
//! nothing and the watcher thread never blocks on a slow loop.
//!
//! An event on a watched directory itself (deleted, renamed away, replaced)
//! invalidates the subscription: the OS watch follows the old inode. The
//! command loop drops such a subscription, subscribes again if the directory
//! is back, and always forwards the event so the discovery loop re-scans.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use smallvec::SmallVec;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use fsd_core::{FxHashMap, FxHashSet, WatchConfig, fx_hash_map, fx_hash_set};

use crate::error::WatchError;
use crate::events::ChangeBatch;
use crate::filter::FileFilter;

/// A directory to subscribe to.
///
/// Directories rather than files are watched, because the files a pattern
/// will match may not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchTarget {
    /// Directory to watch.
    pub path: Utf8PathBuf,

    /// Whether subdirectories are watched too.
    pub recursive: bool,
}

impl WatchTarget {
    /// Watch a single directory level.
    #[must_use]
    pub fn directory(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            recursive: false,
        }
    }

    /// Watch a directory and everything below it.
    #[must_use]
    pub fn recursive(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            recursive: true,
        }
    }

    const fn mode(&self) -> RecursiveMode {
        if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        }
    }
}

/// Commands to the watcher thread, from the async side and from the
/// debouncer callback.
#[derive(Debug)]
enum Command {
    Watch(WatchTarget),
    Changed(Vec<Utf8PathBuf>),
    Shutdown,
}

/// A set of directory subscriptions streaming change batches to async code.
///
/// # Lifecycle
///
/// 1. **Start**: [`ChangeNotifier::start`] spawns a blocking task owning the
///    `notify` debouncer and subscribes to every target. Targets that cannot be
///    watched (for example because the directory does not exist yet) are
///    logged and can be retried with [`watch`](Self::watch).
/// 2. **Reception**: [`recv`](Self::recv) yields one [`ChangeBatch`] per
///    debounced burst of filtered events.
/// 3. **Shutdown**: [`shutdown`](Self::shutdown) releases all subscriptions and
///    waits for the thread. Dropping the notifier sends the shutdown signal
///    without waiting.
pub struct ChangeNotifier {
    /// Commands to the blocking task. `None` once shutdown was requested.
    command_tx: Option<mpsc::UnboundedSender<Command>>,

    /// Handle to the blocking watcher task.
    task_handle: Option<JoinHandle<Result<(), WatchError>>>,

    /// Change batches for async consumption.
    event_rx: mpsc::Receiver<ChangeBatch>,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ChangeNotifier {
    /// Starts watching `targets`.
    ///
    /// Resolves once the underlying watcher exists and the initial
    /// subscriptions have been attempted.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] if the platform watcher cannot be
    /// created and [`WatchError::ChannelClosed`] if the watcher thread died
    /// before reporting.
    pub async fn start<F: FileFilter>(
        targets: Vec<WatchTarget>,
        config: &WatchConfig,
        filter: F,
    ) -> Result<Self, WatchError> {
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let window = config.debounce();
        let changes_tx = command_tx.clone();

        let task_handle = tokio::task::spawn_blocking(move || {
            run_notifier_loop(targets, window, event_tx, changes_tx, command_rx, ready_tx, filter)
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                command_tx: Some(command_tx),
                task_handle: Some(task_handle),
                event_rx,
            }),
            Ok(Err(err)) => {
                // The thread has already returned after reporting.
                let _ = task_handle.await;
                Err(err)
            }
            Err(_) => Err(WatchError::ChannelClosed),
        }
    }

    /// Subscribes to another directory, or retries one that failed.
    ///
    /// A target that is already watched is left alone unless its directory
    /// has disappeared since, in which case the stale subscription is dropped
    /// and retried.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::ChannelClosed`] if the notifier has stopped.
    pub fn watch(&self, target: WatchTarget) -> Result<(), WatchError> {
        self.command_tx
            .as_ref()
            .ok_or(WatchError::ChannelClosed)?
            .send(Command::Watch(target))
            .map_err(|_| WatchError::ChannelClosed)
    }

    /// Receives the next change batch.
    ///
    /// Returns `None` once the watcher thread has stopped.
    pub async fn recv(&mut self) -> Option<ChangeBatch> {
        self.event_rx.recv().await
    }

    /// Returns `true` while the watcher thread is alive and no shutdown was
    /// requested.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.command_tx.is_some() && self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Releases all subscriptions and waits for the watcher thread.
    ///
    /// # Errors
    ///
    /// Returns the error the watcher thread ended with, or
    /// [`WatchError::ChannelClosed`] if it panicked.
    pub async fn shutdown(mut self) -> Result<(), WatchError> {
        if let Some(tx) = self.command_tx.take() {
            // Ignore error if the thread is already gone
            let _ = tx.send(Command::Shutdown);
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => result?,
                Err(_join_error) => return Err(WatchError::ChannelClosed),
            }
        }

        Ok(())
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(Command::Shutdown);
        }
    }
}

/// Runs the notify debouncer on a blocking thread until shutdown.
///
/// The debouncer callback only converts paths and hands them to this thread,
/// which owns the subscriptions and decides what is forwarded.
#[allow(clippy::needless_pass_by_value)] // Owned for the blocking task lifetime
fn run_notifier_loop<F: FileFilter>(
    targets: Vec<WatchTarget>,
    window: Duration,
    event_tx: mpsc::Sender<ChangeBatch>,
    changes_tx: mpsc::UnboundedSender<Command>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    ready_tx: oneshot::Sender<Result<(), WatchError>>,
    filter: F,
) -> Result<(), WatchError> {
    let debouncer_result: Result<Debouncer<notify::RecommendedWatcher>, notify::Error> =
        new_debouncer(window, move |res: DebounceEventResult| match res {
            Ok(events) => {
                let paths: Vec<Utf8PathBuf> = events
                    .into_iter()
                    .filter_map(|event| match Utf8PathBuf::try_from(event.path) {
                        Ok(path) => Some(path),
                        Err(e) => {
                            trace!(
                                path = %e.into_path_buf().display(),
                                "Skipping non-UTF-8 path in change event"
                            );
                            None
                        }
                    })
                    .collect();

                if paths.is_empty() {
                    return;
                }

                if changes_tx.send(Command::Changed(paths)).is_err() {
                    trace!("Watcher thread gone, dropping change events");
                }
            }
            Err(error) => warn!(error = %error, "Debouncer error"),
        });

    let mut subscriptions = match debouncer_result {
        Ok(debouncer) => Subscriptions::new(debouncer),
        Err(error) => {
            let _ = ready_tx.send(Err(WatchError::Notify(error)));
            return Ok(());
        }
    };

    for target in targets {
        subscriptions.subscribe(target);
    }

    info!(
        watched = subscriptions.watched.len(),
        failed = subscriptions.failed.len(),
        "Change notifier started"
    );

    if ready_tx.send(Ok(())).is_err() {
        debug!("Notifier owner went away before start completed");
        return Ok(());
    }

    while let Some(command) = command_rx.blocking_recv() {
        match command {
            Command::Watch(target) => subscriptions.subscribe(target),
            Command::Changed(paths) => subscriptions.forward(paths, &filter, &event_tx),
            Command::Shutdown => break,
        }
    }

    info!(watched = subscriptions.watched.len(), "Change notifier stopped");

    Ok(())
}

/// Subscription bookkeeping owned by the watcher thread.
struct Subscriptions {
    debouncer: Debouncer<notify::RecommendedWatcher>,
    watched: FxHashSet<WatchTarget>,
    failed: FxHashSet<WatchTarget>,

    /// Watched directories keyed by every form notify may report them in
    /// (absolute as given, and fully resolved).
    roots: FxHashMap<Utf8PathBuf, WatchTarget>,
}

impl Subscriptions {
    fn new(debouncer: Debouncer<notify::RecommendedWatcher>) -> Self {
        Self {
            debouncer,
            watched: fx_hash_set(),
            failed: fx_hash_set(),
            roots: fx_hash_map(),
        }
    }

    /// Subscribes to one target unless it is already watched and its
    /// directory still exists.
    ///
    /// The first failure for a target is a warning; repeated retries of the
    /// same missing directory only log at debug level.
    fn subscribe(&mut self, target: WatchTarget) {
        if self.watched.contains(&target) {
            if target.path.is_dir() {
                return;
            }
            debug!(path = %target.path, "Watched directory disappeared");
            self.unsubscribe(&target);
        }

        match self.watch_directory(&target) {
            Ok(()) => {
                debug!(path = %target.path, recursive = target.recursive, "Watching directory");
                for key in root_keys(&target.path) {
                    self.roots.insert(key, target.clone());
                }
                self.failed.remove(&target);
                self.watched.insert(target);
            }
            Err(error) => {
                if self.failed.contains(&target) && error.is_recoverable() {
                    debug!(path = %target.path, error = %error, "Directory still not watchable");
                } else {
                    warn!(path = %target.path, error = %error, "Failed to watch directory");
                    self.failed.insert(target);
                }
            }
        }
    }

    /// Drops the subscription for `target`. The OS watch may already be gone
    /// together with the directory.
    fn unsubscribe(&mut self, target: &WatchTarget) {
        if let Err(error) = self.debouncer.watcher().unwatch(target.path.as_std_path()) {
            trace!(path = %target.path, error = %error, "Watch already released");
        }
        self.watched.remove(target);
        self.roots.retain(|_, root| *root != *target);
    }

    fn watch_directory(&mut self, target: &WatchTarget) -> Result<(), WatchError> {
        let path: &Utf8Path = &target.path;
        if !path.is_dir() {
            return Err(WatchError::path_not_found(path));
        }
        self.debouncer.watcher().watch(path.as_std_path(), target.mode())?;
        Ok(())
    }

    /// Forwards the relevant part of a burst of events.
    ///
    /// Events on a watched directory itself always pass the filter and renew
    /// that subscription, since the directory may have been replaced.
    fn forward<F: FileFilter>(
        &mut self,
        paths: Vec<Utf8PathBuf>,
        filter: &F,
        tx: &mpsc::Sender<ChangeBatch>,
    ) {
        let mut touched: SmallVec<[WatchTarget; 2]> = SmallVec::new();
        let batch: ChangeBatch = paths
            .into_iter()
            .filter(|path| {
                if let Some(target) = self.roots.get(path) {
                    touched.push(target.clone());
                    return true;
                }
                let keep = filter.should_process(path);
                if !keep {
                    trace!(path = %path, "Filtered out change event");
                }
                keep
            })
            .collect();

        touched.sort_unstable();
        touched.dedup();
        for target in touched {
            debug!(path = %target.path, "Watched directory changed, subscribing again");
            self.unsubscribe(&target);
            self.subscribe(target);
        }

        if batch.is_empty() {
            return;
        }

        match tx.try_send(batch) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!("Change signal already pending, coalescing batch");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Change channel closed, dropping batch");
            }
        }
    }
}

/// The paths under which events on the directory `path` itself are reported.
fn root_keys(path: &Utf8Path) -> SmallVec<[Utf8PathBuf; 2]> {
    let mut keys = SmallVec::new();
    if let Some(absolute) = std::path::absolute(path)
        .ok()
        .and_then(|p| Utf8PathBuf::try_from(p).ok())
    {
        keys.push(absolute);
    }
    if let Ok(resolved) = path.canonicalize_utf8() {
        if !keys.contains(&resolved) {
            keys.push(resolved);
        }
    }
    keys
}
