//! The discovery loop.
//!
//! [`Discovery`] owns all per-file state and runs as a single task. It
//! multiplexes four inputs with one `tokio::select!`:
//!
//! ```text
//!  cancellation ──────────────────────────────┐
//!  ChangeNotifier batches ──► Debouncer ──────┤
//!  fallback interval ─────────────────────────┼──► refresh cycle ──► Publisher ──► mpsc
//!  startup ───────────────────────────────────┘
//! ```
//!
//! A refresh cycle expands the patterns and parses every matching file on the
//! blocking pool, merges the results into [`FileStates`], and sends the full
//! snapshot only if some file's contribution changed.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use fsd_core::{Config, TargetGroup, WatchConfig};
use fsd_watcher::{ChangeBatch, ChangeNotifier, GlobFilter, WatchTarget};

use crate::debounce::Debouncer;
use crate::error::DiscoveryError;
use crate::parser::read_groups;
use crate::publisher::Publisher;
use crate::resolver::PathResolver;
use crate::state::{CycleOutcome, FileStates};
use crate::stats::DiscoveryStats;

/// How long shutdown waits for the change notifier to release its watches.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Lower bound for the fallback refresh interval.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// What caused a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Startup,
    Change,
    Timer,
}

/// What woke the loop up.
enum Wakeup {
    Cancelled,
    ConsumerGone,
    Batch(Option<ChangeBatch>),
    Debounced,
    Tick,
}

/// How a refresh cycle ended.
enum Refresh {
    Done(Option<Vec<TargetGroup>>),
    Cancelled,
}

/// A file-based target discovery instance.
///
/// # Examples
///
/// ```no_run
/// use fsd_core::Config;
/// use fsd_discovery::Discovery;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(config: Config) {
/// let cancel = CancellationToken::new();
/// let (mut snapshots, handle) = Discovery::new(&config).spawn(cancel.clone(), 1);
///
/// while let Some(groups) = snapshots.recv().await {
///     println!("{} target groups", groups.len());
/// }
/// # let _ = handle.await;
/// # }
/// ```
#[derive(Debug)]
pub struct Discovery {
    resolver: PathResolver,
    watch_targets: Vec<WatchTarget>,
    refresh_interval: Duration,
    watch: WatchConfig,
    states: FileStates,
    publisher: Publisher,
    stats: Arc<DiscoveryStats>,
}

impl Discovery {
    /// Creates a discovery instance for `config`.
    ///
    /// The configuration is expected to be validated already; invalid
    /// patterns surface as failed refresh cycles.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let resolver = PathResolver::new(config.discovery.files.iter().cloned());
        let watch_targets = resolver.watch_targets();
        Self {
            resolver,
            watch_targets,
            refresh_interval: config.discovery.refresh_interval().max(MIN_REFRESH_INTERVAL),
            watch: config.watch,
            states: FileStates::new(),
            publisher: Publisher::new(),
            stats: Arc::new(DiscoveryStats::new()),
        }
    }

    /// Returns the shared statistics counters.
    #[must_use]
    pub fn stats(&self) -> Arc<DiscoveryStats> {
        Arc::clone(&self.stats)
    }

    /// Returns the per-file state after the last cycle.
    #[must_use]
    pub fn file_states(&self) -> &FileStates {
        &self.states
    }

    /// Returns the last published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TargetGroup> {
        self.publisher.snapshot()
    }

    /// Runs one refresh cycle on the current thread.
    ///
    /// Returns the new snapshot if it differs from the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::PathResolution`] if a pattern could not be
    /// expanded. No state changes in that case.
    pub fn refresh_now(&mut self) -> Result<Option<Vec<TargetGroup>>, DiscoveryError> {
        let scanned = scan_files(&self.resolver);
        self.complete_cycle(scanned)
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    ///
    /// Returns the snapshot stream, holding at most `capacity` undelivered
    /// snapshots, and the task handle.
    pub fn spawn(
        self,
        cancel: CancellationToken,
        capacity: usize,
    ) -> (mpsc::Receiver<Vec<TargetGroup>>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(self.run(cancel, tx));
        (rx, handle)
    }

    /// Runs discovery until `cancel` fires or the consumer goes away.
    ///
    /// Each time the set of target groups changes, the full snapshot is sent
    /// on `tx`. The sender is dropped on return, which closes the stream. No
    /// snapshot is sent once cancellation was requested.
    pub async fn run(mut self, cancel: CancellationToken, tx: mpsc::Sender<Vec<TargetGroup>>) {
        let mut notifier = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            notifier = self.start_notifier() => notifier,
        };

        let mut debouncer = Debouncer::new(self.watch.debounce(), self.watch.max_debounce());
        let mut ticker = interval_at(Instant::now() + self.refresh_interval, self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            patterns = self.resolver.patterns().len(),
            watching = notifier.is_some(),
            refresh_interval = ?self.refresh_interval,
            "Discovery started"
        );

        let mut trigger = Some(Trigger::Startup);
        loop {
            if let Some(trigger) = trigger.take() {
                debouncer.clear();
                self.rewatch(notifier.as_ref());

                let snapshot = match self.refresh(trigger, &cancel).await {
                    Refresh::Cancelled => break,
                    Refresh::Done(snapshot) => snapshot,
                };

                if let Some(snapshot) = snapshot {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        sent = tx.send(snapshot) => {
                            if sent.is_err() {
                                debug!("Snapshot consumer went away");
                                break;
                            }
                            self.stats.increment_emissions();
                        }
                    }
                }
            }

            let wakeup = tokio::select! {
                biased;
                () = cancel.cancelled() => Wakeup::Cancelled,
                () = tx.closed() => Wakeup::ConsumerGone,
                batch = next_batch(&mut notifier) => Wakeup::Batch(batch),
                () = debouncer.wait() => Wakeup::Debounced,
                _ = ticker.tick() => Wakeup::Tick,
            };

            match wakeup {
                Wakeup::Cancelled => {
                    debug!("Discovery cancelled");
                    break;
                }
                Wakeup::ConsumerGone => {
                    debug!("Snapshot consumer went away");
                    break;
                }
                Wakeup::Batch(Some(batch)) => {
                    trace!(paths = batch.len(), first = ?batch.paths().first(), "Change signal");
                    debouncer.record(Instant::now());
                }
                Wakeup::Batch(None) => {
                    warn!("Change notifier stopped, continuing on periodic refresh only");
                    notifier = None;
                }
                Wakeup::Debounced => trigger = Some(Trigger::Change),
                Wakeup::Tick => trigger = Some(Trigger::Timer),
            }
        }

        if let Some(notifier) = notifier.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, notifier.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => warn!(error = %error, "Change notifier stopped with error"),
                Err(_) => warn!("Change notifier did not stop within the grace period"),
            }
        }

        info!(stats = ?self.stats.snapshot(), "Discovery stopped");
    }

    /// Starts the change notifier, or returns `None` to run on the timer alone.
    async fn start_notifier(&self) -> Option<ChangeNotifier> {
        if !self.watch.enabled {
            info!("Change notifications disabled, relying on periodic refresh");
            return None;
        }

        let started = match GlobFilter::new(self.resolver.patterns()) {
            Ok(filter) => ChangeNotifier::start(self.watch_targets.clone(), &self.watch, filter).await,
            Err(error) => Err(error),
        };

        match started {
            Ok(notifier) => Some(notifier),
            Err(error) => {
                let error = DiscoveryError::from(error);
                warn!(error = %error, "Continuing on periodic refresh only");
                None
            }
        }
    }

    /// Asks the notifier to subscribe to directories that could not be
    /// watched before, such as ones created or recreated since.
    fn rewatch(&self, notifier: Option<&ChangeNotifier>) {
        let Some(notifier) = notifier else {
            return;
        };
        for target in &self.watch_targets {
            if let Err(error) = notifier.watch(target.clone()) {
                debug!(error = %error, "Change notifier not accepting targets");
                return;
            }
        }
    }

    /// Runs one cycle with the file I/O on the blocking pool.
    async fn refresh(&mut self, trigger: Trigger, cancel: &CancellationToken) -> Refresh {
        debug!(trigger = ?trigger, "Refreshing");

        let resolver = self.resolver.clone();
        let scan = tokio::task::spawn_blocking(move || scan_files(&resolver));

        let joined = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("Abandoning refresh cycle");
                return Refresh::Cancelled;
            }
            joined = scan => joined,
        };

        let scanned = match joined {
            Ok(scanned) => scanned,
            Err(error) => {
                warn!(error = %error, "Refresh task failed");
                return Refresh::Done(None);
            }
        };

        match self.complete_cycle(scanned) {
            Ok(snapshot) => Refresh::Done(snapshot),
            Err(error) => {
                warn!(error = %error, "Skipping refresh cycle");
                Refresh::Done(None)
            }
        }
    }

    /// Merges a scan into the file states and offers the result for publishing.
    fn complete_cycle(
        &mut self,
        scanned: Result<CycleOutcome, DiscoveryError>,
    ) -> Result<Option<Vec<TargetGroup>>, DiscoveryError> {
        let outcome = scanned.inspect_err(|_| self.stats.increment_resolution_failures())?;
        self.stats.increment_refreshes();

        let removed = self.states.apply(outcome, &self.stats);
        if !removed.is_empty() {
            debug!(files = removed.len(), "Dropped files that no longer match");
        }

        let Some(snapshot) = self.publisher.publish(self.states.candidate()) else {
            trace!("Target groups unchanged");
            return Ok(None);
        };

        let diff = self.publisher.last_diff();
        self.stats.add_retractions(diff.retracted.len() as u64);
        info!(
            groups = snapshot.len(),
            added = diff.added.len(),
            changed = diff.changed.len(),
            retracted = diff.retracted.len(),
            "Target groups updated"
        );

        Ok(Some(snapshot))
    }
}

/// Expands the patterns and parses every matching file.
fn scan_files(resolver: &PathResolver) -> Result<CycleOutcome, DiscoveryError> {
    let resolution = resolver.resolve()?;
    if resolution.skipped > 0 {
        debug!(skipped = resolution.skipped, "Skipped unreadable matches");
    }

    let results = resolution
        .files
        .into_iter()
        .map(|path| {
            let result = read_groups(&path);
            (path, result)
        })
        .collect();

    Ok(CycleOutcome { results })
}

/// Waits for the next change batch; never completes without a notifier.
async fn next_batch(notifier: &mut Option<ChangeNotifier>) -> Option<ChangeBatch> {
    match notifier {
        Some(notifier) => notifier.recv().await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::{Utf8Path, Utf8PathBuf};
    use fsd_core::DiscoveryConfig;
    use std::fs;
    use tempfile::TempDir;

    const VALID_YML: &str = include_str!("../fixtures/valid.yml");
    const VALID_JSON: &str = include_str!("../fixtures/valid.json");
    const INVALID_NIL_YML: &str = include_str!("../fixtures/invalid_nil.yml");

    /// How long a change may take to show up.
    const CONVERGENCE: Duration = Duration::from_secs(15);

    /// How long to wait before concluding nothing will be emitted.
    const QUIET: Duration = Duration::from_secs(1);

    fn root(dir: &TempDir) -> Utf8PathBuf {
        Utf8Path::from_path(dir.path()).expect("Invalid path").to_owned()
    }

    fn config_for(dir: &Utf8Path, pattern: &str) -> Config {
        Config {
            discovery: DiscoveryConfig {
                files: vec![format!("{dir}/{pattern}")],
                refresh_interval_secs: 3600,
            },
            watch: WatchConfig {
                debounce_ms: 20,
                ..WatchConfig::default()
            },
        }
    }

    /// Writes `content` next to `path` and renames it into place, so the
    /// file never appears half-written.
    fn write_atomically(path: &Utf8Path, content: &str) {
        let tmp = Utf8PathBuf::from(format!("{path}.tmp"));
        fs::write(&tmp, content).expect("Failed to write file");
        fs::rename(&tmp, path).expect("Failed to rename file");
    }

    fn sources(groups: &[TargetGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.source.as_str()).collect()
    }

    // Synchronous cycles

    #[test]
    fn test_refresh_without_files_emits_nothing() {
        let dir = TempDir::new().unwrap();
        let mut discovery = Discovery::new(&config_for(&root(&dir), "*.yml"));

        assert_eq!(discovery.refresh_now().unwrap(), None);
        assert_eq!(discovery.stats().snapshot().refreshes, 1);
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = root(&dir).join("_test_valid.yml");
        fs::write(&path, VALID_YML).unwrap();
        let mut discovery = Discovery::new(&config_for(&root(&dir), "*.yml"));

        let snapshot = discovery.refresh_now().unwrap().expect("first cycle publishes");
        assert_eq!(sources(&snapshot), [format!("{path}:0"), format!("{path}:1")]);
        assert_eq!(snapshot[0].labels.get("foo"), Some("bar"));

        assert_eq!(discovery.refresh_now().unwrap(), None);
        assert_eq!(discovery.snapshot(), snapshot);
    }

    #[test]
    fn test_refresh_orders_by_path_and_index() {
        let dir = TempDir::new().unwrap();
        let root = root(&dir);
        fs::write(root.join("b.json"), VALID_JSON).unwrap();
        fs::write(root.join("a.json"), VALID_JSON).unwrap();
        let mut discovery = Discovery::new(&config_for(&root, "*.json"));

        let snapshot = discovery.refresh_now().unwrap().unwrap();
        let expected = [
            format!("{root}/a.json:0"),
            format!("{root}/a.json:1"),
            format!("{root}/b.json:0"),
            format!("{root}/b.json:1"),
        ];
        assert_eq!(sources(&snapshot), expected);
    }

    #[test]
    fn test_corruption_keeps_previous_groups() {
        let dir = TempDir::new().unwrap();
        let path = root(&dir).join("_test.json");
        fs::write(&path, VALID_JSON).unwrap();
        let mut discovery = Discovery::new(&config_for(&root(&dir), "*.json"));
        discovery.refresh_now().unwrap();

        write_atomically(&path, "not json at all");
        assert_eq!(discovery.refresh_now().unwrap(), None);
        assert_eq!(discovery.snapshot().len(), 2);

        let state = discovery.file_states().get(&path).unwrap();
        assert!(state.is_failing());
        assert_eq!(discovery.stats().snapshot().decode_failures, 1);

        fs::write(&path, r#"[{"targets": ["only:1"]}]"#).unwrap();
        let snapshot = discovery.refresh_now().unwrap().unwrap();
        assert_eq!(sources(&snapshot), [format!("{path}:0")]);
    }

    #[test]
    fn test_removal_retracts_groups() {
        let dir = TempDir::new().unwrap();
        let root = root(&dir);
        fs::write(root.join("a.yml"), VALID_YML).unwrap();
        fs::write(root.join("b.yml"), VALID_YML).unwrap();
        let mut discovery = Discovery::new(&config_for(&root, "*.yml"));
        discovery.refresh_now().unwrap();

        fs::rename(root.join("b.yml"), root.join("b.yml.disabled")).unwrap();
        let snapshot = discovery.refresh_now().unwrap().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|g| g.source.starts_with(&format!("{root}/a.yml:"))));

        fs::remove_file(root.join("a.yml")).unwrap();
        assert_eq!(discovery.refresh_now().unwrap(), Some(Vec::new()));
        assert_eq!(discovery.stats().snapshot().retractions, 2);
        assert!(discovery.file_states().is_empty());
    }

    #[test]
    fn test_nil_group_file_is_excluded() {
        let dir = TempDir::new().unwrap();
        fs::write(root(&dir).join("_test.yml"), INVALID_NIL_YML).unwrap();
        let mut discovery = Discovery::new(&config_for(&root(&dir), "*.yml"));

        assert_eq!(discovery.refresh_now().unwrap(), None);
        assert_eq!(discovery.file_states().len(), 1);
    }

    #[test]
    fn test_resolution_failure_skips_cycle() {
        let config = Config {
            discovery: DiscoveryConfig {
                files: vec!["sd/[.json".to_owned()],
                ..DiscoveryConfig::default()
            },
            ..Config::default()
        };
        let mut discovery = Discovery::new(&config);

        let err = discovery.refresh_now().unwrap_err();
        assert!(matches!(err, DiscoveryError::PathResolution { .. }));

        let stats = discovery.stats().snapshot();
        assert_eq!(stats.resolution_failures, 1);
        assert_eq!(stats.refreshes, 0);
    }

    // Running loop

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_idle_directory_emits_nothing() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let (mut rx, handle) = Discovery::new(&config_for(&root(&dir), "*.yml")).spawn(cancel.clone(), 1);

        assert!(tokio::time::timeout(QUIET, rx.recv()).await.is_err());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_new_yaml_file_is_discovered() {
        let dir = TempDir::new().unwrap();
        let path = root(&dir).join("_test_valid.yml");
        let cancel = CancellationToken::new();
        let (mut rx, handle) = Discovery::new(&config_for(&root(&dir), "*.yml")).spawn(cancel.clone(), 1);

        write_atomically(&path, VALID_YML);

        let snapshot = tokio::time::timeout(CONVERGENCE, rx.recv())
            .await
            .expect("no snapshot in time")
            .expect("stream closed");
        assert_eq!(sources(&snapshot), [format!("{path}:0"), format!("{path}:1")]);
        assert_eq!(snapshot[0].labels.get("foo"), Some("bar"));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_new_json_file_is_discovered() {
        let dir = TempDir::new().unwrap();
        let path = root(&dir).join("_test_valid.json");
        let cancel = CancellationToken::new();
        let (mut rx, handle) = Discovery::new(&config_for(&root(&dir), "*.json")).spawn(cancel.clone(), 1);

        write_atomically(&path, VALID_JSON);

        let snapshot = tokio::time::timeout(CONVERGENCE, rx.recv()).await.unwrap().unwrap();
        assert_eq!(sources(&snapshot), [format!("{path}:0"), format!("{path}:1")]);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_nil_group_file_never_emits() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let (mut rx, handle) = Discovery::new(&config_for(&root(&dir), "*.yml")).spawn(cancel.clone(), 1);

        write_atomically(&root(&dir).join("_test_invalid_nil.yml"), INVALID_NIL_YML);

        assert!(tokio::time::timeout(QUIET, rx.recv()).await.is_err());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_corrupted_file_is_not_erased() {
        let dir = TempDir::new().unwrap();
        let path = root(&dir).join("_test.yml");
        let cancel = CancellationToken::new();
        let (mut rx, handle) = Discovery::new(&config_for(&root(&dir), "*.yml")).spawn(cancel.clone(), 1);

        write_atomically(&path, VALID_YML);
        let snapshot = tokio::time::timeout(CONVERGENCE, rx.recv()).await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 2);

        write_atomically(&path, "\u{1}\u{2}: [[ gibberish");

        // Any further snapshot would have to drop the file's groups.
        match tokio::time::timeout(QUIET, rx.recv()).await {
            Err(_) => {}
            Ok(Some(groups)) => panic!("unexpected snapshot after corruption: {groups:?}"),
            Ok(None) => panic!("stream closed unexpectedly"),
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deleted_file_is_retracted() {
        let dir = TempDir::new().unwrap();
        let path = root(&dir).join("_test.json");
        fs::write(&path, VALID_JSON).unwrap();
        let cancel = CancellationToken::new();
        let (mut rx, handle) = Discovery::new(&config_for(&root(&dir), "*.json")).spawn(cancel.clone(), 1);

        let snapshot = tokio::time::timeout(CONVERGENCE, rx.recv()).await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 2);

        fs::remove_file(&path).unwrap();
        let snapshot = tokio::time::timeout(CONVERGENCE, rx.recv()).await.unwrap().unwrap();
        assert!(snapshot.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_periodic_refresh_without_notifications() {
        let dir = TempDir::new().unwrap();
        let path = root(&dir).join("_test.yml");
        let mut config = config_for(&root(&dir), "*.yml");
        config.watch.enabled = false;
        config.discovery.refresh_interval_secs = 1;

        let cancel = CancellationToken::new();
        let discovery = Discovery::new(&config);
        let stats = discovery.stats();
        let (mut rx, handle) = discovery.spawn(cancel.clone(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        write_atomically(&path, VALID_YML);

        let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(stats.snapshot().refreshes >= 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancellation_closes_stream() {
        let dir = TempDir::new().unwrap();
        fs::write(root(&dir).join("a.yml"), VALID_YML).unwrap();
        let cancel = CancellationToken::new();
        let (mut rx, handle) = Discovery::new(&config_for(&root(&dir), "*.yml")).spawn(cancel.clone(), 1);

        let _ = tokio::time::timeout(CONVERGENCE, rx.recv()).await.unwrap();
        cancel.cancel();

        let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert!(closed.is_none());
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_recreated_directory_is_discovered() {
        let dir = TempDir::new().unwrap();
        let sd = root(&dir).join("sd");
        fs::create_dir(&sd).unwrap();
        let cancel = CancellationToken::new();
        let (mut rx, handle) = Discovery::new(&config_for(&sd, "*.yml")).spawn(cancel.clone(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::remove_dir_all(&sd).unwrap();
        fs::create_dir(&sd).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let path = sd.join("_test_valid.yml");
        write_atomically(&path, VALID_YML);

        let snapshot = tokio::time::timeout(CONVERGENCE, rx.recv())
            .await
            .expect("no snapshot from the recreated directory")
            .expect("stream closed");
        assert_eq!(sources(&snapshot), [format!("{path}:0"), format!("{path}:1")]);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancellation_unblocks_slow_consumer() {
        let dir = TempDir::new().unwrap();
        let path = root(&dir).join("_test.yml");
        fs::write(&path, VALID_YML).unwrap();
        let cancel = CancellationToken::new();
        let discovery = Discovery::new(&config_for(&root(&dir), "*.yml"));
        let stats = discovery.stats();
        let (mut rx, handle) = discovery.spawn(cancel.clone(), 1);

        let cycles = |n: u64| {
            let stats = Arc::clone(&stats);
            tokio::time::timeout(CONVERGENCE, async move {
                while stats.snapshot().refreshes < n {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
        };

        // The startup snapshot fills the channel; nobody reads it.
        cycles(1).await.expect("startup cycle did not run");
        write_atomically(&path, "- targets: ['only:1']\n");
        cycles(2).await.expect("second cycle did not run");
        tokio::time::sleep(Duration::from_millis(100)).await;

        cancel.cancel();
        tokio::time::timeout(SHUTDOWN_GRACE + Duration::from_secs(1), handle)
            .await
            .expect("loop stayed blocked on the full channel")
            .unwrap();

        let first = rx.recv().await.expect("startup snapshot");
        assert_eq!(sources(&first), [format!("{path}:0"), format!("{path}:1")]);
        assert_eq!(rx.recv().await, None);
        assert_eq!(stats.snapshot().emissions, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_consumer_stops_loop() {
        let dir = TempDir::new().unwrap();
        let (rx, handle) =
            Discovery::new(&config_for(&root(&dir), "*.yml")).spawn(CancellationToken::new(), 1);

        drop(rx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
