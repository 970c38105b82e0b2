//! File-based target discovery engine.
//!
//! Operators list target groups in JSON or YAML files; this crate keeps a
//! consumer informed of the current set of groups across all files matching a
//! set of glob patterns.
//!
//! # Overview
//!
//! The main entry point is [`Discovery`], which combines:
//!
//! - [`PathResolver`]: Glob expansion into matching files and watch directories
//! - [`ChangeNotifier`](fsd_watcher::ChangeNotifier): Directory change signals
//! - [`Debouncer`]: Coalescing bursts of signals into one refresh
//! - [`parser`]: Decoding and validation of target files
//! - [`FileStates`]: Last valid groups per file, kept across parse failures
//! - [`Publisher`]: Emitting a snapshot only when something changed
//! - [`DiscoveryStats`]: Atomic counters for observability
//!
//! # Guarantees
//!
//! - A file that becomes unreadable or malformed keeps its last valid groups
//! - A file that is deleted or stops matching has its groups retracted
//! - Re-reading unchanged files emits nothing
//! - Snapshots are ordered by path, then by position in the file
//!
//! # Example
//!
//! ```no_run
//! use fsd_core::{Config, DiscoveryConfig};
//! use fsd_discovery::Discovery;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let config = Config {
//!     discovery: DiscoveryConfig {
//!         files: vec!["/etc/sd/*.yml".to_owned()],
//!         ..DiscoveryConfig::default()
//!     },
//!     ..Config::default()
//! };
//!
//! let cancel = CancellationToken::new();
//! let (mut snapshots, handle) = Discovery::new(&config).spawn(cancel.clone(), 1);
//!
//! if let Some(groups) = snapshots.recv().await {
//!     for group in &groups {
//!         println!("{group}: {:?}", group.targets);
//!     }
//! }
//!
//! cancel.cancel();
//! let _ = handle.await;
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod debounce;
pub mod discovery;
pub mod error;
pub mod parser;
pub mod publisher;
pub mod resolver;
pub mod state;
pub mod stats;

pub use debounce::Debouncer;
pub use discovery::Discovery;
pub use error::{DecodeError, DiscoveryError};
pub use parser::{Format, parse_groups, read_groups};
pub use publisher::{Diff, Publisher};
pub use resolver::{PathResolver, Resolution};
pub use state::{CycleOutcome, FileState, FileStates};
pub use stats::{DiscoveryStats, StatsSnapshot};
