//! Directory change notifications with debouncing and async delivery.
//!
//! This crate subscribes to filesystem change events through the `notify`
//! crate, debounces them with `notify-debouncer-mini`, and hands them to a
//! tokio task as untyped "something changed" batches.
//!
//! # Overview
//!
//! - Watch directories, not files: target files may not exist yet
//! - Collapse create, write, rename, remove and attribute changes into one
//!   kind of signal
//! - Drop events for paths no discovery pattern could match
//! - Never block the OS notification thread on a slow consumer
//!
//! # Crate Dependencies
//!
//! ```text
//! fsd-cli ──► fsd-discovery ──► fsd-watcher ──► fsd-core
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use fsd_watcher::{ChangeNotifier, GlobFilter, WatchTarget};
//! use fsd_core::WatchConfig;
//!
//! # async fn example() -> Result<(), fsd_watcher::WatchError> {
//! let filter = GlobFilter::new(["/etc/sd/*.json"])?;
//! let targets = vec![WatchTarget::directory("/etc/sd")];
//! let mut notifier = ChangeNotifier::start(targets, &WatchConfig::default(), filter).await?;
//!
//! while let Some(batch) = notifier.recv().await {
//!     println!("{} paths changed", batch.len());
//! }
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod watcher;

pub use error::WatchError;
pub use events::ChangeBatch;
pub use filter::{AcceptAllFilter, FileFilter, GlobFilter};
pub use watcher::{ChangeNotifier, WatchTarget};
