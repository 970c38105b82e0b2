//! Core types, configuration, and errors for file-based target discovery.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`TargetGroup`] and [`LabelSet`], the unit of discovery output
//! - Configuration structures ([`Config`], [`DiscoveryConfig`], [`WatchConfig`])
//! - [`ConfigError`] for configuration loading and validation
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use config::{Config, DiscoveryConfig, WatchConfig};
pub use error::ConfigError;
pub use hash::{FxHashMap, FxHashSet, fx_hash_map, fx_hash_set};
pub use types::{FILEPATH_LABEL, LabelSet, TargetGroup, is_valid_label_name, source_id};
