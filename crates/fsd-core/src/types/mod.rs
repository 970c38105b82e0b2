//! Domain types for target discovery.
//!
//! - [`group`] - Target groups and their source identifiers
//! - [`labels`] - Label sets shared by all targets of a group
//!
//! All public types are re-exported here and at the crate root:
//!
//! ```
//! use fsd_core::{LabelSet, TargetGroup};
//! ```

mod group;
mod labels;

pub use group::{TargetGroup, source_id};
pub use labels::{FILEPATH_LABEL, LabelSet, is_valid_label_name};
