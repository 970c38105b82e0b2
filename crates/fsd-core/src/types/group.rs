//! Target groups, the unit of discovery output.

use std::fmt;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::labels::LabelSet;

/// A collection of endpoints sharing a common label set.
///
/// The `source` identifies where the group came from: the path of the file it
/// was read from and its zero-based position in that file, joined by `:`.
/// Within one published snapshot no two groups share a source.
///
/// # Memory Efficiency
///
/// Target lists are usually short, so they are stored in a [`SmallVec`] with
/// inline room for four entries.
///
/// # Examples
///
/// ```
/// use fsd_core::TargetGroup;
/// use camino::Utf8Path;
///
/// let group = TargetGroup::from_file(Utf8Path::new("targets/web.yml"), 1)
///     .with_target("10.0.0.1:9100")
///     .with_label("job", "node");
///
/// assert_eq!(group.to_string(), "targets/web.yml:1");
/// assert_eq!(group.labels.get("job"), Some("node"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    /// Source identifier, `<path>:<index>`.
    pub source: String,

    /// Endpoint identifiers in file order.
    #[serde(default)]
    pub targets: SmallVec<[String; 4]>,

    /// Labels common to all targets.
    #[serde(default)]
    pub labels: LabelSet,
}

impl TargetGroup {
    /// Creates an empty group with the given source identifier.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Creates an empty group for the `index`-th definition in `path`.
    #[must_use]
    pub fn from_file(path: &Utf8Path, index: usize) -> Self {
        Self::new(source_id(path, index))
    }

    /// Adds a target.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name, value);
        self
    }

    /// Returns `true` if the group has no targets.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl fmt::Display for TargetGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Builds the source identifier for the `index`-th group defined in `path`.
///
/// # Examples
///
/// ```
/// use fsd_core::source_id;
/// use camino::Utf8Path;
///
/// assert_eq!(source_id(Utf8Path::new("sd/a.json"), 0), "sd/a.json:0");
/// ```
#[must_use]
pub fn source_id(path: &Utf8Path, index: usize) -> String {
    format!("{path}:{index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_display_is_source() {
        let group = TargetGroup::from_file(Utf8Path::new("fixtures/_test_valid.yml"), 0);
        insta::assert_snapshot!(group.to_string(), @"fixtures/_test_valid.yml:0");
    }

    #[test]
    fn test_group_builder() {
        let group = TargetGroup::new("a.json:3")
            .with_target("localhost:9090")
            .with_target("example.org:443")
            .with_label("foo", "bar");

        assert_eq!(group.targets.as_slice(), ["localhost:9090", "example.org:443"]);
        assert_eq!(group.labels.get("foo"), Some("bar"));
        assert!(!group.is_empty());
    }

    #[test]
    fn test_group_equality_includes_targets_and_labels() {
        let a = TargetGroup::new("a.json:0").with_target("x:1");
        let b = TargetGroup::new("a.json:0").with_target("x:1");
        let c = TargetGroup::new("a.json:0").with_target("x:2");
        let d = TargetGroup::new("a.json:0").with_target("x:1").with_label("l", "v");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_group_serialization() {
        let group = TargetGroup::new("a.json:0")
            .with_target("localhost:9100")
            .with_label("foo", "bar");
        insta::assert_json_snapshot!(group, @r#"
        {
          "source": "a.json:0",
          "targets": [
            "localhost:9100"
          ],
          "labels": {
            "foo": "bar"
          }
        }
        "#);
    }

    #[test]
    fn test_group_deserialize_defaults() {
        let group: TargetGroup = serde_json::from_str(r#"{"source":"x:0"}"#).unwrap();
        assert!(group.is_empty());
        assert!(group.labels.is_empty());
    }
}
