//! Label sets attached to target groups.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label added to every discovered group, holding the file it was read from.
pub const FILEPATH_LABEL: &str = "__meta_filepath";

/// A set of labels common to all targets in a group.
///
/// Keys are kept sorted so that two label sets with the same content compare
/// equal and serialize identically, which keeps snapshot diffs stable.
///
/// # Examples
///
/// ```
/// use fsd_core::LabelSet;
///
/// let mut labels = LabelSet::new();
/// labels.insert("job", "node");
/// labels.insert("env", "prod");
///
/// assert_eq!(labels.get("job"), Some("node"));
/// assert_eq!(labels.to_string(), r#"{env="prod", job="node"}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    /// Creates an empty label set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a label, returning the previous value for the name if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    /// Returns the value of the label with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns `true` if a label with the given name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the number of labels.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no labels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the first label name that is not a valid label name.
    #[must_use]
    pub fn first_invalid_name(&self) -> Option<&str> {
        self.0
            .keys()
            .map(String::as_str)
            .find(|name| !is_valid_label_name(name))
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value:?}")?;
        }
        f.write_str("}")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Returns `true` if `name` matches `[a-zA-Z_][a-zA-Z0-9_]*`.
///
/// # Examples
///
/// ```
/// use fsd_core::is_valid_label_name;
///
/// assert!(is_valid_label_name("job"));
/// assert!(is_valid_label_name("__meta_filepath"));
/// assert!(!is_valid_label_name("0day"));
/// assert!(!is_valid_label_name("my-label"));
/// ```
#[must_use]
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_set_is_order_independent() {
        let a: LabelSet = [("b", "2"), ("a", "1")].into_iter().collect();
        let b: LabelSet = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_label_set_insert_replaces() {
        let mut labels = LabelSet::new();
        assert_eq!(labels.insert("foo", "bar"), None);
        assert_eq!(labels.insert("foo", "baz"), Some("bar".to_owned()));
        assert_eq!(labels.get("foo"), Some("baz"));
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn test_label_set_display() {
        let labels: LabelSet = [("foo", "bar"), ("env", "a \"b\"")].into_iter().collect();
        insta::assert_snapshot!(labels.to_string(), @r#"{env="a \"b\"", foo="bar"}"#);
    }

    #[test]
    fn test_label_set_serializes_as_map() {
        let labels: LabelSet = [("foo", "bar")].into_iter().collect();
        let json = serde_json::to_string(&labels).unwrap();
        assert_eq!(json, r#"{"foo":"bar"}"#);
    }

    #[test]
    fn test_first_invalid_name() {
        let valid: LabelSet = [("foo", "1"), ("_bar", "2")].into_iter().collect();
        assert_eq!(valid.first_invalid_name(), None);

        let invalid: LabelSet = [("foo", "1"), ("bad-name", "2")].into_iter().collect();
        assert_eq!(invalid.first_invalid_name(), Some("bad-name"));
    }

    #[test]
    fn test_is_valid_label_name() {
        assert!(is_valid_label_name("a"));
        assert!(is_valid_label_name("_"));
        assert!(is_valid_label_name("job_name2"));
        assert!(!is_valid_label_name(""));
        assert!(!is_valid_label_name("1abc"));
        assert!(!is_valid_label_name("a.b"));
        assert!(!is_valid_label_name("é"));
    }
}
