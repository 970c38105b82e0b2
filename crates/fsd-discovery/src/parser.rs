//! Decoding and validation of target group files.
//!
//! A target file holds a list of group definitions, each with an optional
//! `targets` list and an optional `labels` map:
//!
//! ```yaml
//! - targets: ['localhost:9090', 'example.org:443']
//!   labels:
//!     foo: bar
//! - targets: ['my.domain']
//! ```
//!
//! The format is chosen by file extension. Every returned group carries the
//! [`FILEPATH_LABEL`] label and a `<path>:<index>` source.

use camino::Utf8Path;
use serde::Deserialize;
use tracing::trace;

use fsd_core::{FILEPATH_LABEL, LabelSet, TargetGroup, source_id};

use crate::error::{DecodeError, DiscoveryError};

/// Target file encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// `.json`
    Json,
    /// `.yml` or `.yaml`
    Yaml,
}

impl Format {
    /// Determines the format from a path's extension, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedExtension`] for any other extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use fsd_discovery::parser::Format;
    /// use camino::Utf8Path;
    ///
    /// assert_eq!(Format::from_path(Utf8Path::new("a.YML")).ok(), Some(Format::Yaml));
    /// assert!(Format::from_path(Utf8Path::new("a.toml")).is_err());
    /// ```
    pub fn from_path(path: &Utf8Path) -> Result<Self, DecodeError> {
        let ext = path.extension().unwrap_or_default();
        match ext.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yml" | "yaml" => Ok(Self::Yaml),
            _ => Err(DecodeError::UnsupportedExtension(ext.to_owned())),
        }
    }
}

/// One group as written in a JSON target file. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct GroupDefinition {
    #[serde(default)]
    targets: Vec<String>,
    #[serde(default)]
    labels: LabelSet,
}

/// One group as written in a YAML target file. Unknown fields are an error,
/// so a misspelled `targets` key is reported instead of silently dropped.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictGroupDefinition {
    #[serde(default)]
    targets: Vec<String>,
    #[serde(default)]
    labels: LabelSet,
}

impl From<StrictGroupDefinition> for GroupDefinition {
    fn from(definition: StrictGroupDefinition) -> Self {
        Self {
            targets: definition.targets,
            labels: definition.labels,
        }
    }
}

/// The whole document. `null` items and a `null` document are kept visible
/// so they can be reported precisely.
type Document<G = GroupDefinition> = Option<Vec<Option<G>>>;

/// Reads and parses the target file at `path`.
///
/// # Errors
///
/// Returns [`DiscoveryError::Read`] if the file cannot be read, otherwise
/// whatever [`parse_groups`] returns.
pub fn read_groups(path: &Utf8Path) -> Result<Vec<TargetGroup>, DiscoveryError> {
    let content = std::fs::read(path).map_err(|e| DiscoveryError::read(path, e))?;
    parse_groups(path, &content)
}

/// Parses target file content read from `path`.
///
/// The groups are returned in file order with sources `<path>:0`,
/// `<path>:1`, and so on.
///
/// # Errors
///
/// - [`DiscoveryError::Decode`] for malformed content, an unknown extension,
///   or an unknown group field in YAML
/// - [`DiscoveryError::Empty`] for a `null` document or an empty list
/// - [`DiscoveryError::NilGroup`] for a `null` item in the list
/// - [`DiscoveryError::Invalid`] for an invalid label name or an empty target
///
/// # Examples
///
/// ```
/// use fsd_discovery::parser::parse_groups;
/// use camino::Utf8Path;
///
/// let groups = parse_groups(
///     Utf8Path::new("sd/web.json"),
///     br#"[{"targets": ["10.0.0.1:80"], "labels": {"job": "web"}}]"#,
/// )?;
/// assert_eq!(groups[0].source, "sd/web.json:0");
/// assert_eq!(groups[0].labels.get("job"), Some("web"));
/// # Ok::<(), fsd_discovery::DiscoveryError>(())
/// ```
pub fn parse_groups(path: &Utf8Path, content: &[u8]) -> Result<Vec<TargetGroup>, DiscoveryError> {
    let format = Format::from_path(path).map_err(|e| DiscoveryError::decode(path, e))?;

    let document: Document = match format {
        Format::Json => serde_json::from_slice(content).map_err(|e| DiscoveryError::decode(path, e))?,
        Format::Yaml => {
            let strict: Document<StrictGroupDefinition> =
                serde_yaml::from_slice(content).map_err(|e| DiscoveryError::decode(path, e))?;
            strict.map(|items| {
                items.into_iter().map(|item| item.map(GroupDefinition::from)).collect()
            })
        }
    };

    let definitions = match document {
        Some(definitions) if !definitions.is_empty() => definitions,
        _ => return Err(DiscoveryError::empty(path)),
    };

    let groups = definitions
        .into_iter()
        .enumerate()
        .map(|(index, definition)| {
            let definition = definition.ok_or_else(|| DiscoveryError::NilGroup {
                path: path.to_owned(),
                index,
            })?;
            build_group(path, index, definition)
        })
        .collect::<Result<Vec<_>, _>>()?;

    trace!(path = %path, groups = groups.len(), "Parsed target file");
    Ok(groups)
}

fn build_group(
    path: &Utf8Path,
    index: usize,
    definition: GroupDefinition,
) -> Result<TargetGroup, DiscoveryError> {
    let GroupDefinition { targets, mut labels } = definition;

    if let Some(name) = labels.first_invalid_name() {
        return Err(DiscoveryError::invalid(
            path,
            index,
            format!("'{name}' is not a valid label name"),
        ));
    }
    if let Some(position) = targets.iter().position(|t| t.trim().is_empty()) {
        return Err(DiscoveryError::invalid(
            path,
            index,
            format!("target {position} is empty"),
        ));
    }

    labels.insert(FILEPATH_LABEL, path.as_str());

    Ok(TargetGroup {
        source: source_id(path, index),
        targets: targets.into(),
        labels,
    })
}
