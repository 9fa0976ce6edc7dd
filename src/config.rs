use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_OUTPUT_PREFIX: &str = "converted-";

/// Converter settings, usually read from a YAML file.
///
/// ```yaml
/// skip_resource_types: [ValueSet, StructureDefinition]
/// extension_urls:
///   Consent:
///     - source: http://example.org/r4/ext
///       target: http://example.org/stu3/ext
/// output_prefix: stu3-
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Replaces the built-in list of never-converted resource types when set
    pub skip_resource_types: Option<Vec<String>>,
    /// Extra extension URL mappings per resource type, applied after the built-ins
    pub extension_urls: BTreeMap<String, Vec<ExtensionUrlMapping>>,
    /// Prefix for output file names in directory mode
    pub output_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionUrlMapping {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            skip_resource_types: None,
            extension_urls: BTreeMap::new(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }
}

impl ConverterConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }
}
