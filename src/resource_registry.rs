use std::collections::HashMap;
use serde::Serialize;
use thiserror::Error;
use crate::{
    config::ConverterConfig,
    extension::ExtensionUrlMap,
    resources::{consent, device_use_statement, encounter, procedure},
    transformation_rule::TransformationRule,
};

/// Resource types that are never converted
pub const SKIPPED_RESOURCE_TYPES: &[&str] = &[
    "ValueSet",
    "StructureDefinition",
    "ImplementationGuide",
    "Parameters",
    "SearchParameter",
];

/// Resource types with a transformer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    Consent,
    Encounter,
    Procedure,
    DeviceUseStatement,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Consent,
        ResourceKind::Encounter,
        ResourceKind::Procedure,
        ResourceKind::DeviceUseStatement,
    ];

    pub fn resource_type(self) -> &'static str {
        match self {
            ResourceKind::Consent => "Consent",
            ResourceKind::Encounter => "Encounter",
            ResourceKind::Procedure => "Procedure",
            ResourceKind::DeviceUseStatement => "DeviceUseStatement",
        }
    }

    pub fn from_resource_type(resource_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.resource_type() == resource_type)
    }

    fn default_rules(self) -> Vec<TransformationRule> {
        match self {
            ResourceKind::Consent => consent::rules(),
            ResourceKind::Encounter => encounter::rules(),
            ResourceKind::Procedure => procedure::rules(),
            ResourceKind::DeviceUseStatement => device_use_statement::rules(),
        }
    }

    fn default_extension_urls(self) -> ExtensionUrlMap {
        match self {
            ResourceKind::Consent => ExtensionUrlMap::from_static(consent::EXTENSION_URLS),
            ResourceKind::Encounter
            | ResourceKind::Procedure
            | ResourceKind::DeviceUseStatement => ExtensionUrlMap::new(),
        }
    }

    /// Positions of Reference elements in the STU3 output
    pub fn reference_paths(self) -> &'static [&'static str] {
        match self {
            ResourceKind::Consent => consent::REFERENCE_PATHS,
            ResourceKind::Encounter => encounter::REFERENCE_PATHS,
            ResourceKind::Procedure => procedure::REFERENCE_PATHS,
            ResourceKind::DeviceUseStatement => device_use_statement::REFERENCE_PATHS,
        }
    }
}

/// Rules and tables for one resource type
#[derive(Debug, Clone)]
pub struct TransformerEntry {
    pub kind: ResourceKind,
    pub rules: Vec<TransformationRule>,
    pub extension_urls: ExtensionUrlMap,
}

impl TransformerEntry {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            rules: kind.default_rules(),
            extension_urls: kind.default_extension_urls(),
        }
    }
}

/// How the registry answers for a resource type
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    Skip,
    Transform(&'a TransformerEntry),
    Unsupported,
}

/// Registry that maps resource types to their transformers
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    skipped: Vec<String>,
    transformers: HashMap<ResourceKind, TransformerEntry>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Rule validation failed: {0}")]
    RuleValidationFailed(String),
}

impl ResourceRegistry {
    /// Registry with every built-in transformer and the default skip list
    pub fn new() -> Self {
        Self {
            skipped: SKIPPED_RESOURCE_TYPES.iter().map(|t| t.to_string()).collect(),
            transformers: ResourceKind::ALL
                .into_iter()
                .map(|kind| (kind, TransformerEntry::new(kind)))
                .collect(),
        }
    }

    /// Registry with the built-ins extended by a configuration file
    pub fn from_config(config: &ConverterConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        if let Some(skipped) = &config.skip_resource_types {
            registry.skipped = skipped.clone();
        }

        for (resource_type, mappings) in &config.extension_urls {
            for mapping in mappings {
                registry.add_extension_url(resource_type, &mapping.source, &mapping.target)?;
            }
        }

        for entry in registry.transformers.values() {
            Self::validate_rules(&entry.rules)?;
        }

        Ok(registry)
    }

    /// Append an extension URL mapping after the built-in ones
    pub fn add_extension_url(
        &mut self,
        resource_type: &str,
        source: &str,
        target: &str,
    ) -> Result<(), RegistryError> {
        if source.is_empty() || target.is_empty() {
            return Err(RegistryError::RuleValidationFailed(format!(
                "extension mapping for {resource_type} has an empty url"
            )));
        }

        let kind = ResourceKind::from_resource_type(resource_type)
            .ok_or_else(|| RegistryError::UnknownResourceType(resource_type.to_string()))?;
        let entry = self
            .transformers
            .get_mut(&kind)
            .ok_or_else(|| RegistryError::UnknownResourceType(resource_type.to_string()))?;

        entry.extension_urls.push(source, target);
        Ok(())
    }

    pub fn resolve(&self, resource_type: &str) -> Resolution<'_> {
        if self.is_skipped(resource_type) {
            return Resolution::Skip;
        }

        ResourceKind::from_resource_type(resource_type)
            .and_then(|kind| self.transformers.get(&kind))
            .map_or(Resolution::Unsupported, Resolution::Transform)
    }

    pub fn is_skipped(&self, resource_type: &str) -> bool {
        self.skipped.iter().any(|skipped| skipped == resource_type)
    }

    pub fn transformer(&self, kind: ResourceKind) -> Option<&TransformerEntry> {
        self.transformers.get(&kind)
    }

    /// Supported resource types in a stable order
    pub fn supported_resource_types(&self) -> Vec<&'static str> {
        ResourceKind::ALL
            .into_iter()
            .filter(|kind| self.transformers.contains_key(kind))
            .map(ResourceKind::resource_type)
            .collect()
    }

    /// Validate transformation rules for syntax and completeness
    fn validate_rules(rules: &[TransformationRule]) -> Result<(), RegistryError> {
        for rule in rules {
            if rule.rule_id.is_empty() {
                return Err(RegistryError::RuleValidationFailed(
                    "Rule ID cannot be empty".to_string(),
                ));
            }

            if rule.source_path.is_empty() || rule.target_path.is_empty() {
                return Err(RegistryError::RuleValidationFailed(format!(
                    "Source and target paths cannot be empty for rule {}",
                    rule.rule_id
                )));
            }
        }
        Ok(())
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
