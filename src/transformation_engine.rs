use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use crate::{
    config::ConverterConfig,
    resource_registry::{RegistryError, Resolution, ResourceRegistry},
    resources,
    schema_version::FhirVersion,
    transformation_rule::AppliedTransformation,
};

/// Main transformation engine that dispatches each resource to its transformer
#[derive(Debug, Clone)]
pub struct ResourceTransformationEngine {
    registry: ResourceRegistry,
}

/// What the engine made of one input document
#[derive(Debug, Clone)]
pub enum TransformOutcome {
    Converted(TransformationResult),
    /// The resource type is never converted; no output is produced
    Skipped { resource_type: String },
}

/// Result of a transformation operation
#[derive(Debug, Clone)]
pub struct TransformationResult {
    pub transformed_resource: Value,
    pub resource_type: String,
    pub applied_transformations: Vec<AppliedTransformation>,
    pub warnings: Vec<TransformationWarning>,
    pub source_version: FhirVersion,
    pub target_version: FhirVersion,
}

/// Warning generated during transformation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformationWarning {
    pub message: String,
    pub field_path: Option<String>,
    pub warning_type: TransformationWarningType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransformationWarningType {
    /// A present field was not carried over because a rule condition did not hold
    ConditionalSkipped,
    /// A source element has no target counterpart and was dropped
    ValueNotTransformed,
}

/// Errors that can occur during transformation
#[derive(Debug, Error)]
pub enum TransformationError {
    #[error("Resource is not a JSON object")]
    NotAnObject,

    #[error("Resource has no resourceType")]
    MissingResourceType,

    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("Malformed {field}: {reason}")]
    MalformedField { field: String, reason: String },

    #[error("Resource registry error: {0}")]
    RegistryError(String),
}

impl TransformationError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TransformationError::MalformedField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<RegistryError> for TransformationError {
    fn from(err: RegistryError) -> Self {
        TransformationError::RegistryError(err.to_string())
    }
}

impl ResourceTransformationEngine {
    pub fn new(registry: ResourceRegistry) -> Self {
        Self { registry }
    }

    pub fn from_config(config: &ConverterConfig) -> Result<Self, TransformationError> {
        Ok(Self::new(ResourceRegistry::from_config(config)?))
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Transform an R4 resource to STU3
    pub fn transform(&self, resource: &Value) -> Result<TransformOutcome, TransformationError> {
        let source = resource.as_object().ok_or(TransformationError::NotAnObject)?;
        let resource_type = source
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or(TransformationError::MissingResourceType)?;

        let entry = match self.registry.resolve(resource_type) {
            Resolution::Skip => {
                tracing::info!(resource_type, "resource type is never converted, skipping");
                return Ok(TransformOutcome::Skipped {
                    resource_type: resource_type.to_string(),
                });
            }
            Resolution::Unsupported => {
                tracing::warn!(resource_type, "no transformer registered");
                return Err(TransformationError::UnsupportedResourceType(
                    resource_type.to_string(),
                ));
            }
            Resolution::Transform(entry) => entry,
        };

        let id = source.get("id").and_then(Value::as_str).unwrap_or("unknown");
        tracing::info!(resource_type, id, "transforming resource");

        let output = resources::transform(entry, source)?;

        tracing::debug!(
            resource_type,
            id,
            applied = output.applied.len(),
            warnings = output.warnings.len(),
            "completed transformation"
        );

        Ok(TransformOutcome::Converted(TransformationResult {
            transformed_resource: Value::Object(output.resource),
            resource_type: resource_type.to_string(),
            applied_transformations: output.applied,
            warnings: output.warnings,
            source_version: FhirVersion::R4,
            target_version: FhirVersion::Stu3,
        }))
    }
}

impl Default for ResourceTransformationEngine {
    fn default() -> Self {
        Self::new(ResourceRegistry::new())
    }
}

impl TransformOutcome {
    pub fn converted(&self) -> Option<&TransformationResult> {
        match self {
            TransformOutcome::Converted(result) => Some(result),
            TransformOutcome::Skipped { .. } => None,
        }
    }

    pub fn into_resource(self) -> Option<Value> {
        match self {
            TransformOutcome::Converted(result) => Some(result.transformed_resource),
            TransformOutcome::Skipped { .. } => None,
        }
    }
}

impl TransformationWarning {
    pub fn new(message: String, warning_type: TransformationWarningType) -> Self {
        Self {
            message,
            field_path: None,
            warning_type,
        }
    }

    pub fn with_field_path(mut self, field_path: String) -> Self {
        self.field_path = Some(field_path);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_skipped_resource_types() {
        let engine = ResourceTransformationEngine::default();

        for resource_type in ["ValueSet", "StructureDefinition", "ImplementationGuide", "Parameters", "SearchParameter"] {
            let outcome = engine
                .transform(&json!({"resourceType": resource_type, "id": "x"}))
                .unwrap();
            assert!(
                matches!(outcome, TransformOutcome::Skipped { resource_type: ref t } if t == resource_type)
            );
        }
    }

    #[test]
    fn test_unsupported_resource_type() {
        let engine = ResourceTransformationEngine::default();

        let err = engine
            .transform(&json!({"resourceType": "Observation"}))
            .unwrap_err();

        assert!(matches!(err, TransformationError::UnsupportedResourceType(ref t) if t == "Observation"));
        assert_eq!(err.to_string(), "Unsupported resource type: Observation");
    }

    #[test]
    fn test_missing_discriminator_and_non_object() {
        let engine = ResourceTransformationEngine::default();

        assert!(matches!(
            engine.transform(&json!({"id": "1"})),
            Err(TransformationError::MissingResourceType)
        ));
        assert!(matches!(
            engine.transform(&json!([1, 2])),
            Err(TransformationError::NotAnObject)
        ));
    }

    #[test]
    fn test_converted_result_carries_versions() {
        let engine = ResourceTransformationEngine::default();

        let outcome = engine
            .transform(&json!({"resourceType": "Encounter", "id": "e1", "status": "finished"}))
            .unwrap();
        let result = outcome.converted().unwrap();

        assert_eq!(result.resource_type, "Encounter");
        assert_eq!(result.source_version, FhirVersion::R4);
        assert_eq!(result.target_version, FhirVersion::Stu3);
        assert_eq!(
            result.transformed_resource,
            json!({"resourceType": "Encounter", "id": "e1", "status": "finished"})
        );
    }

    #[test]
    fn test_transformation_warning_creation() {
        let warning = TransformationWarning::new(
            "Test warning".to_string(),
            TransformationWarningType::ConditionalSkipped,
        )
        .with_field_path("statusReason".to_string());

        assert_eq!(warning.message, "Test warning");
        assert_eq!(warning.field_path, Some("statusReason".to_string()));
    }
}
