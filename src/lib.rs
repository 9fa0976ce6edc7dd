// FHIR R4 to STU3 resource transformation
pub mod schema_version;
pub mod transformation_rule;
pub mod coding;
pub mod reference;
pub mod extension;
pub mod provision;
pub mod resources;
pub mod resource_registry;
pub mod transformation_engine;
pub mod config;
pub mod reporter;
pub mod batch;

// Re-export core types for convenience
pub use schema_version::FhirVersion;
pub use transformation_rule::{TransformationRule, TransformationType, AppliedTransformation};
pub use resource_registry::{ResourceKind, ResourceRegistry};
pub use transformation_engine::{
    ResourceTransformationEngine, TransformOutcome, TransformationError, TransformationResult,
    TransformationWarning,
};
pub use config::ConverterConfig;
pub use reporter::{BatchReport, ReportFormat, TransformationReporter};
pub use batch::{transform_directory, transform_file, BatchOptions, FileOutcome};
