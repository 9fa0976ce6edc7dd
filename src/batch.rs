//! File and directory conversion on top of [`ResourceTransformationEngine`].
//!
//! A directory run never stops at the first bad document: every `*.json`
//! file gets a [`FileReport`] and failures are counted, not propagated.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use serde_json::Value;
use thiserror::Error;

use crate::{
    config::{ConverterConfig, DEFAULT_OUTPUT_PREFIX},
    reporter::{BatchReport, FileReport, FileStatus},
    schema_version::FhirVersion,
    transformation_engine::{
        ResourceTransformationEngine, TransformOutcome, TransformationError, TransformationResult,
    },
};

/// What happened to one input file
#[derive(Debug)]
pub enum FileOutcome {
    Converted {
        output: PathBuf,
        result: TransformationResult,
    },
    /// Never-converted type, or filtered out
    Skipped { resource_type: String },
    Failed(BatchError),
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Transformation(#[from] TransformationError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to list directory {path}: {source}")]
    ListDirectory {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Settings for directory runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub output_prefix: String,
    /// Only these resource types are converted when set
    pub resource_filter: Option<Vec<String>>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            resource_filter: None,
        }
    }
}

impl BatchOptions {
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            output_prefix: config.output_prefix.clone(),
            resource_filter: None,
        }
    }

    pub fn with_resource_filter(mut self, resource_filter: Option<Vec<String>>) -> Self {
        self.resource_filter = resource_filter;
        self
    }

    fn accepts(&self, resource_type: &str) -> bool {
        self.resource_filter
            .as_ref()
            .map_or(true, |types| types.iter().any(|t| t == resource_type))
    }
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FileOutcome::Failed(_))
    }

    /// Summarize this outcome for the batch report
    pub fn to_report(&self, input: &Path) -> FileReport {
        let input = input.display().to_string();
        match self {
            FileOutcome::Converted { output, result } => FileReport {
                input,
                output: Some(output.display().to_string()),
                resource_type: Some(result.resource_type.clone()),
                status: FileStatus::Converted,
                applied_transformations: result.applied_transformations.len(),
                warnings: result.warnings.clone(),
                error: None,
            },
            FileOutcome::Skipped { resource_type } => FileReport {
                input,
                output: None,
                resource_type: Some(resource_type.clone()),
                status: FileStatus::Skipped,
                applied_transformations: 0,
                warnings: Vec::new(),
                error: None,
            },
            FileOutcome::Failed(err) => FileReport {
                input,
                output: None,
                resource_type: None,
                status: FileStatus::Failed,
                applied_transformations: 0,
                warnings: Vec::new(),
                error: Some(err.to_string()),
            },
        }
    }
}

/// Convert one JSON file. Parent directories of `output` are created.
pub fn transform_file(
    engine: &ResourceTransformationEngine,
    input: &Path,
    output: &Path,
    options: &BatchOptions,
) -> FileOutcome {
    match convert(engine, input, output, options) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(input = %input.display(), error = %err, "conversion failed");
            FileOutcome::Failed(err)
        }
    }
}

fn convert(
    engine: &ResourceTransformationEngine,
    input: &Path,
    output: &Path,
    options: &BatchOptions,
) -> Result<FileOutcome, BatchError> {
    let contents = fs::read_to_string(input).map_err(|source| BatchError::Read {
        path: input.display().to_string(),
        source,
    })?;
    let resource: Value = serde_json::from_str(&contents).map_err(|source| BatchError::Parse {
        path: input.display().to_string(),
        source,
    })?;

    if let Some(resource_type) = resource.get("resourceType").and_then(Value::as_str) {
        if !options.accepts(resource_type) {
            tracing::info!(input = %input.display(), resource_type, "filtered out");
            return Ok(FileOutcome::Skipped {
                resource_type: resource_type.to_string(),
            });
        }
    }

    let result = match engine.transform(&resource)? {
        TransformOutcome::Converted(result) => result,
        TransformOutcome::Skipped { resource_type } => {
            return Ok(FileOutcome::Skipped { resource_type });
        }
    };

    write_resource(output, &result.transformed_resource)?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        resource_type = %result.resource_type,
        "converted"
    );

    Ok(FileOutcome::Converted {
        output: output.to_path_buf(),
        result,
    })
}

fn write_resource(output: &Path, resource: &Value) -> Result<(), BatchError> {
    let write_error = |source| BatchError::Write {
        path: output.display().to_string(),
        source,
    };

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }

    let mut json = serde_json::to_string_pretty(resource).map_err(|source| BatchError::Serialize {
        path: output.display().to_string(),
        source,
    })?;
    json.push('\n');
    fs::write(output, json).map_err(write_error)
}

/// Convert every `*.json` file directly under `input_dir`, in name order.
///
/// Outputs are written to `output_dir/<prefix><file name>`. Only an unreadable
/// `input_dir` is an error; per-file failures are recorded in the report.
pub fn transform_directory(
    engine: &ResourceTransformationEngine,
    input_dir: &Path,
    output_dir: &Path,
    options: &BatchOptions,
) -> Result<BatchReport, BatchError> {
    let inputs = json_files(input_dir)?;
    tracing::info!(count = inputs.len(), dir = %input_dir.display(), "found files to transform");

    let mut report = BatchReport::new(FhirVersion::R4, FhirVersion::Stu3);
    for input in inputs {
        let output = output_path(output_dir, &options.output_prefix, &input);
        let outcome = transform_file(engine, &input, &output, options);
        report.record(outcome.to_report(&input));
    }

    Ok(report)
}

/// `output_dir/<prefix><file name>`, built on `OsStr` so non-UTF-8 names survive
fn output_path(output_dir: &Path, prefix: &str, input: &Path) -> PathBuf {
    let mut name = OsString::from(prefix);
    if let Some(file_name) = input.file_name() {
        name.push(file_name);
    }
    output_dir.join(name)
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let list_error = |source| BatchError::ListDirectory {
        path: dir.display().to_string(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_error)? {
        let path = entry.map_err(list_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
