use serde::{Deserialize, Serialize};
use crate::{schema_version::FhirVersion, transformation_engine::TransformationWarning};

/// Reporter for rendering batch reports in various formats
pub struct TransformationReporter {
    output_format: ReportFormat,
}

/// Available output formats for transformation reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Console,
    Json,
    Yaml,
}

/// Per-file outcomes of one conversion run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub source_version: FhirVersion,
    pub target_version: FhirVersion,
    pub files: Vec<FileReport>,
    pub summary: BatchSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub input: String,
    pub output: Option<String>,
    pub resource_type: Option<String>,
    pub status: FileStatus,
    pub applied_transformations: usize,
    pub warnings: Vec<TransformationWarning>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Converted,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub converted: usize,
    pub skipped: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl BatchReport {
    pub fn new(source_version: FhirVersion, target_version: FhirVersion) -> Self {
        Self {
            source_version,
            target_version,
            files: Vec::new(),
            summary: BatchSummary::default(),
        }
    }

    pub fn record(&mut self, file: FileReport) {
        self.summary.total_files += 1;
        self.summary.warnings += file.warnings.len();
        match file.status {
            FileStatus::Converted => self.summary.converted += 1,
            FileStatus::Skipped => self.summary.skipped += 1,
            FileStatus::Failed => self.summary.errors += 1,
        }
        self.files.push(file);
    }

    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new(FhirVersion::R4, FhirVersion::Stu3)
    }
}

impl TransformationReporter {
    pub fn new() -> Self {
        Self {
            output_format: ReportFormat::Console,
        }
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Format the report according to the configured output format
    pub fn format_report(&self, report: &BatchReport) -> Result<String, ReportError> {
        match self.output_format {
            ReportFormat::Console => Ok(self.format_console_report(report)),
            ReportFormat::Json => self.format_json_report(report),
            ReportFormat::Yaml => self.format_yaml_report(report),
        }
    }

    fn format_console_report(&self, report: &BatchReport) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "=== FHIR {} → {} Transformation Report ===\n\n",
            report.source_version, report.target_version
        ));

        for file in &report.files {
            let resource_type = file.resource_type.as_deref().unwrap_or("unknown");
            match file.status {
                FileStatus::Converted => {
                    output.push_str(&format!(
                        "  ✓ {} → {} ({}, {} transformations)\n",
                        file.input,
                        file.output.as_deref().unwrap_or("-"),
                        resource_type,
                        file.applied_transformations
                    ));
                }
                FileStatus::Skipped => {
                    output.push_str(&format!("  ℹ Skipped {} ({})\n", file.input, resource_type));
                }
                FileStatus::Failed => {
                    output.push_str(&format!(
                        "  ✗ Error transforming {}: {}\n",
                        file.input,
                        file.error.as_deref().unwrap_or("unknown error")
                    ));
                }
            }
            for warning in &file.warnings {
                match &warning.field_path {
                    Some(path) => output.push_str(&format!("    ⚠ {}: {}\n", path, warning.message)),
                    None => output.push_str(&format!("    ⚠ {}\n", warning.message)),
                }
            }
        }

        let summary = &report.summary;
        output.push_str(&format!(
            "\nTransformation complete: {} success, {} errors, {} skipped\n",
            summary.converted, summary.errors, summary.skipped
        ));
        if summary.warnings > 0 {
            output.push_str(&format!("Warnings: {}\n", summary.warnings));
        }

        output
    }

    fn format_json_report(&self, report: &BatchReport) -> Result<String, ReportError> {
        serde_json::to_string_pretty(report)
            .map_err(|e| ReportError::SerializationError(e.to_string()))
    }

    fn format_yaml_report(&self, report: &BatchReport) -> Result<String, ReportError> {
        serde_yaml::to_string(report)
            .map_err(|e| ReportError::SerializationError(e.to_string()))
    }
}

impl Default for TransformationReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
}
