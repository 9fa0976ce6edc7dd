use std::path::PathBuf;
use std::process;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fhir_r4_stu3::{
    batch::BatchError,
    config::ConfigError,
    reporter::ReportError,
    transform_directory, transform_file, BatchOptions, BatchReport, ConverterConfig, FhirVersion,
    ReportFormat, ResourceTransformationEngine, TransformationError, TransformationReporter,
};

#[derive(Parser, Debug)]
#[command(name = "fhir-r4-stu3")]
#[command(about = "Transform FHIR R4 resources to STU3")]
struct Args {
    /// Input JSON file or directory of JSON files
    input: PathBuf,

    /// Output file (single input) or directory
    output: PathBuf,

    /// Only convert these resource types (e.g., Consent,Encounter)
    #[arg(long, value_delimiter = ',', value_name = "TYPES")]
    resources: Option<Vec<String>>,

    /// YAML converter configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// How to print the run summary
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report_format: ReportFormat,

    /// Log every field transformation
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Input path '{0}' does not exist")]
    MissingInput(String),

    #[error("'{0}' is neither a file nor directory")]
    NotFileOrDirectory(String),

    #[error("Unsupported resource types {requested}; supported: {supported}")]
    UnsupportedFilter { requested: String, supported: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transformation(#[from] TransformationError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("\n❌ Error: {}", e);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,fhir_r4_stu3={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Returns whether the run should exit successfully
fn run(args: Args) -> Result<bool, CliError> {
    let config = match &args.config {
        Some(path) => ConverterConfig::load(path)?,
        None => ConverterConfig::default(),
    };
    let engine = ResourceTransformationEngine::from_config(&config)?;

    if let Some(requested) = &args.resources {
        validate_filter(&engine, requested)?;
    }
    let options = BatchOptions::from_config(&config).with_resource_filter(args.resources.clone());

    if !args.input.exists() {
        return Err(CliError::MissingInput(args.input.display().to_string()));
    }

    let reporter = TransformationReporter::new().with_format(args.report_format);

    if args.input.is_file() {
        println!("Transforming: {} → {}", args.input.display(), args.output.display());
        let outcome = transform_file(&engine, &args.input, &args.output, &options);
        let mut report = BatchReport::new(FhirVersion::R4, FhirVersion::Stu3);
        report.record(outcome.to_report(&args.input));
        println!("{}", reporter.format_report(&report)?);
        Ok(!outcome.is_failure())
    } else if args.input.is_dir() {
        let report = transform_directory(&engine, &args.input, &args.output, &options)?;
        if report.files.is_empty() {
            println!("No JSON files found in {}", args.input.display());
        } else {
            println!("Found {} files to transform", report.files.len());
        }
        println!("{}", reporter.format_report(&report)?);
        Ok(true)
    } else {
        Err(CliError::NotFileOrDirectory(args.input.display().to_string()))
    }
}

fn validate_filter(engine: &ResourceTransformationEngine, requested: &[String]) -> Result<(), CliError> {
    let supported = engine.registry().supported_resource_types();
    let unknown: Vec<&str> = requested
        .iter()
        .map(String::as_str)
        .filter(|resource_type| !supported.iter().any(|known| known == resource_type))
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(CliError::UnsupportedFilter {
            requested: unknown.join(", "),
            supported: supported.join(", "),
        })
    }
}
