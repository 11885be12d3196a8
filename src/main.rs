//! Cow Skin Diagnosis CLI
//!
//! Runs the fused image + symptom diagnosis on local files, in bulk from a
//! manifest, or reports whether the models can be loaded.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use cowskin_dx::backend::backend_name;
use cowskin_dx::utils::logging::{init_logging, LogConfig};
use cowskin_dx::utils::{format_confidence_bar, format_percentage};
use cowskin_dx::{
    DiagnosisError, DiagnosisReport, DiagnosisRequest, DiagnosisService, FusedDiagnosis,
    ServiceConfig, ServiceStatus, SkinClass,
};

/// Lumpy skin disease screening from a photo and a symptom description
#[derive(Parser, Debug)]
#[command(name = "cowskin-dx")]
#[command(version)]
#[command(about = "Multimodal lumpy skin disease diagnosis for cattle", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides --verbose
    #[arg(long, env = "COWSKIN_LOG_LEVEL")]
    log_level: Option<String>,

    /// JSON configuration file
    #[arg(short, long, env = "COWSKIN_CONFIG")]
    config: Option<PathBuf>,

    /// Local model cache directory (overrides the config file)
    #[arg(long, env = "COWSKIN_MODELS_DIR")]
    models_dir: Option<PathBuf>,

    /// Directory to fetch missing model artifacts from
    #[arg(long, env = "COWSKIN_ARTIFACT_SOURCE")]
    artifact_source: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Diagnose a single animal
    Diagnose {
        /// Path to the photo
        #[arg(short, long)]
        image: PathBuf,

        /// Free-text symptom description
        #[arg(short, long)]
        symptoms: String,

        /// Print the response record as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Diagnose every case listed in a JSON manifest
    Batch {
        /// Manifest: a list of { "image": path, "symptoms": text }
        #[arg(short, long)]
        manifest: PathBuf,

        /// Write results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report whether the models are loaded
    Status,
}

/// One manifest entry; relative image paths are resolved against the manifest
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    image: PathBuf,
    symptoms: String,
}

#[derive(Debug, Serialize)]
struct CaseError {
    kind: String,
    status: u16,
    message: String,
}

impl From<&DiagnosisError> for CaseError {
    fn from(err: &DiagnosisError) -> Self {
        Self {
            kind: err.kind().to_string(),
            status: err.status_code(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CaseResult {
    image: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<DiagnosisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<CaseError>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_options(cli.verbose, cli.log_level.as_deref());
    let _ = init_logging(&log_config);

    let config = load_config(&cli)?;
    info!("Backend: {}", backend_name());
    let service = DiagnosisService::startup(&config);

    match cli.command {
        Commands::Diagnose {
            image,
            symptoms,
            json,
        } => cmd_diagnose(&service, &image, &symptoms, json),
        Commands::Batch { manifest, output } => cmd_batch(&service, &manifest, output.as_deref()),
        Commands::Status => cmd_status(&service),
    }
}

fn load_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::default(),
    };

    if let Some(dir) = &cli.models_dir {
        config.models_dir = dir.clone();
    }
    if let Some(source) = &cli.artifact_source {
        config.artifact_source = Some(source.clone());
    }

    Ok(config)
}

fn read_request(image: &Path, symptoms: &str) -> Result<DiagnosisRequest> {
    let bytes = std::fs::read(image).with_context(|| format!("cannot read {:?}", image))?;
    let filename = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| image.display().to_string());
    Ok(DiagnosisRequest::new(filename, bytes, symptoms))
}

fn cmd_diagnose(
    service: &DiagnosisService,
    image: &Path,
    symptoms: &str,
    json: bool,
) -> Result<ExitCode> {
    let request = read_request(image, symptoms)?;

    let diagnosis = match service.diagnose_full(&request) {
        Ok(diagnosis) => diagnosis,
        Err(e) => {
            eprintln!("{} [{}] {}", "Error:".red(), e.status_code(), e);
            return Ok(ExitCode::FAILURE);
        }
    };

    if json {
        let report = DiagnosisReport::new(&request.filename, &diagnosis);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_diagnosis(&request.filename, &diagnosis);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_diagnosis(filename: &str, diagnosis: &FusedDiagnosis) {
    println!("{} {}", "Diagnosis:".cyan().bold(), filename);
    println!(
        "  Image:    {:12} {}",
        diagnosis.image.class.label(),
        format_percentage(diagnosis.image.confidence)
    );
    println!(
        "  Symptoms: {:12} {}",
        diagnosis.symptom.class.label(),
        format_percentage(diagnosis.symptom.confidence)
    );
    println!();

    let verdict = format!(
        "{} ({})",
        diagnosis.fused.class.label(),
        diagnosis.fused.confidence_display()
    );
    let verdict = if diagnosis.fused.class == SkinClass::LumpySkin {
        verdict.red().bold()
    } else {
        verdict.green().bold()
    };
    println!("  {} {}", "Fused:".bold(), verdict);

    for (class, p) in SkinClass::ALL
        .iter()
        .zip(diagnosis.fused_probabilities.probabilities())
    {
        println!("    {:12} {}", class.label(), format_confidence_bar(*p, 30));
    }
}

fn cmd_batch(
    service: &DiagnosisService,
    manifest: &Path,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let contents = std::fs::read_to_string(manifest)
        .with_context(|| format!("cannot read {:?}", manifest))?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&contents)
        .with_context(|| format!("invalid manifest {:?}", manifest))?;
    let base = manifest.parent().unwrap_or_else(|| Path::new("."));

    info!("Diagnosing {} cases from {:?}", entries.len(), manifest);

    let results: Vec<CaseResult> = entries
        .par_iter()
        .map(|entry| {
            let image = base.join(&entry.image);
            let outcome = read_request(&image, &entry.symptoms)
                .map_err(|e| DiagnosisError::InvalidInput(format!("{:#}", e)))
                .and_then(|request| service.diagnose(&request));
            match outcome {
                Ok(report) => CaseResult {
                    image,
                    report: Some(report),
                    error: None,
                },
                Err(e) => CaseResult {
                    image,
                    report: None,
                    error: Some(CaseError::from(&e)),
                },
            }
        })
        .collect();

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let json = serde_json::to_string_pretty(&results)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("cannot write {:?}", path))?;
            println!(
                "{} {} cases, {} failed, results in {}",
                "Done:".green().bold(),
                results.len(),
                failed,
                path.display()
            );
        }
        None => println!("{}", json),
    }

    if failed > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn cmd_status(service: &DiagnosisService) -> Result<ExitCode> {
    let status = service.status();
    println!("{}", serde_json::to_string_pretty(&status)?);

    match status {
        ServiceStatus::Ready { .. } => Ok(ExitCode::SUCCESS),
        ServiceStatus::Degraded { .. } => Ok(ExitCode::FAILURE),
    }
}
