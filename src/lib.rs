//! # Cow Skin Diagnosis
//!
//! Multimodal lumpy skin disease screening for cattle. A photo of the animal
//! is classified by a CNN built with the Burn framework, a free-text symptom
//! description is classified by a TF-IDF + logistic-regression pipeline, and
//! the two probability distributions are combined by fixed-weight late fusion.
//!
//! ## Modules
//!
//! - `classes`: The two diagnosis classes and per-model class alignment
//! - `inference`: Preprocessing and the predictor adapters
//! - `model`: CNN architecture and the symptom pipeline
//! - `fusion`: Weighted late fusion
//! - `artifacts`: Local model cache with fetch-if-missing
//! - `service`: Startup and per-request diagnosis
//! - `utils`: Logging, errors and formatting helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cowskin_dx::{DiagnosisRequest, DiagnosisService, ServiceConfig};
//!
//! let service = DiagnosisService::startup(&ServiceConfig::default());
//! let request = DiagnosisRequest::new("cow.jpg", std::fs::read("cow.jpg")?, "fever and nodules");
//! let report = service.diagnose(&request)?;
//! println!("{} ({})", report.fused_prediction, report.fused_confidence);
//! ```

pub mod artifacts;
pub mod backend;
pub mod classes;
pub mod config;
pub mod fusion;
pub mod inference;
pub mod model;
pub mod service;
pub mod utils;

// Re-export commonly used items for convenience
pub use artifacts::{ArtifactCache, ArtifactSource, DirectorySource};
pub use classes::{ClassAlignment, SkinClass, NUM_CLASSES};
pub use config::{ImageModelConfig, ServiceConfig};
pub use fusion::{FusedDiagnosis, FusionEngine, Verdict, IMAGE_WEIGHT, TEXT_WEIGHT};
pub use inference::{ClassDistribution, ImageTensor, Predictor, SharedPredictor};
pub use service::{DiagnosisReport, DiagnosisRequest, DiagnosisService, ServiceStatus};
pub use utils::error::{DiagnosisError, ErrorKind, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
