//! Error Handling Module
//!
//! Defines the error type shared by the predictors, the fusion engine and the
//! diagnosis service. Uses thiserror for ergonomic error definitions.
//!
//! Every variant collapses onto one of three request-level kinds (see
//! [`ErrorKind`]) so a caller can map failures to a status without matching on
//! internal details.

use std::path::PathBuf;

use thiserror::Error;

/// Request-level failure kinds reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A predictor is not loaded; nothing short of operator action fixes it
    Unavailable,
    /// The caller sent something we cannot use (e.g. undecodable image bytes)
    InvalidInput,
    /// A predictor or the fusion step failed on well-formed input
    InferenceFailure,
}

impl ErrorKind {
    /// HTTP-style status code for this kind
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Unavailable => 503,
            ErrorKind::InvalidInput => 400,
            ErrorKind::InferenceFailure => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Unavailable => write!(f, "unavailable"),
            ErrorKind::InvalidInput => write!(f, "invalid input"),
            ErrorKind::InferenceFailure => write!(f, "inference failure"),
        }
    }
}

/// Main error type for diagnosis operations
#[derive(Error, Debug)]
pub enum DiagnosisError {
    /// Predictors are not loaded; carries the startup failure reason
    #[error("Models are not available: {0}")]
    Unavailable(String),

    /// Input rejected before inference
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failure inside a predictor or during fusion
    #[error("Inference error: {0}")]
    InferenceFailure(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model artifact could not be resolved or fetched
    #[error("Artifact '{0}' unavailable: {1}")]
    Artifact(PathBuf, String),

    /// Model file present but could not be loaded
    #[error("Failed to load model at '{0}': {1}")]
    ModelLoad(PathBuf, String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DiagnosisError {
    /// Collapse this error onto the request-level taxonomy
    ///
    /// Startup-phase errors (configuration, artifacts, model loading) surface
    /// to callers as `Unavailable`, since a request can only observe them as
    /// missing predictors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiagnosisError::InvalidInput(_) => ErrorKind::InvalidInput,
            DiagnosisError::InferenceFailure(_) => ErrorKind::InferenceFailure,
            DiagnosisError::Unavailable(_)
            | DiagnosisError::Config(_)
            | DiagnosisError::Artifact(..)
            | DiagnosisError::ModelLoad(..)
            | DiagnosisError::Io(_)
            | DiagnosisError::Serialization(_) => ErrorKind::Unavailable,
        }
    }

    /// HTTP-style status code for this error
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

impl From<serde_json::Error> for DiagnosisError {
    fn from(err: serde_json::Error) -> Self {
        DiagnosisError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for DiagnosisError {
    fn from(err: image::ImageError) -> Self {
        DiagnosisError::InvalidInput(format!("Invalid image file: {}", err))
    }
}

/// Convenience Result type for diagnosis operations
pub type Result<T> = std::result::Result<T, DiagnosisError>;

/// Extension trait for turning foreign errors into inference failures
pub trait ResultExt<T> {
    /// Map any error to `InferenceFailure` with a context prefix
    fn inference_context(self, msg: &str) -> Result<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    fn inference_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| DiagnosisError::InferenceFailure(format!("{}: {:?}", msg, e)))
    }
}
