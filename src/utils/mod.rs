//! Utilities module for logging, error handling and display helpers
//!
//! This module provides:
//! - Structured logging with tracing
//! - The crate-wide error type and its request-level taxonomy
//! - Confidence formatting shared by reports and the CLI

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{DiagnosisError, ErrorKind, Result};
pub use logging::init_logging;

/// Format a probability for display with two decimals (e.g. `0.62`)
pub fn format_confidence(value: f64) -> String {
    format!("{:.2}", value)
}

/// Format a probability as a percentage (e.g. `62.0%`)
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Format a percentage with a progress bar
pub fn format_confidence_bar(value: f64, width: usize) -> String {
    let filled = (value.clamp(0.0, 1.0) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);

    format!(
        "[{}{}] {}",
        "█".repeat(filled),
        "░".repeat(empty),
        format_percentage(value)
    )
}
