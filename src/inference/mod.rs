//! Inference module: the two predictors behind a common interface
//!
//! This module provides:
//! - The `Predictor` trait and `ClassDistribution` output type
//! - Image decoding and preprocessing into model tensors
//! - Adapters for the burn image model and the symptom pipeline

pub mod image;
pub mod predictor;
pub mod preprocess;
pub mod symptom;

// Re-export main types for convenience
pub use self::image::BurnImagePredictor;
pub use predictor::{ClassDistribution, Predictor, SharedPredictor};
pub use preprocess::{preprocess_bytes, preprocess_image, ImageTensor, IMAGE_SIZE};
pub use symptom::PipelineSymptomPredictor;
