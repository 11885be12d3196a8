//! Model definitions
//!
//! - `cnn`: the convolutional skin classifier built with Burn
//! - `symptom`: the TF-IDF + logistic-regression symptom pipeline

pub mod cnn;
pub mod symptom;

pub use cnn::{SkinClassifier, SkinClassifierConfig};
pub use symptom::SymptomPipeline;
