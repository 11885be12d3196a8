//! Symptom predictor backed by the TF-IDF + logistic-regression pipeline

use std::path::Path;

use crate::inference::predictor::{ClassDistribution, Predictor};
use crate::model::symptom::SymptomPipeline;
use crate::utils::error::Result;

/// Adapter exposing [`SymptomPipeline`] as a [`Predictor`] over free text
///
/// The pipeline is immutable after loading, so concurrent calls need no lock.
pub struct PipelineSymptomPredictor {
    pipeline: SymptomPipeline,
}

impl PipelineSymptomPredictor {
    pub fn new(pipeline: SymptomPipeline) -> Self {
        Self { pipeline }
    }

    /// Load a pipeline artifact from disk
    pub fn load(path: &Path) -> Result<Self> {
        let pipeline = SymptomPipeline::load(path)?;
        tracing::info!(
            "Loaded symptom model from {:?} ({} terms, classes {:?})",
            path,
            pipeline.vocabulary.len(),
            pipeline.classes
        );
        Ok(Self::new(pipeline))
    }
}

impl Predictor<str> for PipelineSymptomPredictor {
    fn name(&self) -> &str {
        "symptom"
    }

    fn class_labels(&self) -> &[String] {
        &self.pipeline.classes
    }

    fn predict(&self, input: &str) -> Result<ClassDistribution> {
        ClassDistribution::new(self.pipeline.predict_proba(input))
    }
}
