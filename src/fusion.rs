//! Late fusion of the image and symptom predictions
//!
//! `fused[i] = 0.60 * image[i] + 0.40 * symptom[i]`
//!
//! The weights are global constants that favour the visual modality. They are
//! not learned, not renormalized per request and cannot be changed per call.
//! Both inputs must already be aligned to the canonical class order.

use serde::Serialize;

use crate::classes::{SkinClass, NUM_CLASSES};
use crate::inference::predictor::ClassDistribution;
use crate::utils::error::{DiagnosisError, Result};
use crate::utils::format_confidence;

/// Weight of the image distribution
pub const IMAGE_WEIGHT: f64 = 0.60;

/// Weight of the symptom distribution
pub const TEXT_WEIGHT: f64 = 0.40;

/// Argmax class of one distribution with its probability
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub class: SkinClass,
    pub confidence: f64,
}

impl Verdict {
    /// Verdict of a canonically ordered distribution
    pub fn of(distribution: &ClassDistribution) -> Result<Self> {
        let index = distribution.argmax();
        let class = SkinClass::from_index(index).ok_or_else(|| {
            DiagnosisError::InferenceFailure(format!("class index {} out of range", index))
        })?;
        Ok(Self {
            class,
            confidence: distribution.confidence(),
        })
    }

    /// Confidence rounded to two decimals for display
    pub fn confidence_display(&self) -> String {
        format_confidence(self.confidence)
    }
}

/// Everything the fusion step decided, at full precision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedDiagnosis {
    pub image: Verdict,
    pub symptom: Verdict,
    pub fused: Verdict,
    pub fused_probabilities: ClassDistribution,
}

/// Stateless weighted-average fusion
#[derive(Debug, Clone, Copy, Default)]
pub struct FusionEngine;

impl FusionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Weighted elementwise sum of two aligned distributions
    pub fn fuse_probabilities(
        &self,
        image: &ClassDistribution,
        symptom: &ClassDistribution,
    ) -> Result<ClassDistribution> {
        for (name, dist) in [("image", image), ("symptom", symptom)] {
            if dist.len() != NUM_CLASSES {
                return Err(DiagnosisError::InferenceFailure(format!(
                    "{} distribution has {} entries, expected {}",
                    name,
                    dist.len(),
                    NUM_CLASSES
                )));
            }
        }

        let fused = image
            .probabilities()
            .iter()
            .zip(symptom.probabilities())
            .map(|(img, sym)| IMAGE_WEIGHT * img + TEXT_WEIGHT * sym)
            .collect();
        ClassDistribution::new(fused)
    }

    /// Fuse two aligned distributions and report all three verdicts
    pub fn fuse(
        &self,
        image: &ClassDistribution,
        symptom: &ClassDistribution,
    ) -> Result<FusedDiagnosis> {
        let fused_probabilities = self.fuse_probabilities(image, symptom)?;

        Ok(FusedDiagnosis {
            image: Verdict::of(image)?,
            symptom: Verdict::of(symptom)?,
            fused: Verdict::of(&fused_probabilities)?,
            fused_probabilities,
        })
    }
}
