//! Predictor abstraction
//!
//! A predictor maps one typed input to a probability distribution over the
//! classes it declares. The image CNN and the symptom text pipeline are both
//! adapted to this one trait so the service and the fusion engine never see
//! their concrete types.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::utils::error::{DiagnosisError, Result};

/// Probabilities, one per class, in the order of the emitting predictor
///
/// Entries are finite and non-negative. They are not required to sum to one;
/// callers that need a categorical distribution check [`ClassDistribution::sum`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassDistribution(Vec<f64>);

impl ClassDistribution {
    /// Validate and wrap raw probabilities
    pub fn new(probabilities: Vec<f64>) -> Result<Self> {
        if probabilities.is_empty() {
            return Err(DiagnosisError::InferenceFailure(
                "empty probability distribution".to_string(),
            ));
        }
        if let Some((index, value)) = probabilities
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p < 0.0)
        {
            return Err(DiagnosisError::InferenceFailure(format!(
                "invalid probability {} at index {}",
                value, index
            )));
        }
        Ok(Self(probabilities))
    }

    /// Widen single-precision model output
    pub fn from_f32(probabilities: &[f32]) -> Result<Self> {
        Self::new(probabilities.iter().map(|&p| p as f64).collect())
    }

    /// Raw probabilities
    pub fn probabilities(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the largest probability; the lowest index wins exact ties
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for (i, &p) in self.0.iter().enumerate().skip(1) {
            if p > self.0[best] {
                best = i;
            }
        }
        best
    }

    /// Probability at the argmax index
    pub fn confidence(&self) -> f64 {
        self.0[self.argmax()]
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl AsRef<[f64]> for ClassDistribution {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// Black-box classifier over a declared class set
pub trait Predictor<I: ?Sized>: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Labels of the output positions, in output order
    fn class_labels(&self) -> &[String];

    /// Run a single inference
    fn predict(&self, input: &I) -> Result<ClassDistribution>;
}

/// Predictor shared across concurrent requests
pub type SharedPredictor<I> = Arc<dyn Predictor<I>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_and_confidence() {
        let dist = ClassDistribution::new(vec![0.3, 0.7]).unwrap();
        assert_eq!(dist.argmax(), 1);
        assert_eq!(dist.confidence(), 0.7);
    }

    #[test]
    fn test_argmax_tie_picks_lowest_index() {
        let dist = ClassDistribution::new(vec![0.5, 0.5]).unwrap();
        assert_eq!(dist.argmax(), 0);

        let dist = ClassDistribution::new(vec![0.1, 0.45, 0.45]).unwrap();
        assert_eq!(dist.argmax(), 1);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(ClassDistribution::new(vec![]).is_err());
        assert!(ClassDistribution::new(vec![0.5, f64::NAN]).is_err());
        assert!(ClassDistribution::new(vec![-0.1, 1.1]).is_err());
        assert!(ClassDistribution::new(vec![f64::INFINITY, 0.0]).is_err());
    }

    #[test]
    fn test_from_f32() {
        let dist = ClassDistribution::from_f32(&[0.25, 0.75]).unwrap();
        assert_eq!(dist.probabilities(), &[0.25, 0.75]);
        assert!((dist.sum() - 1.0).abs() < 1e-12);
    }
}
