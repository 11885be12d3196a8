//! Class set and class alignment
//!
//! Both predictors emit one probability per class, but each was trained on its
//! own and declares its own label order. [`ClassAlignment`] maps a declared
//! order onto the canonical [`SkinClass::ALL`] order so that distributions can
//! be fused index by index.

use serde::{Deserialize, Serialize};

use crate::utils::error::{DiagnosisError, Result};

/// Number of classes in the canonical class set
pub const NUM_CLASSES: usize = 2;

/// Diagnosis classes, in canonical index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkinClass {
    #[serde(rename = "LUMPY SKIN")]
    LumpySkin,
    #[serde(rename = "NORMAL SKIN")]
    NormalSkin,
}

impl SkinClass {
    /// Canonical ordering: index 0 is lumpy skin, index 1 is normal skin
    pub const ALL: [SkinClass; NUM_CLASSES] = [SkinClass::LumpySkin, SkinClass::NormalSkin];

    /// Canonical index of this class
    pub fn index(&self) -> usize {
        match self {
            SkinClass::LumpySkin => 0,
            SkinClass::NormalSkin => 1,
        }
    }

    /// Class at a canonical index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            SkinClass::LumpySkin => "LUMPY SKIN",
            SkinClass::NormalSkin => "NORMAL SKIN",
        }
    }

    /// Match a declared label (case-insensitive, surrounding whitespace ignored)
    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = label.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|class| class.label().eq_ignore_ascii_case(wanted))
    }

    /// Canonical labels as owned strings, handy for predictors that declare
    /// the canonical order
    pub fn canonical_labels() -> Vec<String> {
        Self::ALL.iter().map(|c| c.label().to_string()).collect()
    }
}

impl std::fmt::Display for SkinClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Permutation from a predictor's declared output order to canonical order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassAlignment {
    /// `source_index[c]` is the position of canonical class `c` in the
    /// predictor's output
    source_index: [usize; NUM_CLASSES],
}

impl ClassAlignment {
    /// Alignment for a predictor that already emits canonical order
    pub fn identity() -> Self {
        Self {
            source_index: [0, 1],
        }
    }

    /// Resolve the alignment for a declared label order
    ///
    /// The declared labels must be exactly a permutation of the class set.
    pub fn resolve(declared: &[String]) -> Result<Self> {
        if declared.len() != NUM_CLASSES {
            return Err(DiagnosisError::Config(format!(
                "predictor declares {} classes {:?}, expected {}",
                declared.len(),
                declared,
                NUM_CLASSES
            )));
        }

        let mut source_index = [usize::MAX; NUM_CLASSES];
        for (position, label) in declared.iter().enumerate() {
            let class = SkinClass::from_label(label).ok_or_else(|| {
                DiagnosisError::Config(format!("unknown class label '{}'", label))
            })?;
            if source_index[class.index()] != usize::MAX {
                return Err(DiagnosisError::Config(format!(
                    "class label '{}' declared more than once",
                    label
                )));
            }
            source_index[class.index()] = position;
        }

        Ok(Self { source_index })
    }

    /// Whether the declared order already equals canonical order
    pub fn is_identity(&self) -> bool {
        self.source_index
            .iter()
            .enumerate()
            .all(|(canonical, &source)| canonical == source)
    }

    /// Re-index raw predictor output into canonical order
    pub fn align(&self, raw: &[f64]) -> Result<Vec<f64>> {
        if raw.len() != NUM_CLASSES {
            return Err(DiagnosisError::InferenceFailure(format!(
                "predictor returned {} probabilities, expected {}",
                raw.len(),
                NUM_CLASSES
            )));
        }
        Ok(self.source_index.iter().map(|&i| raw[i]).collect())
    }
}
