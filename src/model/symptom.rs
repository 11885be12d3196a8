//! Symptom text classification pipeline
//!
//! A TF-IDF bag-of-terms vectorizer feeding a logistic-regression classifier,
//! bundled in a single JSON artifact. The artifact is produced offline; this
//! module only loads, validates and evaluates it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::{DiagnosisError, Result};

/// Row normalization applied after TF-IDF weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    #[default]
    L2,
    L1,
    None,
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

/// Serialized form of a trained symptom pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomPipeline {
    /// Label of each output position, in output order
    pub classes: Vec<String>,

    /// Term -> feature index
    pub vocabulary: HashMap<String, usize>,

    /// Inverse document frequency per feature
    pub idf: Vec<f64>,

    /// Terms dropped before n-grams are built
    #[serde(default)]
    pub stop_words: HashSet<String>,

    /// Inclusive n-gram range
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),

    /// Replace raw counts with `1 + ln(tf)`
    #[serde(default)]
    pub sublinear_tf: bool,

    #[serde(default)]
    pub norm: Norm,

    /// Classifier weights: a single row for binary models, else one per class
    pub coef: Vec<Vec<f64>>,

    /// One bias per coefficient row
    pub intercept: Vec<f64>,
}

impl SymptomPipeline {
    /// Load and validate a pipeline artifact
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DiagnosisError::ModelLoad(path.to_path_buf(), e.to_string())
        })?;
        let pipeline: SymptomPipeline = serde_json::from_str(&contents).map_err(|e| {
            DiagnosisError::ModelLoad(path.to_path_buf(), format!("malformed pipeline: {}", e))
        })?;
        pipeline
            .validate()
            .map_err(|e| DiagnosisError::ModelLoad(path.to_path_buf(), e))?;
        Ok(pipeline)
    }

    /// Write the pipeline as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Number of vectorizer features
    pub fn num_features(&self) -> usize {
        self.idf.len()
    }

    /// Check internal consistency of the artifact
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.classes.len() < 2 {
            return Err(format!("need at least 2 classes, found {}", self.classes.len()));
        }

        let num_features = self.num_features();
        if let Some((term, &index)) = self.vocabulary.iter().find(|(_, &i)| i >= num_features) {
            return Err(format!(
                "vocabulary term '{}' maps to feature {} but idf has {} entries",
                term, index, num_features
            ));
        }

        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(format!("invalid ngram_range ({}, {})", min_n, max_n));
        }

        let binary = self.coef.len() == 1 && self.classes.len() == 2;
        if !binary && self.coef.len() != self.classes.len() {
            return Err(format!(
                "{} coefficient rows for {} classes",
                self.coef.len(),
                self.classes.len()
            ));
        }
        if let Some(row) = self.coef.iter().position(|r| r.len() != num_features) {
            return Err(format!(
                "coefficient row {} has {} weights, expected {}",
                row,
                self.coef[row].len(),
                num_features
            ));
        }
        if self.intercept.len() != self.coef.len() {
            return Err(format!(
                "{} intercepts for {} coefficient rows",
                self.intercept.len(),
                self.coef.len()
            ));
        }

        Ok(())
    }

    /// Lowercase and split into word tokens of at least two characters
    pub fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|token| token.chars().count() >= 2)
            .map(str::to_string)
            .collect()
    }

    /// Tokens after stop-word removal, expanded into the configured n-grams
    fn analyze(&self, text: &str) -> Vec<String> {
        let tokens: Vec<String> = Self::tokenize(text)
            .into_iter()
            .filter(|t| !self.stop_words.contains(t))
            .collect();

        let (min_n, max_n) = self.ngram_range;
        if min_n == 1 && max_n == 1 {
            return tokens;
        }

        let mut terms = Vec::new();
        for n in min_n..=max_n.min(tokens.len()) {
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }

    /// Sparse TF-IDF vector as (feature index, weight) pairs
    pub fn vectorize(&self, text: &str) -> Vec<(usize, f64)> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in self.analyze(text) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut features: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                (index, tf * self.idf[index])
            })
            .collect();
        features.sort_by_key(|(index, _)| *index);

        let scale = match self.norm {
            Norm::L2 => features.iter().map(|(_, w)| w * w).sum::<f64>().sqrt(),
            Norm::L1 => features.iter().map(|(_, w)| w.abs()).sum::<f64>(),
            Norm::None => 1.0,
        };
        if scale > 0.0 {
            for (_, weight) in features.iter_mut() {
                *weight /= scale;
            }
        }

        features
    }

    /// Linear decision value per coefficient row
    fn decision_function(&self, features: &[(usize, f64)]) -> Vec<f64> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, bias)| features.iter().map(|&(i, x)| row[i] * x).sum::<f64>() + bias)
            .collect()
    }

    /// Class probabilities for one text, in `classes` order
    pub fn predict_proba(&self, text: &str) -> Vec<f64> {
        let decisions = self.decision_function(&self.vectorize(text));

        if decisions.len() == 1 {
            let positive = sigmoid(decisions[0]);
            return vec![1.0 - positive, positive];
        }
        softmax(&decisions)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
