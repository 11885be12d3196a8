//! Service Configuration Module
//!
//! Where the model artifacts live and how the image model was built. Loaded
//! from an optional JSON file; missing fields take their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classes::SkinClass;
use crate::model::cnn::SkinClassifierConfig;
use crate::utils::error::{DiagnosisError, Result};

/// Architecture and label order of the recorded image model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageModelConfig {
    /// Labels of the model outputs, in output order
    pub classes: Vec<String>,

    /// Base number of convolutional filters the weights were trained with
    pub base_filters: usize,

    /// Units in the hidden fully connected layer
    pub hidden_units: usize,

    /// Dropout rate used at training time
    pub dropout_rate: f64,
}

impl Default for ImageModelConfig {
    fn default() -> Self {
        Self {
            classes: SkinClass::canonical_labels(),
            base_filters: 32,
            hidden_units: 256,
            dropout_rate: 0.3,
        }
    }
}

impl ImageModelConfig {
    /// Burn model configuration matching these settings
    pub fn to_model_config(&self) -> SkinClassifierConfig {
        SkinClassifierConfig::new()
            .with_num_classes(self.classes.len())
            .with_base_filters(self.base_filters)
            .with_hidden_units(self.hidden_units)
            .with_dropout_rate(self.dropout_rate)
    }
}

/// Top-level configuration of the diagnosis service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Local cache directory for model artifacts
    pub models_dir: PathBuf,

    /// Filename of the recorded image model
    pub image_model_file: String,

    /// Filename of the symptom pipeline
    pub symptom_model_file: String,

    /// Directory to fetch missing artifacts from
    pub artifact_source: Option<PathBuf>,

    pub image_model: ImageModelConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            image_model_file: "cow_skin_classifier.mpk".to_string(),
            symptom_model_file: "symptom_model.json".to_string(),
            artifact_source: None,
            image_model: ImageModelConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DiagnosisError::Config(format!("cannot read {:?}: {}", path, e))
        })?;
        let config: ServiceConfig = serde_json::from_str(&contents)
            .map_err(|e| DiagnosisError::Config(format!("invalid {:?}: {}", path, e)))?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (field, name) in [
            ("image_model_file", &self.image_model_file),
            ("symptom_model_file", &self.symptom_model_file),
        ] {
            if name.trim().is_empty() {
                return Err(DiagnosisError::Config(format!("{} must not be empty", field)));
            }
            if Path::new(name).components().count() != 1 {
                return Err(DiagnosisError::Config(format!(
                    "{} must be a bare filename, got '{}'",
                    field, name
                )));
            }
        }

        if self.image_model.base_filters == 0 || self.image_model.hidden_units == 0 {
            return Err(DiagnosisError::Config(
                "image_model layer sizes must be greater than 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.image_model.dropout_rate) {
            return Err(DiagnosisError::Config(
                "image_model.dropout_rate must be in range [0.0, 1.0)".to_string(),
            ));
        }

        Ok(())
    }

    /// Cached location of the image model
    pub fn image_model_path(&self) -> PathBuf {
        self.models_dir.join(&self.image_model_file)
    }

    /// Cached location of the symptom pipeline
    pub fn symptom_model_path(&self) -> PathBuf {
        self.models_dir.join(&self.symptom_model_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.image_model_path(),
            PathBuf::from("models/cow_skin_classifier.mpk")
        );
        assert_eq!(config.image_model.classes, vec!["LUMPY SKIN", "NORMAL SKIN"]);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cowskin.json");
        std::fs::write(
            &path,
            r#"{ "models_dir": "/var/lib/cowskin", "image_model": { "base_filters": 16 } }"#,
        )
        .unwrap();

        let config = ServiceConfig::from_file(&path).unwrap();
        assert_eq!(config.models_dir, PathBuf::from("/var/lib/cowskin"));
        assert_eq!(config.image_model.base_filters, 16);
        assert_eq!(config.image_model.hidden_units, 256);
        assert_eq!(config.symptom_model_file, "symptom_model.json");
    }

    #[test]
    fn test_validate_rejects_paths_as_filenames() {
        let mut config = ServiceConfig::default();
        config.symptom_model_file = "../elsewhere/model.json".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_dropout_range() {
        let mut config = ServiceConfig::default();
        config.image_model.dropout_rate = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_model_config() {
        let mut image = ImageModelConfig::default();
        image.base_filters = 8;
        let model = image.to_model_config();
        assert_eq!(model.num_classes, 2);
        assert_eq!(model.base_filters, 8);
    }
}
