//! Image predictor backed by the burn skin classifier

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::{Tensor, TensorData};

use crate::backend::{default_device, InferenceBackend, InferenceDevice};
use crate::inference::predictor::{ClassDistribution, Predictor};
use crate::inference::preprocess::ImageTensor;
use crate::model::cnn::{SkinClassifier, SkinClassifierConfig};
use crate::utils::error::{DiagnosisError, Result, ResultExt};

/// Adapter exposing [`SkinClassifier`] as a [`Predictor`] over preprocessed images
///
/// Forward passes are serialized through a mutex: the tensor runtime is not
/// assumed to be safe for concurrent inference on one model instance.
pub struct BurnImagePredictor {
    model: Mutex<SkinClassifier<InferenceBackend>>,
    device: InferenceDevice,
    class_labels: Vec<String>,
}

impl BurnImagePredictor {
    /// Wrap an already constructed model
    pub fn new(
        model: SkinClassifier<InferenceBackend>,
        device: InferenceDevice,
        class_labels: Vec<String>,
    ) -> Result<Self> {
        if model.num_classes() != class_labels.len() {
            return Err(DiagnosisError::Config(format!(
                "image model has {} outputs but {} class labels are declared",
                model.num_classes(),
                class_labels.len()
            )));
        }
        Ok(Self {
            model: Mutex::new(model),
            device,
            class_labels,
        })
    }

    /// Load weights recorded with `CompactRecorder`
    pub fn load(
        path: &Path,
        config: &SkinClassifierConfig,
        class_labels: Vec<String>,
    ) -> Result<Self> {
        if !path.exists() {
            return Err(DiagnosisError::ModelLoad(
                path.to_path_buf(),
                "file not found".to_string(),
            ));
        }

        let device = default_device();
        let recorder = CompactRecorder::new();
        let model = SkinClassifier::<InferenceBackend>::new(config, &device)
            .load_file(path, &recorder, &device)
            .map_err(|e| DiagnosisError::ModelLoad(path.to_path_buf(), format!("{:?}", e)))?;

        tracing::info!(
            "Loaded image model from {:?} ({} classes)",
            path,
            model.num_classes()
        );

        Self::new(model, device, class_labels)
    }
}

impl Predictor<ImageTensor> for BurnImagePredictor {
    fn name(&self) -> &str {
        "image"
    }

    fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    fn predict(&self, input: &ImageTensor) -> Result<ClassDistribution> {
        let shape = input.shape();
        let tensor = Tensor::<InferenceBackend, 4>::from_data(
            TensorData::new(input.as_slice().to_vec(), shape),
            &self.device,
        );

        let start = Instant::now();
        let output = {
            let model = self
                .model
                .lock()
                .map_err(|_| DiagnosisError::InferenceFailure("image model lock poisoned".into()))?;
            model.forward_softmax(tensor)
        };

        let probs: Vec<f32> = output
            .into_data()
            .to_vec()
            .inference_context("Failed to extract image probabilities")?;

        tracing::debug!(
            "Image forward pass took {:.2} ms",
            start.elapsed().as_secs_f64() * 1000.0
        );

        // Batch of one: the first row is the whole output
        let row = probs.get(..self.class_labels.len()).ok_or_else(|| {
            DiagnosisError::InferenceFailure(format!(
                "image model returned {} values for {} classes",
                probs.len(),
                self.class_labels.len()
            ))
        })?;
        ClassDistribution::from_f32(row)
    }
}
