//! Diagnosis service: the application context handed to callers
//!
//! Built once at startup. Either both predictors loaded and their class
//! orders were aligned (ready), or the service is degraded and every request
//! fails fast with `Unavailable` until an operator fixes the deployment.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactCache, ArtifactSource, DirectorySource};
use crate::classes::ClassAlignment;
use crate::config::ServiceConfig;
use crate::fusion::{FusedDiagnosis, FusionEngine};
use crate::inference::image::BurnImagePredictor;
use crate::inference::predictor::{ClassDistribution, Predictor, SharedPredictor};
use crate::inference::preprocess::{preprocess_bytes, ImageTensor};
use crate::inference::symptom::PipelineSymptomPredictor;
use crate::utils::error::{DiagnosisError, Result};

/// One diagnosis request: an uploaded image plus a symptom description
#[derive(Debug, Clone)]
pub struct DiagnosisRequest {
    pub filename: String,
    pub image: Vec<u8>,
    pub symptoms: String,
}

impl DiagnosisRequest {
    pub fn new(filename: impl Into<String>, image: Vec<u8>, symptoms: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            image,
            symptoms: symptoms.into(),
        }
    }
}

/// Response record returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub filename: String,
    pub image_prediction: String,
    pub image_confidence: String,
    pub symptom_prediction: String,
    pub symptom_confidence: String,
    pub fused_prediction: String,
    pub fused_confidence: String,
}

impl DiagnosisReport {
    pub fn new(filename: &str, diagnosis: &FusedDiagnosis) -> Self {
        Self {
            filename: filename.to_string(),
            image_prediction: diagnosis.image.class.label().to_string(),
            image_confidence: diagnosis.image.confidence_display(),
            symptom_prediction: diagnosis.symptom.class.label().to_string(),
            symptom_confidence: diagnosis.symptom.confidence_display(),
            fused_prediction: diagnosis.fused.class.label().to_string(),
            fused_confidence: diagnosis.fused.confidence_display(),
        }
    }
}

/// Readiness as reported to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ServiceStatus {
    Ready {
        image_model: String,
        symptom_model: String,
    },
    Degraded {
        reason: String,
    },
}

impl ServiceStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ServiceStatus::Ready { .. })
    }
}

/// A predictor together with the alignment of its output onto canonical order
struct AlignedPredictor<I: ?Sized> {
    predictor: SharedPredictor<I>,
    alignment: ClassAlignment,
}

impl<I: ?Sized> AlignedPredictor<I> {
    fn new(predictor: SharedPredictor<I>) -> Result<Self> {
        let alignment = ClassAlignment::resolve(predictor.class_labels()).map_err(|e| {
            DiagnosisError::Config(format!("{} predictor: {}", predictor.name(), e))
        })?;
        if !alignment.is_identity() {
            tracing::info!(
                "{} predictor declares {:?}; outputs will be re-aligned",
                predictor.name(),
                predictor.class_labels()
            );
        }
        Ok(Self {
            predictor,
            alignment,
        })
    }

    fn predict(&self, input: &I) -> Result<ClassDistribution> {
        let raw = self.predictor.predict(input).map_err(|e| match e {
            DiagnosisError::InferenceFailure(_) => e,
            other => DiagnosisError::InferenceFailure(format!(
                "{} predictor: {}",
                self.predictor.name(),
                other
            )),
        })?;
        ClassDistribution::new(self.alignment.align(raw.probabilities())?)
    }
}

struct Predictors {
    image: AlignedPredictor<ImageTensor>,
    symptom: AlignedPredictor<str>,
}

enum Readiness {
    Ready(Predictors),
    Degraded(String),
}

/// Application context: predictors plus the fusion engine
pub struct DiagnosisService {
    readiness: Readiness,
    engine: FusionEngine,
}

impl DiagnosisService {
    /// Build from predictors; a missing or misaligned predictor degrades the service
    pub fn new(
        image: Option<SharedPredictor<ImageTensor>>,
        symptom: Option<SharedPredictor<str>>,
    ) -> Self {
        let readiness = match (image, symptom) {
            (Some(image), Some(symptom)) => {
                match (AlignedPredictor::new(image), AlignedPredictor::new(symptom)) {
                    (Ok(image), Ok(symptom)) => Readiness::Ready(Predictors { image, symptom }),
                    (Err(e), _) | (_, Err(e)) => Readiness::Degraded(e.to_string()),
                }
            }
            (None, _) => Readiness::Degraded("image model not loaded".to_string()),
            (_, None) => Readiness::Degraded("symptom model not loaded".to_string()),
        };

        if let Readiness::Degraded(reason) = &readiness {
            tracing::error!("Diagnosis service degraded: {}", reason);
        }

        Self {
            readiness,
            engine: FusionEngine::new(),
        }
    }

    /// A service that refuses every request
    pub fn degraded(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::error!("Diagnosis service degraded: {}", reason);
        Self {
            readiness: Readiness::Degraded(reason),
            engine: FusionEngine::new(),
        }
    }

    /// Startup phase: resolve artifacts, load both models, report readiness
    ///
    /// Never fails: any problem is captured as a degraded service so the
    /// caller can keep serving status information.
    pub fn startup(config: &ServiceConfig) -> Self {
        tracing::info!("Starting diagnosis service. Checking for models...");
        match Self::load_predictors(config) {
            Ok((image, symptom)) => {
                tracing::info!("Image and symptom models loaded successfully.");
                Self::new(Some(image), Some(symptom))
            }
            Err(e) => Self::degraded(format!("could not load models: {}", e)),
        }
    }

    fn load_predictors(
        config: &ServiceConfig,
    ) -> Result<(SharedPredictor<ImageTensor>, SharedPredictor<str>)> {
        config.validate()?;

        let cache = ArtifactCache::new(&config.models_dir);
        let source = config.artifact_source.as_ref().map(DirectorySource::new);
        let source = source.as_ref().map(|s| s as &dyn ArtifactSource);

        let image_path = cache.ensure(&config.image_model_file, source)?;
        let symptom_path = cache.ensure(&config.symptom_model_file, source)?;

        let image = BurnImagePredictor::load(
            &image_path,
            &config.image_model.to_model_config(),
            config.image_model.classes.clone(),
        )?;
        let symptom = PipelineSymptomPredictor::load(&symptom_path)?;

        Ok((Arc::new(image), Arc::new(symptom)))
    }

    /// Current readiness
    pub fn status(&self) -> ServiceStatus {
        match &self.readiness {
            Readiness::Ready(p) => ServiceStatus::Ready {
                image_model: p.image.predictor.name().to_string(),
                symptom_model: p.symptom.predictor.name().to_string(),
            },
            Readiness::Degraded(reason) => ServiceStatus::Degraded {
                reason: reason.clone(),
            },
        }
    }

    /// Run both predictors and fuse their outputs
    pub fn diagnose_full(&self, request: &DiagnosisRequest) -> Result<FusedDiagnosis> {
        let predictors = match &self.readiness {
            Readiness::Ready(p) => p,
            Readiness::Degraded(reason) => {
                return Err(DiagnosisError::Unavailable(reason.clone()));
            }
        };

        let start = Instant::now();
        let tensor = preprocess_bytes(&request.image)?;

        let image = predictors.image.predict(&tensor)?;
        let symptom = predictors.symptom.predict(&request.symptoms)?;
        tracing::debug!(
            "{}: image {:?}, symptoms {:?}",
            request.filename,
            image.probabilities(),
            symptom.probabilities()
        );

        let diagnosis = self.engine.fuse(&image, &symptom)?;
        tracing::info!(
            "{}: {} ({:.2}) in {:.1} ms",
            request.filename,
            diagnosis.fused.class,
            diagnosis.fused.confidence,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(diagnosis)
    }

    /// Diagnose one request and build the response record
    pub fn diagnose(&self, request: &DiagnosisRequest) -> Result<DiagnosisReport> {
        let diagnosis = self.diagnose_full(request)?;
        Ok(DiagnosisReport::new(&request.filename, &diagnosis))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::{DynamicImage, ImageFormat};

    use super::*;
    use crate::classes::SkinClass;
    use crate::ErrorKind;

    /// Predictor returning a fixed distribution and counting calls
    struct FixedPredictor {
        labels: Vec<String>,
        output: Vec<f64>,
        calls: AtomicUsize,
    }

    impl FixedPredictor {
        fn canonical(output: &[f64]) -> Self {
            Self {
                labels: SkinClass::canonical_labels(),
                output: output.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl<I: ?Sized> Predictor<I> for FixedPredictor {
        fn name(&self) -> &str {
            "fixed"
        }

        fn class_labels(&self) -> &[String] {
            &self.labels
        }

        fn predict(&self, _input: &I) -> Result<ClassDistribution> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ClassDistribution::new(self.output.clone())
        }
    }

    struct FailingPredictor;

    impl Predictor<str> for FailingPredictor {
        fn name(&self) -> &str {
            "failing"
        }

        fn class_labels(&self) -> &[String] {
            static LABELS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
            LABELS.get_or_init(SkinClass::canonical_labels)
        }

        fn predict(&self, _input: &str) -> Result<ClassDistribution> {
            Err(DiagnosisError::Serialization("vectorizer exploded".to_string()))
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::new_rgb8(32, 32)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn service(image: &[f64], symptom: &[f64]) -> DiagnosisService {
        DiagnosisService::new(
            Some(Arc::new(FixedPredictor::canonical(image))),
            Some(Arc::new(FixedPredictor::canonical(symptom))),
        )
    }

    #[test]
    fn test_end_to_end_report() {
        let service = service(&[0.9, 0.1], &[0.2, 0.8]);
        let request = DiagnosisRequest::new("cow.png", png_bytes(), "fever and nodules");

        let report = service.diagnose(&request).unwrap();
        assert_eq!(
            report,
            DiagnosisReport {
                filename: "cow.png".to_string(),
                image_prediction: "LUMPY SKIN".to_string(),
                image_confidence: "0.90".to_string(),
                symptom_prediction: "NORMAL SKIN".to_string(),
                symptom_confidence: "0.80".to_string(),
                fused_prediction: "LUMPY SKIN".to_string(),
                fused_confidence: "0.62".to_string(),
            }
        );
    }

    #[test]
    fn test_report_json_keys() {
        let service = service(&[0.9, 0.1], &[0.2, 0.8]);
        let report = service
            .diagnose(&DiagnosisRequest::new("cow.png", png_bytes(), "fever"))
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["fused_prediction"], "LUMPY SKIN");
        assert_eq!(json["fused_confidence"], "0.62");
        assert_eq!(json["filename"], "cow.png");
    }

    #[test]
    fn test_invalid_image_is_invalid_input() {
        let service = service(&[0.9, 0.1], &[0.2, 0.8]);
        let err = service
            .diagnose(&DiagnosisRequest::new("empty.jpg", Vec::new(), "fever"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_missing_predictor_is_unavailable_before_preprocessing() {
        let symptom = Arc::new(FixedPredictor::canonical(&[0.5, 0.5]));
        let service = DiagnosisService::new(None, Some(symptom.clone()));

        assert!(!service.status().is_ready());

        // Empty bytes would be InvalidInput if preprocessing ran
        let err = service
            .diagnose(&DiagnosisRequest::new("x.jpg", Vec::new(), "fever"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(err.status_code(), 503);
        assert_eq!(symptom.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_symptom_predictor_is_unavailable() {
        let image = Arc::new(FixedPredictor::canonical(&[0.9, 0.1]));
        let service = DiagnosisService::new(Some(image.clone()), None);

        match service.status() {
            ServiceStatus::Degraded { reason } => assert!(reason.contains("symptom")),
            other => panic!("unexpected status {:?}", other),
        }

        let err = service
            .diagnose(&DiagnosisRequest::new("cow.png", png_bytes(), "fever"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(image.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_degraded_service_rejects_everything() {
        let service = DiagnosisService::degraded("download failed");
        match service.status() {
            ServiceStatus::Degraded { reason } => assert_eq!(reason, "download failed"),
            other => panic!("unexpected status {:?}", other),
        }

        let err = service
            .diagnose(&DiagnosisRequest::new("cow.png", png_bytes(), "fever"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_reversed_symptom_classes_are_realigned() {
        let symptom = FixedPredictor {
            labels: vec!["NORMAL SKIN".to_string(), "LUMPY SKIN".to_string()],
            // P(normal) = 0.8, P(lumpy) = 0.2
            output: vec![0.8, 0.2],
            calls: AtomicUsize::new(0),
        };
        let service = DiagnosisService::new(
            Some(Arc::new(FixedPredictor::canonical(&[0.9, 0.1]))),
            Some(Arc::new(symptom)),
        );

        let diagnosis = service
            .diagnose_full(&DiagnosisRequest::new("cow.png", png_bytes(), "fever"))
            .unwrap();
        let fused = diagnosis.fused_probabilities.probabilities();
        assert!((fused[0] - 0.62).abs() < 1e-12);
        assert_eq!(diagnosis.symptom.class, SkinClass::NormalSkin);
    }

    #[test]
    fn test_unknown_class_labels_degrade_service() {
        let symptom = FixedPredictor {
            labels: vec!["LUMPY SKIN".to_string(), "FOOT AND MOUTH".to_string()],
            output: vec![0.5, 0.5],
            calls: AtomicUsize::new(0),
        };
        let service = DiagnosisService::new(
            Some(Arc::new(FixedPredictor::canonical(&[0.9, 0.1]))),
            Some(Arc::new(symptom)),
        );
        assert!(!service.status().is_ready());
    }

    #[test]
    fn test_predictor_errors_become_inference_failures() {
        let service = DiagnosisService::new(
            Some(Arc::new(FixedPredictor::canonical(&[0.9, 0.1]))),
            Some(Arc::new(FailingPredictor)),
        );
        let err = service
            .diagnose(&DiagnosisRequest::new("cow.png", png_bytes(), "fever"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InferenceFailure);
        assert!(err.to_string().contains("vectorizer exploded"));
    }

    #[test]
    fn test_startup_without_artifacts_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            models_dir: dir.path().to_path_buf(),
            ..ServiceConfig::default()
        };

        let service = DiagnosisService::startup(&config);
        match service.status() {
            ServiceStatus::Degraded { reason } => {
                assert!(reason.contains("cow_skin_classifier.mpk"))
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn test_status_serializes_with_tag() {
        let json = serde_json::to_value(DiagnosisService::degraded("no models").status()).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["reason"], "no models");
    }
}
