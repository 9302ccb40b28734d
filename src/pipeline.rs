//! Upload-to-prediction flow.
//!
//! Every call stores the upload under a unique name in the scratch directory,
//! runs the classifier, applies the acceptance rules and removes the file again
//! on every exit path.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::labels::{self, LabelSet};
use crate::metadata::{DiseaseInfo, MetadataStore};
use crate::model::{self, Classifier, ModelError};

/// Predictions below this confidence (percent) are rejected.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 30.0;

pub const REJECTION_REASON: &str = "not a valid leaf image";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Model not loaded. Please install TensorFlow.")]
    ModelUnavailable,
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("classifier returned no usable probabilities")]
    EmptyPrediction,
    #[error("class index {index} is outside the label set ({labels} labels)")]
    UnknownClass { index: usize, labels: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationResult {
    Accepted {
        /// Raw label, e.g. `Tomato___Late_blight`.
        label: String,
        /// Percentage in `[0, 100]`, unrounded.
        confidence: f64,
        /// Base64 of the bytes exactly as uploaded.
        encoded_image: String,
        metadata: DiseaseInfo,
    },
    Rejected {
        reason: String,
    },
}

impl ClassificationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ClassificationResult::Accepted { .. })
    }
}

/// Read-only state shared by all requests, built once at startup.
pub struct Pipeline {
    classifier: Option<Box<dyn Classifier>>,
    labels: LabelSet,
    metadata: MetadataStore,
    scratch_dir: PathBuf,
    confidence_threshold: f64,
}

impl Pipeline {
    pub fn new(
        classifier: Option<Box<dyn Classifier>>,
        labels: LabelSet,
        metadata: MetadataStore,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            classifier,
            labels,
            metadata,
            scratch_dir: scratch_dir.into(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn has_model(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn classify(
        &self,
        image_bytes: &[u8],
        filename: &str,
    ) -> Result<ClassificationResult, PipelineError> {
        let upload = TempUpload::create(&self.scratch_dir, filename, image_bytes)?;
        debug!("Stored upload at {}", upload.path().display());

        let classifier = self
            .classifier
            .as_deref()
            .ok_or(PipelineError::ModelUnavailable)?;

        let input = model::load_image_tensor(upload.path())?;
        let probabilities = classifier.predict(&input)?;

        let index = model::argmax(&probabilities).ok_or(PipelineError::EmptyPrediction)?;
        let label = self
            .labels
            .get(index)
            .ok_or(PipelineError::UnknownClass {
                index,
                labels: self.labels.len(),
            })?;
        let confidence = probabilities[index] as f64 * 100.0;

        if labels::is_background(label) || confidence < self.confidence_threshold {
            info!("Rejected upload: top class {} at {:.2}%", label, confidence);
            return Ok(ClassificationResult::Rejected {
                reason: REJECTION_REASON.to_string(),
            });
        }

        info!("Predicted {} at {:.2}%", label, confidence);

        Ok(ClassificationResult::Accepted {
            label: label.to_string(),
            confidence,
            encoded_image: STANDARD.encode(image_bytes),
            metadata: self.metadata.lookup(label),
        })
    }
}

/// Rounds a confidence percentage to two decimals for display.
pub fn round_confidence(confidence: f64) -> f64 {
    (confidence * 100.0).round() / 100.0
}

/// Upload written to the scratch directory. The file is removed on drop.
struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    fn create(dir: &Path, filename: &str, bytes: &[u8]) -> std::io::Result<Self> {
        let base = Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload");
        let path = dir.join(format!("temp_{}_{}", Uuid::new_v4().simple(), base));

        std::fs::write(&path, bytes)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}
