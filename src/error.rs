//! Error types for the scoring pipeline.
//!
//! Item-level errors (`FeatureError`, `ClassifierError`, `ItemError`) are
//! always absorbed by the batch loop and turned into a failed verdict.
//! Only `PipelineError` ever reaches the caller of a batch.

use thiserror::Error;

/// A transaction field could not be turned into a feature.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("malformed field `{field}`: {reason}")]
    MalformedField { field: &'static str, reason: String },

    #[error("timestamp {0} is outside the representable range")]
    InvalidTimestamp(i64),
}

impl FeatureError {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedField {
            field,
            reason: reason.into(),
        }
    }
}

/// The classifier collaborator failed for one feature vector.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier not loaded")]
    Unavailable,

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid model output: {0}")]
    InvalidOutput(String),

    #[error("model session lock poisoned")]
    Lock,
}

/// Failure while scoring a single transaction.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("feature extraction: {0}")]
    Feature(#[from] FeatureError),

    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Failure of a whole batch call.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Model not loaded")]
    ClassifierUnavailable,

    #[error("batch processing failed: {0}")]
    BatchProcessing(String),
}

impl PipelineError {
    /// Status code reported to the requester.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::ClassifierUnavailable => 503,
            PipelineError::BatchProcessing(_) => 500,
        }
    }
}
