//! Classifier collaborator contract

use crate::error::ClassifierError;
use crate::feature_extractor::FeatureVector;
use crate::types::verdict::round_to;
use std::fmt;
use std::sync::Arc;

/// Binary fraud classifier, shared read-only across batches.
pub trait FraudClassifier: Send + Sync {
    /// Name of the loaded model, for logs and model info.
    fn name(&self) -> &str;

    /// Probability distribution over (legitimate, fraudulent).
    fn predict_proba(&self, features: &FeatureVector) -> Result<ClassProbabilities, ClassifierError>;
}

/// Two-class probability output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProbabilities {
    pub negative: f64,
    pub positive: f64,
}

impl ClassProbabilities {
    /// Validate a raw model output.
    pub fn new(negative: f64, positive: f64) -> Result<Self, ClassifierError> {
        for p in [negative, positive] {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(ClassifierError::InvalidOutput(format!(
                    "probability {p} outside [0, 1]"
                )));
            }
        }
        Ok(Self { negative, positive })
    }

    /// Derive the distribution from the fraudulent-class probability alone.
    pub fn from_positive(positive: f64) -> Result<Self, ClassifierError> {
        Self::new(1.0 - positive, positive)
    }

    /// Fraud probability on the 0-100 scale, two decimals.
    pub fn ml_risk(&self) -> f64 {
        round_to(self.positive * 100.0, 2)
    }

    /// Highest class probability.
    pub fn confidence(&self) -> f64 {
        self.negative.max(self.positive)
    }
}

/// Outcome of one candidate model load at startup
#[derive(Debug, Clone)]
pub struct LoadAttempt {
    pub candidate: String,
    pub error: String,
}

impl fmt::Display for LoadAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.candidate, self.error)
    }
}

/// Process-wide classifier availability, decided once at startup.
#[derive(Clone)]
pub enum ClassifierState {
    Ready(Arc<dyn FraudClassifier>),
    Unavailable { attempts: Vec<LoadAttempt> },
}

impl ClassifierState {
    pub fn ready(classifier: impl FraudClassifier + 'static) -> Self {
        ClassifierState::Ready(Arc::new(classifier))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ClassifierState::Ready(_))
    }

    pub fn classifier(&self) -> Option<&Arc<dyn FraudClassifier>> {
        match self {
            ClassifierState::Ready(classifier) => Some(classifier),
            ClassifierState::Unavailable { .. } => None,
        }
    }
}

impl fmt::Debug for ClassifierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierState::Ready(classifier) => {
                f.debug_tuple("Ready").field(&classifier.name()).finish()
            }
            ClassifierState::Unavailable { attempts } => f
                .debug_struct("Unavailable")
                .field("attempts", attempts)
                .finish(),
        }
    }
}
