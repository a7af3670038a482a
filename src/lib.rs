//! Transaction Risk Pipeline Library
//!
//! Scores blockchain transactions for fraud risk by combining deterministic
//! gas-price rules with the probability output of a pre-trained classifier.
//! Batches are scored item by item; a transaction that cannot be scored gets
//! a failed verdict without affecting the rest of its batch.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod rules;
pub mod service;
pub mod types;

pub use config::AppConfig;
pub use error::{ClassifierError, FeatureError, ItemError, PipelineError};
pub use feature_extractor::{BatchContext, Feature, FeatureExtractor, FeatureVector};
pub use models::classifier::{ClassProbabilities, ClassifierState, FraudClassifier};
pub use pipeline::ScoringPipeline;
pub use types::{transaction::Transaction, verdict::AnomalyType, verdict::RiskVerdict};
