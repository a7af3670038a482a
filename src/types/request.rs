//! Request and response bodies exchanged with callers of the pipeline

use crate::error::PipelineError;
use crate::types::transaction::Transaction;
use crate::types::verdict::RiskVerdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub transactions: Vec<Transaction>,
}

/// Verdicts for a batch, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<RiskVerdict>,
    pub total_analyzed: usize,
}

impl BatchResponse {
    pub fn new(results: Vec<RiskVerdict>) -> Self {
        Self {
            total_analyzed: results.len(),
            results,
        }
    }
}

/// Batch-level failure reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// The request body could not be decoded
    pub fn invalid_payload(err: &serde_json::Error) -> Self {
        Self::new(422, format!("invalid request payload: {err}"))
    }
}

impl From<&PipelineError> for ErrorResponse {
    fn from(err: &PipelineError) -> Self {
        Self::new(err.status_code(), err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" with a loaded classifier, "degraded" otherwise
    pub status: String,
    pub model_loaded: bool,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn new(model_loaded: bool) -> Self {
        Self {
            status: if model_loaded { "healthy" } else { "degraded" }.to_string(),
            model_loaded,
            timestamp: Utc::now(),
        }
    }
}

/// Human-readable description of the gas buckets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasRulesInfo {
    pub safe: String,
    pub suspicious: String,
    pub fraudulent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub model_type: String,
    pub features_expected: usize,
    pub feature_names: Vec<String>,
    pub gas_price_rules: GasRulesInfo,
}
