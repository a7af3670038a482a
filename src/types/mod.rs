//! Type definitions for the risk scoring pipeline

pub mod request;
pub mod transaction;
pub mod verdict;

pub use request::{BatchRequest, BatchResponse, ErrorResponse, HealthResponse, ModelInfoResponse};
pub use transaction::Transaction;
pub use verdict::{AnomalyType, RiskVerdict};
