//! Request handling around the scoring pipeline.
//!
//! Decodes request payloads, scores batches off the async runtime, and maps
//! batch-level failures to error replies.

use crate::consumer::RequestConsumer;
use crate::error::PipelineError;
use crate::metrics::PipelineMetrics;
use crate::pipeline::ScoringPipeline;
use crate::producer::ReplyPublisher;
use crate::rules::{GAS_SAFE_THRESHOLD, GAS_SUSPICIOUS_THRESHOLD};
use crate::types::request::{
    BatchRequest, BatchResponse, ErrorResponse, GasRulesInfo, HealthResponse, ModelInfoResponse,
};
use crate::types::transaction::Transaction;
use anyhow::Result;
use futures::StreamExt;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Request subjects served by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    PredictBatch,
    Health,
    ModelInfo,
    TestPredict,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Endpoint::PredictBatch => "predict_batch",
            Endpoint::Health => "health",
            Endpoint::ModelInfo => "model_info",
            Endpoint::TestPredict => "test_predict",
        };
        f.write_str(name)
    }
}

/// Reply body for any endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Batch(BatchResponse),
    Health(HealthResponse),
    ModelInfo(ModelInfoResponse),
    Error(ErrorResponse),
}

impl From<Result<BatchResponse, ErrorResponse>> for Reply {
    fn from(result: Result<BatchResponse, ErrorResponse>) -> Self {
        match result {
            Ok(response) => Reply::Batch(response),
            Err(err) => Reply::Error(err),
        }
    }
}

/// Subjects to subscribe to, one per endpoint
#[derive(Debug, Clone)]
pub struct Subjects {
    pub predict_batch: String,
    pub health: String,
    pub model_info: String,
    pub test_predict: String,
}

impl From<&crate::config::NatsConfig> for Subjects {
    fn from(config: &crate::config::NatsConfig) -> Self {
        Self {
            predict_batch: config.predict_subject.clone(),
            health: config.health_subject.clone(),
            model_info: config.model_info_subject.clone(),
            test_predict: config.test_predict_subject.clone(),
        }
    }
}

pub struct RiskService {
    pipeline: Arc<ScoringPipeline>,
    metrics: Arc<PipelineMetrics>,
}

impl RiskService {
    pub fn new(pipeline: Arc<ScoringPipeline>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { pipeline, metrics }
    }

    /// Handle one request payload for `endpoint`.
    pub async fn handle(&self, endpoint: Endpoint, payload: &[u8]) -> Reply {
        match endpoint {
            Endpoint::PredictBatch => self.predict_batch(payload).await.into(),
            Endpoint::Health => Reply::Health(self.health()),
            Endpoint::ModelInfo => match self.model_info() {
                Some(info) => Reply::ModelInfo(info),
                None => Reply::Error(ErrorResponse::from(&PipelineError::ClassifierUnavailable)),
            },
            Endpoint::TestPredict => self.score(vec![Transaction::sample()]).await.into(),
        }
    }

    /// Decode a `{"transactions": [...]}` body and score it.
    pub async fn predict_batch(&self, payload: &[u8]) -> Result<BatchResponse, ErrorResponse> {
        let request: BatchRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Failed to deserialize batch request");
                self.metrics.record_rejected_batch();
                return Err(ErrorResponse::invalid_payload(&e));
            }
        };
        self.score(request.transactions).await
    }

    /// Score a batch on the blocking pool.
    async fn score(&self, transactions: Vec<Transaction>) -> Result<BatchResponse, ErrorResponse> {
        let pipeline = self.pipeline.clone();
        let outcome = tokio::task::spawn_blocking(move || pipeline.score_batch(&transactions))
            .await
            .unwrap_or_else(|join_err| Err(PipelineError::BatchProcessing(join_err.to_string())));

        outcome.map_err(|err| {
            match &err {
                PipelineError::ClassifierUnavailable => warn!("Batch rejected: {}", err),
                PipelineError::BatchProcessing(_) => error!(error = %err, "Batch error"),
            }
            self.metrics.record_rejected_batch();
            ErrorResponse::from(&err)
        })
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse::new(self.pipeline.is_ready())
    }

    /// `None` when no classifier is loaded
    pub fn model_info(&self) -> Option<ModelInfoResponse> {
        let model_type = self.pipeline.classifier_name()?.to_string();
        let extractor = self.pipeline.extractor();

        Some(ModelInfoResponse {
            model_type,
            features_expected: extractor.feature_count(),
            feature_names: extractor
                .feature_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            gas_price_rules: GasRulesInfo {
                safe: format!("< {GAS_SAFE_THRESHOLD} Gwei"),
                suspicious: format!("{GAS_SAFE_THRESHOLD}-{GAS_SUSPICIOUS_THRESHOLD} Gwei"),
                fraudulent: format!("> {GAS_SUSPICIOUS_THRESHOLD} Gwei"),
            },
        })
    }

    /// Serve requests until every subscription closes.
    ///
    /// At most `workers` requests are handled at the same time.
    pub async fn run(
        self: Arc<Self>,
        consumer: &RequestConsumer,
        publisher: ReplyPublisher,
        subjects: &Subjects,
        workers: usize,
    ) -> Result<()> {
        let routes = [
            (Endpoint::PredictBatch, &subjects.predict_batch),
            (Endpoint::Health, &subjects.health),
            (Endpoint::ModelInfo, &subjects.model_info),
            (Endpoint::TestPredict, &subjects.test_predict),
        ];

        let mut streams = Vec::with_capacity(routes.len());
        for (endpoint, subject) in routes {
            let subscriber = consumer.subscribe(subject).await?;
            streams.push(subscriber.map(move |message| (endpoint, message)).boxed());
        }
        let mut requests = futures::stream::select_all(streams);

        let semaphore = Arc::new(Semaphore::new(workers));
        info!(workers = workers, "Serving scoring requests");

        while let Some((endpoint, message)) = requests.next().await {
            let permit = semaphore.clone().acquire_owned().await?;
            let service = self.clone();
            let publisher = publisher.clone();

            tokio::spawn(async move {
                let reply = service.handle(endpoint, &message.payload).await;
                if let Err(e) = publisher.reply(&message, &reply).await {
                    error!(endpoint = %endpoint, error = %e, "Failed to publish reply");
                }
                drop(permit);
            });
        }

        wait_for_in_flight(&semaphore, workers).await?;
        publisher.flush().await?;
        info!("Request subscriptions closed");
        Ok(())
    }
}

/// Wait until every one of `permits` is back, i.e. no spawned request
/// handler still holds one.
async fn wait_for_in_flight(semaphore: &Semaphore, permits: usize) -> Result<()> {
    let _all = semaphore.acquire_many(u32::try_from(permits)?).await?;
    Ok(())
}
