//! Batch scoring pipeline.
//!
//! Per transaction: gas rules first (never fail), then feature extraction
//! and the classifier, then blending and labelling. Any item-level failure
//! yields [`RiskVerdict::failed`] for that item only; the batch always
//! returns exactly one verdict per input, in input order.

use crate::error::{ClassifierError, ItemError, PipelineError};
use crate::feature_extractor::{BatchContext, FeatureExtractor};
use crate::metrics::PipelineMetrics;
use crate::models::blender::ScoreBlender;
use crate::models::classifier::{ClassProbabilities, ClassifierState, FraudClassifier};
use crate::rules::{self, GasRuleOutcome};
use crate::types::request::BatchResponse;
use crate::types::transaction::Transaction;
use crate::types::verdict::{round_to, RiskVerdict};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Full breakdown of one successfully scored transaction
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTransaction {
    pub gas: GasRuleOutcome,
    pub probabilities: ClassProbabilities,
    /// Classifier risk on the 0-100 scale
    pub ml_risk: f64,
    /// Blended risk before verdict rounding
    pub blended_risk: f64,
    pub verdict: RiskVerdict,
}

pub struct ScoringPipeline {
    classifier: ClassifierState,
    extractor: FeatureExtractor,
    blender: ScoreBlender,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl ScoringPipeline {
    pub fn new(classifier: ClassifierState) -> Self {
        Self {
            classifier,
            extractor: FeatureExtractor::new(),
            blender: ScoreBlender::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.is_ready()
    }

    pub fn classifier_name(&self) -> Option<&str> {
        self.classifier.classifier().map(|c| c.name())
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Score a batch of transactions.
    ///
    /// Fails as a whole only when the classifier is unavailable, before any
    /// transaction is looked at.
    pub fn score_batch(&self, transactions: &[Transaction]) -> Result<BatchResponse, PipelineError> {
        let Some(classifier) = self.classifier.classifier() else {
            warn!(size = transactions.len(), "Rejecting batch, classifier not loaded");
            return Err(PipelineError::ClassifierUnavailable);
        };

        let batch_id = Uuid::new_v4();
        let span = info_span!("score_batch", %batch_id, size = transactions.len());
        let _guard = span.enter();
        info!("Analyzing {} transactions", transactions.len());

        let context = BatchContext::new(transactions);
        let mut results = Vec::with_capacity(transactions.len());

        for (index, tx) in transactions.iter().enumerate() {
            let start_time = Instant::now();

            let verdict = match self.score_with(classifier.as_ref(), tx, Some(&context)) {
                Ok(scored) => {
                    debug!(
                        index = index,
                        gas_price_gwei = scored.gas.gas_price_gwei,
                        gas_risk = scored.gas.risk_score,
                        gas_bucket = %scored.gas.bucket,
                        ml_risk = scored.ml_risk,
                        risk_score = scored.verdict.risk_score,
                        is_fraudulent = scored.verdict.is_fraudulent,
                        "Transaction scored"
                    );
                    scored.verdict
                }
                Err(e) => {
                    warn!(
                        index = index,
                        hash = tx.hash().unwrap_or_default(),
                        error = %e,
                        "Transaction analysis failed"
                    );
                    RiskVerdict::failed()
                }
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_transaction(start_time.elapsed(), &verdict);
            }
            results.push(verdict);
        }

        let failed = results.iter().filter(|v| v.is_failed()).count();
        let fraudulent = results.iter().filter(|v| v.is_fraudulent).count();
        info!(
            total = results.len(),
            failed = failed,
            fraudulent = fraudulent,
            "Batch complete"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_batch();
        }

        Ok(BatchResponse::new(results))
    }

    /// Score one transaction, optionally against the batch it belongs to.
    pub fn score_transaction(
        &self,
        tx: &Transaction,
        context: Option<&BatchContext<'_>>,
    ) -> Result<ScoredTransaction, ItemError> {
        let classifier = self
            .classifier
            .classifier()
            .ok_or(ClassifierError::Unavailable)?;
        self.score_with(classifier.as_ref(), tx, context)
    }

    fn score_with(
        &self,
        classifier: &dyn FraudClassifier,
        tx: &Transaction,
        context: Option<&BatchContext<'_>>,
    ) -> Result<ScoredTransaction, ItemError> {
        let gas = rules::evaluate(tx);

        let features = self.extractor.extract(tx, context)?;
        let probabilities = classifier.predict_proba(&features)?;
        let ml_risk = probabilities.ml_risk();

        let blended_risk = round_to(
            self.blender
                .blend(ml_risk, gas.risk_score, gas.gas_price_gwei),
            2,
        );
        let verdict = RiskVerdict::scored(blended_risk, probabilities.confidence());

        Ok(ScoredTransaction {
            gas,
            probabilities,
            ml_risk,
            blended_risk,
            verdict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::{Feature, FeatureVector};
    use crate::types::verdict::AnomalyType;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    /// Returns a fixed fraud probability and remembers what it was shown.
    struct FixedClassifier {
        positive: f64,
        seen: Mutex<Vec<FeatureVector>>,
    }

    impl FixedClassifier {
        fn new(positive: f64) -> Self {
            Self {
                positive,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl FraudClassifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn predict_proba(
            &self,
            features: &FeatureVector,
        ) -> Result<ClassProbabilities, ClassifierError> {
            self.seen.lock().unwrap().push(*features);
            ClassProbabilities::from_positive(self.positive)
        }
    }

    struct FailingClassifier;

    impl FraudClassifier for FailingClassifier {
        fn name(&self) -> &str {
            "failing"
        }

        fn predict_proba(&self, _: &FeatureVector) -> Result<ClassProbabilities, ClassifierError> {
            Err(ClassifierError::Inference("session crashed".to_string()))
        }
    }

    fn gwei(tx: Transaction, gwei: u128) -> Transaction {
        tx.with_gas_price_wei(gwei * 1_000_000_000)
    }

    #[test]
    fn test_sample_scenario() {
        let pipeline = ScoringPipeline::new(ClassifierState::ready(FixedClassifier::new(0.1)));

        let scored = pipeline
            .score_transaction(&Transaction::sample(), None)
            .unwrap();

        assert_eq!(scored.gas.risk_score, 15.0);
        assert_eq!(scored.ml_risk, 10.0);
        assert_eq!(scored.verdict.risk_score, 12.0);
        assert_eq!(scored.verdict.anomaly_type, AnomalyType::Safe);
        assert!(!scored.verdict.is_fraudulent);
        assert_eq!(scored.verdict.confidence, 0.9);
    }

    #[test]
    fn test_high_gas_is_not_diluted_by_model() {
        let pipeline = ScoringPipeline::new(ClassifierState::ready(FixedClassifier::new(0.02)));
        let tx = gwei(Transaction::sample(), 1_000);

        let scored = pipeline.score_transaction(&tx, None).unwrap();
        assert_eq!(scored.verdict.risk_score, 95.0);
        assert!(scored.verdict.is_fraudulent);
        assert_eq!(scored.verdict.anomaly_type, AnomalyType::CriticalFraudAlert);
    }

    #[test]
    fn test_unavailable_classifier_rejects_batch() {
        let pipeline = ScoringPipeline::new(ClassifierState::Unavailable { attempts: vec![] });

        assert!(!pipeline.is_ready());
        assert!(matches!(
            pipeline.score_batch(&[Transaction::sample()]),
            Err(PipelineError::ClassifierUnavailable)
        ));
        assert!(matches!(
            pipeline.score_transaction(&Transaction::sample(), None),
            Err(ItemError::Classifier(ClassifierError::Unavailable))
        ));
    }

    #[test]
    fn test_classifier_failure_is_isolated_per_item() {
        let pipeline = ScoringPipeline::new(ClassifierState::ready(FailingClassifier));
        let batch = vec![Transaction::sample(), Transaction::sample()];

        let response = pipeline.score_batch(&batch).unwrap();
        assert_eq!(response.total_analyzed, 2);
        assert!(response.results.iter().all(RiskVerdict::is_failed));
    }

    #[test]
    fn test_classifier_receives_batch_features() {
        let classifier = Arc::new(FixedClassifier::new(0.5));
        let pipeline = ScoringPipeline::new(ClassifierState::Ready(classifier.clone()));
        let a = Transaction::sample();
        let mut b = Transaction::sample().with_timestamp(1_761_752_625);
        b.hash = Some(serde_json::json!("0xsecond"));

        pipeline.score_batch(&[a, b]).unwrap();

        let seen = classifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0][Feature::FromCount], 2.0);
        assert_eq!(seen[1][Feature::TimeSinceLast], 600.0);
        assert_eq!(seen[1][Feature::SenderAge], 600.0);
    }

    #[test]
    fn test_metrics_are_recorded() {
        let metrics = Arc::new(PipelineMetrics::new());
        let pipeline = ScoringPipeline::new(ClassifierState::ready(FixedClassifier::new(0.1)))
            .with_metrics(metrics.clone());
        let mut bad = Transaction::sample();
        bad.block_number = Some(serde_json::json!("latest"));

        pipeline.score_batch(&[Transaction::sample(), bad]).unwrap();

        assert_eq!(metrics.batches_processed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.transactions_processed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.transactions_failed.load(Ordering::Relaxed), 1);
    }
}
