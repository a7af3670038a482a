//! Runtime counters for the scoring service.
//!
//! Counters are lock-free; latency samples and label counts sit behind
//! `RwLock`s and are only read when a snapshot is taken.

use crate::types::verdict::{AnomalyType, RiskVerdict};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept for percentile estimates.
const LATENCY_WINDOW: usize = 10_000;

/// Width of one risk histogram bucket, in risk points.
const BUCKET_WIDTH: f64 = 10.0;

pub struct PipelineMetrics {
    /// Batches scored to completion
    pub batches_processed: AtomicU64,
    /// Batches refused (classifier unavailable, processing failure, bad payload)
    pub batches_rejected: AtomicU64,
    /// Transactions scored, failed ones included
    pub transactions_processed: AtomicU64,
    pub transactions_failed: AtomicU64,
    pub fraudulent_verdicts: AtomicU64,
    verdicts_by_label: RwLock<HashMap<AnomalyType, u64>>,
    /// Most recent per-transaction latencies, in microseconds
    latencies_us: RwLock<VecDeque<u64>>,
    risk_histogram: [AtomicU64; 10],
    started: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            batches_processed: AtomicU64::new(0),
            batches_rejected: AtomicU64::new(0),
            transactions_processed: AtomicU64::new(0),
            transactions_failed: AtomicU64::new(0),
            fraudulent_verdicts: AtomicU64::new(0),
            verdicts_by_label: RwLock::new(HashMap::new()),
            latencies_us: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
            risk_histogram: Default::default(),
            started: Instant::now(),
        }
    }

    pub fn record_transaction(&self, elapsed: Duration, verdict: &RiskVerdict) {
        self.transactions_processed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut latencies) = self.latencies_us.write() {
            if latencies.len() == LATENCY_WINDOW {
                latencies.pop_front();
            }
            latencies.push_back(elapsed.as_micros() as u64);
        }

        if let Ok(mut by_label) = self.verdicts_by_label.write() {
            *by_label.entry(verdict.anomaly_type).or_default() += 1;
        }

        if verdict.is_failed() {
            self.transactions_failed.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if verdict.is_fraudulent {
            self.fraudulent_verdicts.fetch_add(1, Ordering::Relaxed);
        }

        let bucket = ((verdict.risk_score / BUCKET_WIDTH) as usize).min(self.risk_histogram.len() - 1);
        self.risk_histogram[bucket].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_batch(&self) {
        self.batches_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn latency_stats(&self) -> LatencyStats {
        let mut samples: Vec<u64> = match self.latencies_us.read() {
            Ok(latencies) => latencies.iter().copied().collect(),
            Err(_) => return LatencyStats::default(),
        };
        LatencyStats::from_samples(&mut samples)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let transactions = self.transactions_processed.load(Ordering::Relaxed);
        let uptime = self.started.elapsed();
        let throughput = match uptime.as_secs_f64() {
            secs if secs > 0.0 => transactions as f64 / secs,
            _ => 0.0,
        };

        MetricsSnapshot {
            uptime,
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            batches_rejected: self.batches_rejected.load(Ordering::Relaxed),
            transactions,
            failed: self.transactions_failed.load(Ordering::Relaxed),
            fraudulent: self.fraudulent_verdicts.load(Ordering::Relaxed),
            throughput,
            latency: self.latency_stats(),
            by_label: self
                .verdicts_by_label
                .read()
                .map(|m| m.clone())
                .unwrap_or_default(),
            risk_histogram: std::array::from_fn(|i| self.risk_histogram[i].load(Ordering::Relaxed)),
        }
    }

    /// Log a snapshot at info level
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();

        info!(
            uptime_secs = snapshot.uptime.as_secs(),
            batches = snapshot.batches_processed,
            rejected = snapshot.batches_rejected,
            transactions = snapshot.transactions,
            failed = snapshot.failed,
            fraudulent = snapshot.fraudulent,
            fraud_rate_pct = format!("{:.1}", snapshot.fraud_rate() * 100.0),
            throughput = format!("{:.1} tx/s", snapshot.throughput),
            "Scoring summary"
        );
        info!(
            mean_us = snapshot.latency.mean_us,
            p50_us = snapshot.latency.p50_us,
            p95_us = snapshot.latency.p95_us,
            p99_us = snapshot.latency.p99_us,
            max_us = snapshot.latency.max_us,
            "Per-transaction latency"
        );
        for (label, count) in &snapshot.by_label {
            info!(label = %label, count = count, "Verdicts by label");
        }
        info!(histogram = ?snapshot.risk_histogram, "Risk score distribution (10-point buckets)");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LatencyStats {
    pub samples: usize,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencyStats {
    fn from_samples(samples: &mut [u64]) -> Self {
        let Some(&max_us) = samples.iter().max() else {
            return Self::default();
        };
        samples.sort_unstable();

        let n = samples.len();
        let percentile = |p: f64| samples[((n as f64 * p) as usize).min(n - 1)];

        Self {
            samples: n,
            mean_us: samples.iter().sum::<u64>() / n as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us,
        }
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub batches_processed: u64,
    pub batches_rejected: u64,
    pub transactions: u64,
    pub failed: u64,
    pub fraudulent: u64,
    /// Transactions per second since start
    pub throughput: f64,
    pub latency: LatencyStats,
    pub by_label: HashMap<AnomalyType, u64>,
    /// Scored (non-failed) verdicts per 10-point risk bucket
    pub risk_histogram: [u64; 10],
}

impl MetricsSnapshot {
    pub fn fraud_rate(&self) -> f64 {
        if self.transactions == 0 {
            0.0
        } else {
            self.fraudulent as f64 / self.transactions as f64
        }
    }
}

/// Logs a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    /// `interval_secs` must be non-zero
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    pub async fn start(self) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_outcome() {
        let metrics = PipelineMetrics::new();

        metrics.record_transaction(Duration::from_micros(100), &RiskVerdict::scored(12.0, 0.9));
        metrics.record_transaction(Duration::from_micros(200), &RiskVerdict::scored(91.0, 0.8));
        metrics.record_transaction(Duration::from_micros(50), &RiskVerdict::failed());
        metrics.record_batch();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transactions, 3);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.fraudulent, 1);
        assert_eq!(snapshot.batches_processed, 1);
        assert_eq!(snapshot.by_label.get(&AnomalyType::Safe), Some(&1));
        assert_eq!(snapshot.by_label.get(&AnomalyType::AnalysisFailed), Some(&1));
        assert!((snapshot.fraud_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_excludes_failures() {
        let metrics = PipelineMetrics::new();

        metrics.record_transaction(Duration::from_micros(10), &RiskVerdict::scored(100.0, 1.0));
        metrics.record_transaction(Duration::from_micros(10), &RiskVerdict::scored(5.0, 1.0));
        metrics.record_transaction(Duration::from_micros(10), &RiskVerdict::failed());

        let histogram = metrics.snapshot().risk_histogram;
        assert_eq!(histogram[9], 1);
        assert_eq!(histogram[0], 1);
        assert_eq!(histogram.iter().sum::<u64>(), 2);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.latency_stats(), LatencyStats::default());

        for us in [400, 100, 300, 200] {
            metrics.record_transaction(Duration::from_micros(us), &RiskVerdict::scored(40.0, 0.6));
        }

        let stats = metrics.latency_stats();
        assert_eq!(stats.samples, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.p50_us, 300);
        assert_eq!(stats.max_us, 400);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let metrics = PipelineMetrics::new();
        for _ in 0..LATENCY_WINDOW + 5 {
            metrics.record_transaction(Duration::from_micros(1), &RiskVerdict::scored(1.0, 1.0));
        }
        assert_eq!(metrics.latency_stats().samples, LATENCY_WINDOW);
    }
}
