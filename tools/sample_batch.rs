//! Sample Batch Producer
//!
//! Generates synthetic transaction batches and submits them to the scoring
//! service over NATS request/reply. Falls back to printing batches when no
//! NATS server is reachable.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};
use tx_risk_pipeline::types::{BatchRequest, BatchResponse, Transaction};

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Synthetic explorer-style transactions over a small wallet set
struct BatchGenerator {
    rng: rand::rngs::ThreadRng,
    issued: u64,
    block: u64,
    wallets: Vec<String>,
}

impl BatchGenerator {
    fn new() -> Self {
        let mut rng = rand::thread_rng();
        let wallets = (0..12)
            .map(|_| format!("0x{:040x}", rng.gen::<u128>()))
            .collect();

        Self {
            rng,
            issued: 0,
            block: 28_300_000,
            wallets,
        }
    }

    fn next_base(&mut self) -> Transaction {
        self.issued += 1;
        self.block += self.rng.gen_range(0..3);

        let from = self.wallets.choose(&mut self.rng).cloned().unwrap_or_default();
        let to = self.wallets.choose(&mut self.rng).cloned().unwrap_or_default();
        let timestamp = Utc::now().timestamp() - self.rng.gen_range(0..86_400);

        Transaction::new(&format!("0x{:064x}", self.issued), &from, &to)
            .with_block_number(self.block)
            .with_timestamp(timestamp)
    }

    /// Ordinary transfer at a low gas price
    fn legitimate(&mut self) -> Transaction {
        let value = self.rng.gen_range(1_000_000_000_000_000u128..2_000_000_000_000_000_000);
        let gas = self.rng.gen_range(5..80) * WEI_PER_GWEI;
        self.next_base().with_value_wei(value).with_gas_price_wei(gas)
    }

    /// Transfer priced in the suspicious or fraudulent gas range
    fn suspicious(&mut self) -> Transaction {
        let value = self.rng.gen_range(0u128..50_000_000_000_000_000_000);
        let gas = if self.rng.gen_bool(0.5) {
            self.rng.gen_range(100..=300) * WEI_PER_GWEI
        } else {
            self.rng.gen_range(301..1_500) * WEI_PER_GWEI
        };
        self.next_base().with_value_wei(value).with_gas_price_wei(gas)
    }

    /// Transaction with a field the pipeline cannot read
    fn malformed(&mut self) -> Transaction {
        let mut tx = self.legitimate();
        tx.value = Some(json!("n/a"));
        tx
    }

    fn generate_batch(&mut self, size: usize, fraud_rate: f64) -> Vec<Transaction> {
        (0..size)
            .map(|_| {
                if self.rng.gen_bool(0.02) {
                    self.malformed()
                } else if self.rng.gen_bool(fraud_rate) {
                    self.suspicious()
                } else {
                    self.legitimate()
                }
            })
            .collect()
    }
}

/// Fraction of suspicious transactions, clamped to what `gen_bool` accepts
fn parse_fraud_rate(arg: Option<&str>) -> f64 {
    arg.and_then(|s| s.parse::<f64>().ok())
        .filter(|rate| rate.is_finite())
        .map_or(0.1, |rate| rate.clamp(0.0, 1.0))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_batch=info".parse()?),
        )
        .init();

    info!("Starting Sample Batch Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("risk.predict_batch");
    let batches: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10);
    let batch_size: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(20);
    let fraud_rate = parse_fraud_rate(args.get(5).map(String::as_str));
    let delay_ms: u64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(500);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        batches = batches,
        batch_size = batch_size,
        fraud_rate = fraud_rate,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(batches, batch_size, fraud_rate);
        }
    };

    let mut generator = BatchGenerator::new();

    for i in 0..batches {
        let request = BatchRequest {
            transactions: generator.generate_batch(batch_size, fraud_rate),
        };
        let payload = serde_json::to_vec(&request)?;

        let reply = client.request(subject.to_string(), payload.into()).await?;

        match serde_json::from_slice::<BatchResponse>(&reply.payload) {
            Ok(response) => {
                let fraudulent = response.results.iter().filter(|v| v.is_fraudulent).count();
                let failed = response.results.iter().filter(|v| v.is_failed()).count();
                info!(
                    batch = i + 1,
                    analyzed = response.total_analyzed,
                    fraudulent = fraudulent,
                    failed = failed,
                    "Batch scored"
                );
            }
            Err(_) => {
                warn!(
                    batch = i + 1,
                    reply = %String::from_utf8_lossy(&reply.payload),
                    "Batch refused"
                );
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! Submitted {} batches of {}", batches, batch_size);

    Ok(())
}

fn run_dry_mode(batches: u64, batch_size: usize, fraud_rate: f64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = BatchGenerator::new();

    for i in 0..batches {
        let request = BatchRequest {
            transactions: generator.generate_batch(batch_size, fraud_rate),
        };
        let json = serde_json::to_string_pretty(&request)?;
        info!("Sample batch {}:\n{}", i + 1, json);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraud_rate_is_clamped() {
        assert_eq!(parse_fraud_rate(None), 0.1);
        assert_eq!(parse_fraud_rate(Some("0.25")), 0.25);
        assert_eq!(parse_fraud_rate(Some("1.5")), 1.0);
        assert_eq!(parse_fraud_rate(Some("-2")), 0.0);
        assert_eq!(parse_fraud_rate(Some("NaN")), 0.1);
        assert_eq!(parse_fraud_rate(Some("often")), 0.1);
    }

    #[test]
    fn test_batch_with_extreme_fraud_rate() {
        let mut generator = BatchGenerator::new();
        let batch = generator.generate_batch(20, parse_fraud_rate(Some("3")));
        assert_eq!(batch.len(), 20);
    }
}
