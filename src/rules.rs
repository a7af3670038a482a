//! Gas-price rules, the primary risk signal.
//!
//! Pure threshold logic on the gas price in Gwei. Reading the gas price never
//! fails: anything unreadable counts as 0 Gwei.

use crate::types::transaction::{Transaction, WEI_PER_GWEI};
use std::fmt;

/// Below this price (Gwei) a transaction is in the safe bucket.
pub const GAS_SAFE_THRESHOLD: f64 = 100.0;

/// Above this price (Gwei) a transaction is in the fraudulent bucket.
pub const GAS_SUSPICIOUS_THRESHOLD: f64 = 300.0;

/// Gwei above the suspicious threshold beyond which risk stops increasing.
pub const GAS_EXCESS_CAP: f64 = 500.0;

pub const GAS_MAX_RISK: f64 = 95.0;

const SAFE_RISK: f64 = 15.0;
const SUSPICIOUS_BASE_RISK: f64 = 50.0;
const SUSPICIOUS_RISK_SPAN: f64 = 20.0;
const FRAUDULENT_BASE_RISK: f64 = 75.0;
const FRAUDULENT_RISK_SPAN: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GasBucket {
    Safe,
    Suspicious,
    Fraudulent,
}

impl GasBucket {
    pub fn for_price(gas_price_gwei: f64) -> Self {
        if gas_price_gwei < GAS_SAFE_THRESHOLD {
            GasBucket::Safe
        } else if gas_price_gwei <= GAS_SUSPICIOUS_THRESHOLD {
            GasBucket::Suspicious
        } else {
            GasBucket::Fraudulent
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GasBucket::Safe => "Safe (Low Gas Price)",
            GasBucket::Suspicious => "Suspicious (Medium Gas Price)",
            GasBucket::Fraudulent => "Fraudulent (High Gas Price)",
        }
    }
}

impl fmt::Display for GasBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of the gas rules for one transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasRuleOutcome {
    pub gas_price_gwei: f64,
    /// Rule risk on the 0-100 scale
    pub risk_score: f64,
    pub is_fraudulent: bool,
    pub bucket: GasBucket,
}

/// Gas price in Gwei, or 0.0 when it is missing or unusable.
pub fn gas_price_gwei(tx: &Transaction) -> f64 {
    match tx.gas_price_wei() {
        Some(wei) if wei.is_finite() && wei >= 0.0 => wei / WEI_PER_GWEI,
        _ => 0.0,
    }
}

pub fn apply_gas_rules(gas_price_gwei: f64) -> GasRuleOutcome {
    let bucket = GasBucket::for_price(gas_price_gwei);

    let risk_score = match bucket {
        GasBucket::Safe => SAFE_RISK,
        GasBucket::Suspicious => {
            let position = (gas_price_gwei - GAS_SAFE_THRESHOLD)
                / (GAS_SUSPICIOUS_THRESHOLD - GAS_SAFE_THRESHOLD);
            SUSPICIOUS_BASE_RISK + position * SUSPICIOUS_RISK_SPAN
        }
        GasBucket::Fraudulent => {
            let excess = (gas_price_gwei - GAS_SUSPICIOUS_THRESHOLD).min(GAS_EXCESS_CAP);
            (FRAUDULENT_BASE_RISK + (excess / GAS_EXCESS_CAP) * FRAUDULENT_RISK_SPAN)
                .min(GAS_MAX_RISK)
        }
    };

    GasRuleOutcome {
        gas_price_gwei,
        risk_score,
        is_fraudulent: bucket == GasBucket::Fraudulent,
        bucket,
    }
}

/// Read the gas price of `tx` and apply the rules to it.
pub fn evaluate(tx: &Transaction) -> GasRuleOutcome {
    apply_gas_rules(gas_price_gwei(tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_bucket_boundaries() {
        let below = apply_gas_rules(99.999);
        assert_eq!(below.bucket, GasBucket::Safe);
        assert_eq!(below.risk_score, 15.0);
        assert!(!below.is_fraudulent);

        let at_safe = apply_gas_rules(100.0);
        assert_eq!(at_safe.bucket, GasBucket::Suspicious);
        assert_eq!(at_safe.risk_score, 50.0);

        let at_suspicious = apply_gas_rules(300.0);
        assert_eq!(at_suspicious.bucket, GasBucket::Suspicious);
        assert_eq!(at_suspicious.risk_score, 70.0);
        assert!(!at_suspicious.is_fraudulent);

        let above = apply_gas_rules(300.01);
        assert_eq!(above.bucket, GasBucket::Fraudulent);
        assert!(above.risk_score > 75.0);
        assert!(above.is_fraudulent);
    }

    #[test]
    fn test_suspicious_interpolation() {
        assert!((apply_gas_rules(150.0).risk_score - 55.0).abs() < 1e-9);
        assert!((apply_gas_rules(200.0).risk_score - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_fraudulent_risk_is_capped() {
        assert!((apply_gas_rules(350.0).risk_score - 77.0).abs() < 1e-9);
        assert_eq!(apply_gas_rules(800.0).risk_score, 95.0);
        assert_eq!(apply_gas_rules(50_000.0).risk_score, 95.0);
    }

    #[test]
    fn test_labels() {
        assert_eq!(apply_gas_rules(10.0).bucket.label(), "Safe (Low Gas Price)");
        assert_eq!(
            apply_gas_rules(120.0).bucket.to_string(),
            "Suspicious (Medium Gas Price)"
        );
        assert_eq!(
            apply_gas_rules(1_000.0).bucket.label(),
            "Fraudulent (High Gas Price)"
        );
    }

    #[test]
    fn test_gas_price_conversion() {
        let tx = Transaction::sample();
        assert_eq!(gas_price_gwei(&tx), 50.0);
    }

    #[test]
    fn test_malformed_gas_price_fails_open() {
        for raw in [json!("fast"), json!({"wei": 1}), json!(-5), json!("NaN")] {
            let mut tx = Transaction::sample();
            tx.gas_price = Some(raw);

            let outcome = evaluate(&tx);
            assert_eq!(outcome.gas_price_gwei, 0.0);
            assert_eq!(outcome.bucket, GasBucket::Safe);
            assert_eq!(outcome.risk_score, 15.0);
        }
    }

    proptest! {
        #[test]
        fn gas_risk_stays_in_rule_range(gwei in 0.0f64..100_000.0) {
            let outcome = apply_gas_rules(gwei);
            prop_assert!(outcome.risk_score >= 15.0);
            prop_assert!(outcome.risk_score <= GAS_MAX_RISK);
            prop_assert_eq!(outcome.is_fraudulent, gwei > GAS_SUSPICIOUS_THRESHOLD);
        }
    }
}
