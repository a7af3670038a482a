//! Risk verdict data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Final risk score at or above which a transaction is flagged fraudulent.
///
/// Kept independent from the `HighRisk` label boundary.
pub const FRAUD_THRESHOLD: f64 = 70.0;

/// Ordinal anomaly label derived from the final risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyType {
    #[serde(rename = "Safe")]
    Safe,
    #[serde(rename = "Low Risk")]
    LowRisk,
    #[serde(rename = "Suspicious Activity")]
    SuspiciousActivity,
    #[serde(rename = "High Risk")]
    HighRisk,
    #[serde(rename = "Critical Fraud Alert")]
    CriticalFraudAlert,
    /// Scoring of the transaction failed
    #[serde(rename = "Analysis Failed")]
    AnalysisFailed,
}

impl AnomalyType {
    /// Determine the label for a risk score on the 0-100 scale
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            AnomalyType::Safe
        } else if score < 50.0 {
            AnomalyType::LowRisk
        } else if score < 70.0 {
            AnomalyType::SuspiciousActivity
        } else if score < 85.0 {
            AnomalyType::HighRisk
        } else {
            AnomalyType::CriticalFraudAlert
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::Safe => "Safe",
            AnomalyType::LowRisk => "Low Risk",
            AnomalyType::SuspiciousActivity => "Suspicious Activity",
            AnomalyType::HighRisk => "High Risk",
            AnomalyType::CriticalFraudAlert => "Critical Fraud Alert",
            AnomalyType::AnalysisFailed => "Analysis Failed",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scoring outcome for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskVerdict {
    /// Final risk score (0 - 100, two decimals)
    pub risk_score: f64,

    /// `risk_score >= FRAUD_THRESHOLD`
    pub is_fraudulent: bool,

    pub anomaly_type: AnomalyType,

    /// Highest class probability reported by the classifier (four decimals)
    pub confidence: f64,
}

impl RiskVerdict {
    /// Build a verdict from a blended risk score and classifier confidence.
    pub fn scored(risk_score: f64, confidence: f64) -> Self {
        let risk_score = round_to(risk_score.clamp(0.0, 100.0), 2);

        Self {
            risk_score,
            is_fraudulent: risk_score >= FRAUD_THRESHOLD,
            anomaly_type: AnomalyType::from_score(risk_score),
            confidence: round_to(confidence.clamp(0.0, 1.0), 4),
        }
    }

    /// Degraded verdict for a transaction that could not be scored
    pub fn failed() -> Self {
        Self {
            risk_score: 0.0,
            is_fraudulent: false,
            anomaly_type: AnomalyType::AnalysisFailed,
            confidence: 0.0,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.anomaly_type == AnomalyType::AnalysisFailed
    }
}

/// Round to `decimals` places, correctly rounded from the exact binary value.
///
/// Scaling by a power of ten first would round twice: 35.315 is stored as
/// 35.31499.. and must come out as 35.31.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{value:.decimals$}").parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_type_from_score() {
        assert_eq!(AnomalyType::from_score(0.0), AnomalyType::Safe);
        assert_eq!(AnomalyType::from_score(29.99), AnomalyType::Safe);
        assert_eq!(AnomalyType::from_score(30.0), AnomalyType::LowRisk);
        assert_eq!(AnomalyType::from_score(50.0), AnomalyType::SuspiciousActivity);
        assert_eq!(AnomalyType::from_score(69.99), AnomalyType::SuspiciousActivity);
        assert_eq!(AnomalyType::from_score(70.0), AnomalyType::HighRisk);
        assert_eq!(AnomalyType::from_score(84.99), AnomalyType::HighRisk);
        assert_eq!(AnomalyType::from_score(85.0), AnomalyType::CriticalFraudAlert);
        assert_eq!(AnomalyType::from_score(100.0), AnomalyType::CriticalFraudAlert);
    }

    #[test]
    fn test_fraud_flag_at_threshold() {
        assert!(!RiskVerdict::scored(69.99, 0.9).is_fraudulent);
        assert!(RiskVerdict::scored(70.0, 0.9).is_fraudulent);
    }

    #[test]
    fn test_scored_rounds_and_clamps() {
        let verdict = RiskVerdict::scored(54.123_456, 0.876_543_21);
        assert_eq!(verdict.risk_score, 54.12);
        assert_eq!(verdict.confidence, 0.8765);

        assert_eq!(RiskVerdict::scored(140.0, 1.0).risk_score, 100.0);
        assert_eq!(RiskVerdict::scored(-3.0, 1.0).risk_score, 0.0);
    }

    #[test]
    fn test_rounding_uses_stored_value() {
        assert_eq!(round_to(35.315, 2), 35.31);
        assert_eq!(round_to(69.994_999_999_999_99, 2), 69.99);
        assert_eq!(round_to(49.995, 2), 49.99);
        assert_eq!(round_to(0.500_45, 4), 0.5004);
        assert_eq!(round_to(12.0, 2), 12.0);
        assert_eq!(round_to(-3.146, 2), -3.15);
    }

    #[test]
    fn test_failed_verdict() {
        let verdict = RiskVerdict::failed();
        assert!(verdict.is_failed());
        assert_eq!(verdict.risk_score, 0.0);
        assert!(!verdict.is_fraudulent);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn test_verdict_serialization() {
        let json = serde_json::to_value(RiskVerdict::scored(88.0, 0.95)).unwrap();

        assert_eq!(json["anomaly_type"], "Critical Fraud Alert");
        assert_eq!(json["is_fraudulent"], true);
        assert_eq!(json["risk_score"], 88.0);

        let failed = serde_json::to_value(RiskVerdict::failed()).unwrap();
        assert_eq!(failed["anomaly_type"], "Analysis Failed");
    }
}
