//! Blending of the gas-rule risk with the classifier risk

use crate::rules::{GAS_SAFE_THRESHOLD, GAS_SUSPICIOUS_THRESHOLD};

/// Rule and model weights for one gas bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub gas: f64,
    pub model: f64,
}

pub const SUSPICIOUS_GAS_WEIGHTS: BlendWeights = BlendWeights {
    gas: 0.7,
    model: 0.3,
};

pub const SAFE_GAS_WEIGHTS: BlendWeights = BlendWeights {
    gas: 0.4,
    model: 0.6,
};

/// Combines the rule risk and the model risk into one final risk score.
///
/// Gas price is the primary signal. The model only outweighs the rule when
/// the gas price is low, and can never pull a high-gas verdict down.
#[derive(Debug, Clone)]
pub struct ScoreBlender {
    suspicious: BlendWeights,
    safe: BlendWeights,
}

impl ScoreBlender {
    pub fn new() -> Self {
        Self {
            suspicious: SUSPICIOUS_GAS_WEIGHTS,
            safe: SAFE_GAS_WEIGHTS,
        }
    }

    /// Blend `ml_risk` and `gas_risk` (both 0-100) for a gas price in Gwei.
    pub fn blend(&self, ml_risk: f64, gas_risk: f64, gas_price_gwei: f64) -> f64 {
        let blended = if gas_price_gwei > GAS_SUSPICIOUS_THRESHOLD {
            gas_risk.max(ml_risk)
        } else if gas_price_gwei >= GAS_SAFE_THRESHOLD {
            Self::weighted(gas_risk, ml_risk, self.suspicious)
        } else {
            Self::weighted(gas_risk, ml_risk, self.safe)
        };

        blended.clamp(0.0, 100.0)
    }

    fn weighted(gas_risk: f64, ml_risk: f64, weights: BlendWeights) -> f64 {
        gas_risk * weights.gas + ml_risk * weights.model
    }
}

impl Default for ScoreBlender {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::apply_gas_rules;

    #[test]
    fn test_high_gas_takes_the_maximum() {
        let blender = ScoreBlender::new();
        let gas = apply_gas_rules(350.0);

        assert_eq!(blender.blend(90.0, gas.risk_score, 350.0), 90.0);
        // The model cannot dilute the rule downward
        assert_eq!(blender.blend(5.0, gas.risk_score, 350.0), gas.risk_score);
    }

    #[test]
    fn test_suspicious_gas_is_rule_weighted() {
        let blender = ScoreBlender::new();
        let blended = blender.blend(40.0, 55.0, 150.0);

        // 0.7 * 55 + 0.3 * 40
        assert!((blended - 50.5).abs() < 1e-9);
    }

    #[test]
    fn test_low_gas_is_model_weighted() {
        let blender = ScoreBlender::new();
        let blended = blender.blend(80.0, 15.0, 50.0);

        // 0.4 * 15 + 0.6 * 80
        assert!((blended - 54.0).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_edges_follow_gas_rules() {
        let blender = ScoreBlender::new();

        assert!((blender.blend(0.0, 50.0, 100.0) - 35.0).abs() < 1e-9);
        assert!((blender.blend(0.0, 70.0, 300.0) - 49.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_sum_matches_literal_weights() {
        let blender = ScoreBlender::new();
        let gas = apply_gas_rules(173.5).risk_score;

        assert_eq!(blender.blend(99.5, gas, 173.5), gas * 0.7 + 99.5 * 0.3);
        assert_eq!(blender.blend(33.0, 15.0, 20.0), 15.0 * 0.4 + 33.0 * 0.6);
    }

    #[test]
    fn test_blend_is_clamped() {
        let blender = ScoreBlender::new();
        assert_eq!(blender.blend(250.0, 95.0, 900.0), 100.0);
        assert_eq!(blender.blend(-40.0, 15.0, 10.0), 0.0);
    }
}
