//! Volatility-Adjusted Spread Classifier
//!
//! Grades the current spread divergence by pairing its z-score with the
//! realized volatility of both legs. The same |z| is worth less on a pair
//! whose legs are swinging wildly.
//!
//! adjusted_z = z / (1 + combined_vol / noisy_cutoff)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::stats;
use crate::strategy::params::VolatilityConfig;

/// Discrete signal quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalQuality {
    Premium,
    Strong,
    Moderate,
    Weak,
    Noisy,
    InsufficientData,
}

impl SignalQuality {
    /// Ordinal used when averaging tiers: insufficient 0 .. premium 5
    pub fn rank(&self) -> u8 {
        match self {
            Self::InsufficientData => 0,
            Self::Noisy => 1,
            Self::Weak => 2,
            Self::Moderate => 3,
            Self::Strong => 4,
            Self::Premium => 5,
        }
    }

    /// 0-100 contribution to the orchestrator's method score
    pub fn score(&self) -> f64 {
        match self {
            Self::Premium => 100.0,
            Self::Strong => 80.0,
            Self::Moderate => 60.0,
            Self::Weak => 35.0,
            Self::Noisy => 15.0,
            Self::InsufficientData => 0.0,
        }
    }

    /// Premium or strong
    pub fn is_strong(&self) -> bool {
        matches!(self, Self::Premium | Self::Strong)
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Premium => "premium",
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
            Self::Noisy => "noisy",
            Self::InsufficientData => "insufficient_data",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityAdjustedSpreadResult {
    pub z_score: f64,
    pub adjusted_z_score: f64,
    pub primary_volatility: f64,
    pub secondary_volatility: f64,
    /// Mean of the two leg volatilities
    pub combined_volatility: f64,
    /// 0-100
    pub signal_strength: f64,
    pub signal_quality: SignalQuality,
}

impl VolatilityAdjustedSpreadResult {
    pub fn insufficient(z_score: f64) -> Self {
        Self {
            z_score: stats::finite_or_zero(z_score),
            adjusted_z_score: 0.0,
            primary_volatility: 0.0,
            secondary_volatility: 0.0,
            combined_volatility: 0.0,
            signal_strength: 0.0,
            signal_quality: SignalQuality::InsufficientData,
        }
    }
}

/// Pick the tier for a z-score / combined volatility pair. Tiers are
/// checked in priority order, the first match wins.
pub fn classify_quality(z_score: f64, combined_volatility: f64, config: &VolatilityConfig) -> SignalQuality {
    let abs_z = z_score.abs();
    if abs_z > config.premium_z && combined_volatility < config.premium_volatility {
        SignalQuality::Premium
    } else if abs_z > config.strong_z && combined_volatility < config.strong_volatility {
        SignalQuality::Strong
    } else if abs_z > config.moderate_z {
        SignalQuality::Moderate
    } else if combined_volatility > config.noisy_volatility {
        SignalQuality::Noisy
    } else {
        SignalQuality::Weak
    }
}

/// Classify the spread z-score against both legs' realized volatility.
///
/// `primary_returns` / `secondary_returns` are the log returns of the
/// window the z-score was computed over. Fewer than `min_samples` returns
/// on either leg gives `InsufficientData`.
pub fn classify(
    z_score: f64,
    primary_returns: &[f64],
    secondary_returns: &[f64],
    config: &VolatilityConfig,
) -> VolatilityAdjustedSpreadResult {
    if primary_returns.len() < config.min_samples || secondary_returns.len() < config.min_samples {
        return VolatilityAdjustedSpreadResult::insufficient(z_score);
    }

    let z_score = stats::finite_or_zero(z_score);
    let primary_volatility = stats::standard_deviation(primary_returns, None);
    let secondary_volatility = stats::standard_deviation(secondary_returns, None);
    let combined_volatility = (primary_volatility + secondary_volatility) / 2.0;

    let adjusted_z_score = stats::finite_or_zero(z_score / (1.0 + combined_volatility / config.noisy_volatility));
    let signal_strength = stats::clamp(
        adjusted_z_score.abs() / config.strength_saturation_z * 100.0,
        0.0,
        100.0,
    );

    VolatilityAdjustedSpreadResult {
        z_score,
        adjusted_z_score,
        primary_volatility,
        secondary_volatility,
        combined_volatility,
        signal_strength,
        signal_quality: classify_quality(z_score, combined_volatility, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ar1_series;
    use approx::assert_relative_eq;

    fn config() -> VolatilityConfig {
        VolatilityConfig::default()
    }

    #[test]
    fn test_tier_priority() {
        let c = config();
        assert_eq!(classify_quality(2.5, 0.01, &c), SignalQuality::Premium);
        assert_eq!(classify_quality(-2.5, 0.03, &c), SignalQuality::Strong);
        assert_eq!(classify_quality(1.8, 0.03, &c), SignalQuality::Strong);
        assert_eq!(classify_quality(2.5, 0.08, &c), SignalQuality::Moderate);
        assert_eq!(classify_quality(1.2, 0.01, &c), SignalQuality::Moderate);
        assert_eq!(classify_quality(0.5, 0.06, &c), SignalQuality::Noisy);
        assert_eq!(classify_quality(0.5, 0.03, &c), SignalQuality::Weak);
    }

    #[test]
    fn test_boundaries_are_strict() {
        let c = config();
        // |z| must exceed 2.0, volatility must be below 0.02
        assert_eq!(classify_quality(2.0, 0.01, &c), SignalQuality::Strong);
        assert_eq!(classify_quality(2.1, 0.02, &c), SignalQuality::Strong);
        assert_eq!(classify_quality(0.5, 0.05, &c), SignalQuality::Weak);
    }

    #[test]
    fn test_insufficient_data() {
        let short = vec![0.01; 5];
        let result = classify(2.5, &short, &short, &config());
        assert_eq!(result.signal_quality, SignalQuality::InsufficientData);
        assert_eq!(result.signal_strength, 0.0);
        assert_eq!(result.z_score, 2.5);
    }

    #[test]
    fn test_low_volatility_premium() {
        let a = ar1_series(100, 0.0, 0.005, 1);
        let b = ar1_series(100, 0.0, 0.005, 2);
        let result = classify(-2.4, &a, &b, &config());

        assert_eq!(result.signal_quality, SignalQuality::Premium);
        assert!(result.combined_volatility < 0.02);
        assert!(result.adjusted_z_score < 0.0);
        assert!(result.adjusted_z_score.abs() < 2.4);
    }

    #[test]
    fn test_volatility_suppresses_adjusted_z() {
        let calm = ar1_series(100, 0.0, 0.005, 3);
        let wild = ar1_series(100, 0.0, 0.08, 4);
        let c = config();
        let low = classify(2.0, &calm, &calm, &c);
        let high = classify(2.0, &wild, &wild, &c);

        assert!(high.adjusted_z_score < low.adjusted_z_score);
        assert!(high.signal_strength < low.signal_strength);
    }

    #[test]
    fn test_adjusted_z_formula() {
        // Alternating ±0.01 returns have population std exactly 0.01
        let r: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        let result = classify(3.0, &r, &r, &config());
        assert_relative_eq!(result.combined_volatility, 0.01, epsilon = 1e-12);
        assert_relative_eq!(result.adjusted_z_score, 3.0 / 1.2, epsilon = 1e-9);
        assert_relative_eq!(result.signal_strength, 2.5 / 3.0 * 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_quality_ordering() {
        assert!(SignalQuality::Premium.rank() > SignalQuality::Strong.rank());
        assert!(SignalQuality::Noisy.rank() > SignalQuality::InsufficientData.rank());
        assert!(SignalQuality::Premium.is_strong());
        assert!(!SignalQuality::Moderate.is_strong());
        assert_eq!(SignalQuality::InsufficientData.to_string(), "insufficient_data");
    }
}
