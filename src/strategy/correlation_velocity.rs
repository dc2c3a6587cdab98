//! Correlation Velocity Detector
//!
//! Tracks how fast the pair's return correlation is moving:
//! - current: correlation over the last `window` returns
//! - previous: same window shifted back `shift` bars
//! - velocity = current - previous
//! - acceleration = velocity - previous velocity (one more shift back)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::stats::pearson_correlation;
use crate::strategy::params::VelocityConfig;

/// Correlation strength bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationLevel {
    Weak,
    Moderate,
    Strong,
}

impl CorrelationLevel {
    pub fn from_correlation(correlation: f64, strong: f64, moderate: f64) -> Self {
        if correlation >= strong {
            Self::Strong
        } else if correlation >= moderate {
            Self::Moderate
        } else {
            Self::Weak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationRegime {
    StableStrong,
    StableWeak,
    Stable,
    Strengthening,
    Recovering,
    Weakening,
    BreakingDown,
}

impl CorrelationRegime {
    /// Regimes that support a pair trade
    pub fn is_supportive(&self) -> bool {
        matches!(self, Self::Strengthening | Self::StableStrong)
    }
}

impl fmt::Display for CorrelationRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StableStrong => "stable_strong",
            Self::StableWeak => "stable_weak",
            Self::Stable => "stable",
            Self::Strengthening => "strengthening",
            Self::Recovering => "recovering",
            Self::Weakening => "weakening",
            Self::BreakingDown => "breaking_down",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationVelocityResult {
    pub current_correlation: f64,
    pub previous_correlation: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub regime: CorrelationRegime,
    /// False when there were too few returns to measure a velocity
    pub is_valid: bool,
}

impl CorrelationVelocityResult {
    fn insufficient(current_correlation: f64) -> Self {
        Self {
            current_correlation,
            previous_correlation: current_correlation,
            velocity: 0.0,
            acceleration: 0.0,
            regime: CorrelationRegime::Stable,
            is_valid: false,
        }
    }
}

/// Correlation of the `window` returns ending `lag` bars before the end
fn lagged_correlation(a: &[f64], b: &[f64], window: usize, lag: usize) -> f64 {
    let end = a.len() - lag;
    let start = end - window;
    pearson_correlation(&a[start..end], &b[start..end])
}

/// Regime from the current level, the previous level, and the velocity
pub fn classify_regime(current: f64, previous: f64, velocity: f64, config: &VelocityConfig) -> CorrelationRegime {
    let level = |r| CorrelationLevel::from_correlation(r, config.strong_correlation, config.moderate_correlation);
    let current_level = level(current);
    let previous_level = level(previous);

    if velocity.abs() <= config.velocity_threshold {
        match current_level {
            CorrelationLevel::Strong => CorrelationRegime::StableStrong,
            CorrelationLevel::Weak => CorrelationRegime::StableWeak,
            CorrelationLevel::Moderate => CorrelationRegime::Stable,
        }
    } else if velocity > 0.0 {
        if current_level < CorrelationLevel::Strong && previous_level == CorrelationLevel::Weak {
            CorrelationRegime::Recovering
        } else {
            CorrelationRegime::Strengthening
        }
    } else if previous_level >= CorrelationLevel::Moderate && current_level == CorrelationLevel::Weak {
        CorrelationRegime::BreakingDown
    } else {
        CorrelationRegime::Weakening
    }
}

/// Measure correlation velocity over two aligned return series
pub fn analyze(primary_returns: &[f64], secondary_returns: &[f64], config: &VelocityConfig) -> CorrelationVelocityResult {
    let n = primary_returns.len().min(secondary_returns.len());
    let a = &primary_returns[primary_returns.len() - n..];
    let b = &secondary_returns[secondary_returns.len() - n..];

    if config.window < 2 || n < config.window + config.shift {
        let current = if n >= 2 {
            pearson_correlation(&a[n.saturating_sub(config.window)..], &b[n.saturating_sub(config.window)..])
        } else {
            0.0
        };
        return CorrelationVelocityResult::insufficient(current);
    }

    let current = lagged_correlation(a, b, config.window, 0);
    let previous = lagged_correlation(a, b, config.window, config.shift);
    let velocity = current - previous;

    let acceleration = if n >= config.required_returns() {
        let prior = lagged_correlation(a, b, config.window, 2 * config.shift);
        velocity - (previous - prior)
    } else {
        0.0
    };

    CorrelationVelocityResult {
        current_correlation: current,
        previous_correlation: previous,
        velocity,
        acceleration,
        regime: classify_regime(current, previous, velocity, config),
        is_valid: true,
    }
}
