//! Signal registry for discovering and building available signals.

use crate::beta::LowBeta;
use crate::momentum::{Momentum, MomentumConfig, Reversal, ReversalConfig};
use serde::{Deserialize, Serialize};
use tavira_traits::{Interval, Result, SignalConstructor, TaviraError};
use tracing::debug;

/// Signal category classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalCategory {
    /// Price momentum signals
    Momentum,
    /// Mean reversion signals
    Reversion,
    /// Low-risk anomaly signals
    Defensive,
}

impl SignalCategory {
    /// Get a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &str {
        match self {
            Self::Momentum => "Price momentum and trend-following signals",
            Self::Reversion => "Mean reversion and contrarian signals",
            Self::Defensive => "Low-beta and low-risk anomaly signals",
        }
    }
}

/// Metadata about a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalInfo {
    /// Unique identifier for the signal
    pub name: &'static str,

    /// Category classification
    pub category: SignalCategory,

    /// Human-readable description
    pub description: &'static str,

    /// Periods of history consumed at a monthly interval
    pub monthly_lookback: usize,

    /// Periods of history consumed at a daily interval
    pub daily_lookback: usize,
}

/// Get information about all available signals.
#[must_use]
pub fn available_signals() -> Vec<SignalInfo> {
    let momentum = |i| {
        let c = MomentumConfig::for_interval(i);
        c.window + c.skip
    };
    let reversal = |i| {
        let c = ReversalConfig::for_interval(i);
        c.window + c.skip
    };

    vec![
        SignalInfo {
            name: "momentum",
            category: SignalCategory::Momentum,
            description: "Trailing log-return sum skipping the most recent month",
            monthly_lookback: momentum(Interval::Monthly),
            daily_lookback: momentum(Interval::Daily),
        },
        SignalInfo {
            name: "reversal",
            category: SignalCategory::Reversion,
            description: "Negated log return over the most recent month",
            monthly_lookback: reversal(Interval::Monthly),
            daily_lookback: reversal(Interval::Daily),
        },
        SignalInfo {
            name: "low_beta",
            category: SignalCategory::Defensive,
            description: "Negated predicted beta from the prior period",
            monthly_lookback: 1,
            daily_lookback: 1,
        },
    ]
}

/// Get all signals in a specific category.
#[must_use]
pub fn signals_by_category(category: &SignalCategory) -> Vec<SignalInfo> {
    available_signals()
        .into_iter()
        .filter(|info| &info.category == category)
        .collect()
}

/// Get information about a specific signal by name.
#[must_use]
pub fn get_signal_info(name: &str) -> Option<SignalInfo> {
    available_signals()
        .into_iter()
        .find(|info| info.name == name)
}

/// Builds a signal by name using the standard formation for `interval`.
///
/// Hyphens and underscores are interchangeable in `name`.
pub fn create_signal(name: &str, interval: Interval) -> Result<Box<dyn SignalConstructor>> {
    debug!(signal = name, %interval, "building signal");
    match name.replace('-', "_").as_str() {
        "momentum" => Ok(Box::new(Momentum::new(MomentumConfig::for_interval(
            interval,
        )))),
        "reversal" => Ok(Box::new(Reversal::new(ReversalConfig::for_interval(
            interval,
        )))),
        "low_beta" => Ok(Box::new(LowBeta::new())),
        other => Err(TaviraError::InvalidData(format!("unknown signal '{other}'"))),
    }
}
