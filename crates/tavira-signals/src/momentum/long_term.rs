//! Classic 12-1 momentum on log returns.

use serde::{Deserialize, Serialize};
use tavira_traits::{History, Interval, Result, Signal, SignalConstructor};

/// Configuration for the momentum signal.
///
/// The default is the monthly 12-1 formation: 11 months of log returns ending
/// one month before the rebalance date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MomentumConfig {
    /// Number of periods summed.
    pub window: usize,
    /// Number of most recent periods skipped. Must be at least one.
    pub skip: usize,
}

impl MomentumConfig {
    /// Standard formation for the given rebalance interval.
    #[must_use]
    pub const fn for_interval(interval: Interval) -> Self {
        match interval {
            Interval::Daily => Self {
                window: 230,
                skip: 22,
            },
            Interval::Monthly => Self { window: 11, skip: 1 },
        }
    }
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self::for_interval(Interval::Monthly)
    }
}

/// Trailing log-return momentum.
///
/// # Example
///
/// ```ignore
/// use tavira_signals::momentum::{Momentum, MomentumConfig};
/// use tavira_traits::{Interval, SignalConstructor};
///
/// let signal = Momentum::new(MomentumConfig::for_interval(Interval::Daily));
/// let table = signal.signal(&history)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Momentum {
    config: MomentumConfig,
}

impl Momentum {
    /// Create a new momentum signal with the given configuration.
    #[must_use]
    pub const fn new(config: MomentumConfig) -> Self {
        Self { config }
    }

    /// Number of periods summed.
    #[must_use]
    pub const fn window(&self) -> usize {
        self.config.window
    }

    /// Number of recent periods skipped.
    #[must_use]
    pub const fn skip(&self) -> usize {
        self.config.skip
    }
}

impl SignalConstructor for Momentum {
    fn name(&self) -> &str {
        "momentum"
    }

    fn required_columns(&self) -> &[&str] {
        &["ret"]
    }

    fn lookback(&self) -> usize {
        self.config.window + self.config.skip
    }

    fn signal(&self, history: &History) -> Result<Signal> {
        super::lagged_log_return_sum(history, self.config.window, self.config.skip, 1.0)
    }
}
