//! Short-term reversal.

use serde::{Deserialize, Serialize};
use tavira_traits::{History, Interval, Result, Signal, SignalConstructor};

/// Configuration for the short-term reversal signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalConfig {
    /// Number of periods summed.
    pub window: usize,
    /// Lag applied after summing.
    pub skip: usize,
}

impl ReversalConfig {
    /// Standard formation for the given rebalance interval.
    #[must_use]
    pub const fn for_interval(interval: Interval) -> Self {
        match interval {
            Interval::Daily => Self { window: 22, skip: 1 },
            Interval::Monthly => Self { window: 1, skip: 1 },
        }
    }
}

impl Default for ReversalConfig {
    fn default() -> Self {
        Self::for_interval(Interval::Monthly)
    }
}

/// Negated recent log return: recent losers get high values.
#[derive(Debug, Clone, Default)]
pub struct Reversal {
    config: ReversalConfig,
}

impl Reversal {
    /// Create a new reversal signal with the given configuration.
    #[must_use]
    pub const fn new(config: ReversalConfig) -> Self {
        Self { config }
    }
}

impl SignalConstructor for Reversal {
    fn name(&self) -> &str {
        "reversal"
    }

    fn required_columns(&self) -> &[&str] {
        &["ret"]
    }

    fn lookback(&self) -> usize {
        self.config.window + self.config.skip
    }

    fn signal(&self, history: &History) -> Result<Signal> {
        super::lagged_log_return_sum(history, self.config.window, self.config.skip, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{history_for, signal_values};
    use approx::assert_relative_eq;

    #[test]
    fn test_monthly_reversal_is_negated_prior_return() {
        let history = history_for(&[("A", vec![0.10, -0.05, 0.02])]);
        let values = signal_values(&Reversal::default().signal(&history).unwrap());

        assert!(values[0].is_none());
        assert_relative_eq!(values[1].unwrap(), -(0.10_f64.ln_1p()), epsilon = 1e-12);
        assert_relative_eq!(values[2].unwrap(), -((-0.05_f64).ln_1p()), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_skip_rejected() {
        let history = history_for(&[("A", vec![0.01, 0.02])]);
        let signal = Reversal::new(ReversalConfig { window: 1, skip: 0 });
        assert!(signal.signal(&history).is_err());
    }
}
