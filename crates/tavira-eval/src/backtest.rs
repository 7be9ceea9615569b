//! Backtest orchestration.
//!
//! A run computes signals, scores and alphas once over the whole history,
//! then builds one portfolio per rebalance date and joins each weight with
//! the asset's next-period return. Periods are independent, so they can be
//! processed sequentially or on a worker pool with identical output.

use crate::strategy::Strategy;
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use tavira_optimize::PeriodInput;
use tavira_risk::{RiskConfig, RiskModelAssembler};
use tavira_traits::types::{date_values, opt_f64_values, str_values};
use tavira_traits::{
    Alpha, AssetReturns, Date, History, Interval, MarketDataProvider, Portfolio, Result, Returns,
    RiskModelProvider, TaviraError, TotalRisk, Universe, UniverseProvider,
};
use tracing::{debug, info, warn};

/// Backtesting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Rebalance frequency
    pub interval: Interval,
    /// First rebalance date considered (inclusive)
    pub start_date: Date,
    /// Last rebalance date considered (inclusive)
    pub end_date: Date,
    /// Draw a progress bar over periods
    #[serde(default)]
    pub show_progress: bool,
    /// Periods of history loaded before `start_date` so signals are
    /// populated on the first rebalance date
    #[serde(default)]
    pub lookback: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            interval: Interval::Monthly,
            start_date: Date::from_ymd_opt(2000, 1, 1).unwrap_or(Date::MIN),
            end_date: Date::from_ymd_opt(2024, 12, 31).unwrap_or(Date::MAX),
            show_progress: false,
            lookback: 0,
        }
    }
}

impl BacktestConfig {
    /// Widens the lookback to cover the strategy's signal window.
    #[must_use]
    pub fn with_lookback_for(mut self, strategy: &Strategy) -> Self {
        self.lookback = self.lookback.max(strategy.signal().lookback());
        self
    }

    /// First date of the history loaded for the run.
    #[must_use]
    pub fn history_start(&self) -> Date {
        self.interval.periods_before(self.start_date, self.lookback)
    }

    fn is_rebalance_date(&self, date: Date) -> bool {
        (self.start_date..=self.end_date).contains(&date)
    }
}

/// How rebalance periods are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One period after another, in date order.
    #[default]
    Sequential,
    /// One task per period on a dedicated thread pool.
    Parallel {
        /// Pool size; defaults to the available cores. Always capped at
        /// the number of periods.
        workers: Option<usize>,
    },
}

/// A rebalance date that produced no portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodFailure {
    /// The skipped rebalance date.
    pub date: Date,
    /// Rendered cause.
    pub reason: String,
}

/// Result of a backtest run.
#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    /// Weights joined with forward returns, sorted by `(asset_id, date)`.
    pub asset_returns: AssetReturns,
    /// Skipped periods in date order.
    pub failures: Vec<PeriodFailure>,
}

type PeriodOutcome = std::result::Result<Portfolio, PeriodFailure>;

/// Backtest orchestrator.
///
/// Holds the universe, return and risk-forecast tables for the configured
/// date range. They are read-only for the lifetime of the backtester and
/// shared by every period.
pub struct Backtester {
    config: BacktestConfig,
    universe: Universe,
    returns: Returns,
    total_risk: TotalRisk,
    risk: RiskModelAssembler,
}

impl std::fmt::Debug for Backtester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backtester")
            .field("config", &self.config)
            .field("universe_rows", &self.universe.len())
            .field("returns_rows", &self.returns.len())
            .field("total_risk_rows", &self.total_risk.len())
            .finish_non_exhaustive()
    }
}

impl Backtester {
    /// Loads the universe, returns and total risk from
    /// [`BacktestConfig::history_start`] through the end date.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::InvalidDate`] when the range is reversed, and
    /// any provider error.
    pub fn new(
        config: BacktestConfig,
        universe: &dyn UniverseProvider,
        market: &dyn MarketDataProvider,
        risk_model: Arc<dyn RiskModelProvider>,
        risk_config: RiskConfig,
    ) -> Result<Self> {
        check_range(&config)?;
        let (interval, start, end) = (config.interval, config.history_start(), config.end_date);
        let universe = universe.load_universe(interval, start, end)?;
        let returns = market.load_returns(interval, start, end)?;
        let total_risk = market.load_total_risk(interval, start, end)?;
        info!(
            %interval,
            %start,
            %end,
            lookback = config.lookback,
            universe = universe.len(),
            returns = returns.len(),
            "loaded backtest inputs"
        );
        Ok(Self::from_tables(config, universe, returns, total_risk, risk_model, risk_config))
    }

    /// Creates a backtester over already loaded tables.
    pub fn from_tables(
        config: BacktestConfig,
        universe: Universe,
        returns: Returns,
        total_risk: TotalRisk,
        risk_model: Arc<dyn RiskModelProvider>,
        risk_config: RiskConfig,
    ) -> Self {
        Self {
            config,
            universe,
            returns,
            total_risk,
            risk: RiskModelAssembler::new(risk_model, risk_config),
        }
    }

    /// The configuration.
    pub const fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// The universe table.
    pub const fn universe(&self) -> &Universe {
        &self.universe
    }

    /// The returns table.
    pub const fn returns(&self) -> &Returns {
        &self.returns
    }

    /// Runs the backtest period by period.
    pub fn run_sequential(&self, strategy: &Strategy) -> Result<AssetReturns> {
        Ok(self.run(strategy, ExecutionMode::Sequential)?.asset_returns)
    }

    /// Runs the backtest on a pool of `workers` threads.
    pub fn run_parallel(&self, strategy: &Strategy, workers: Option<usize>) -> Result<AssetReturns> {
        Ok(self.run(strategy, ExecutionMode::Parallel { workers })?.asset_returns)
    }

    /// Runs the backtest and reports skipped periods.
    ///
    /// # Errors
    ///
    /// Schema violations, missing history columns and other errors that are
    /// not [period recoverable](TaviraError::is_period_recoverable) stop
    /// the run. Recoverable errors only skip their period.
    pub fn run(&self, strategy: &Strategy, mode: ExecutionMode) -> Result<BacktestOutcome> {
        let started = Instant::now();
        strategy.validate()?;
        self.check_betas(strategy)?;
        info!(strategy = strategy.name(), ?mode, "starting backtest");
        if strategy.signal().lookback() > self.config.lookback {
            debug!(
                signal = strategy.signal().name(),
                needed = strategy.signal().lookback(),
                loaded = self.config.lookback,
                "signal window exceeds loaded lookback"
            );
        }

        let alpha = self.alphas(strategy)?;
        let mut dates = self.universe.dates()?;
        dates.retain(|d| self.config.is_rebalance_date(*d));
        let mut inputs = self.period_inputs(&alpha)?;

        let mut failures = Vec::new();
        let mut periods = Vec::with_capacity(dates.len());
        for date in dates {
            match inputs.remove(&date) {
                Some(input) => periods.push(input),
                None => {
                    debug!(%date, "no alphas for period");
                    failures.push(PeriodFailure {
                        date,
                        reason: "no alphas for any eligible asset".to_string(),
                    });
                }
            }
        }

        let progress = self.progress_bar(periods.len());
        let outcomes = match mode {
            ExecutionMode::Sequential => periods
                .iter()
                .map(|input| {
                    let outcome = self.process(strategy, input);
                    progress.inc(1);
                    outcome
                })
                .collect::<Result<Vec<_>>>()?,
            ExecutionMode::Parallel { workers } => {
                let workers = pool_size(workers, periods.len());
                debug!(workers, periods = periods.len(), "dispatching periods");
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|e| TaviraError::Other(format!("failed to build thread pool: {e}")))?;
                pool.install(|| {
                    periods
                        .par_iter()
                        .map(|input| {
                            let outcome = self.process(strategy, input);
                            progress.inc(1);
                            outcome
                        })
                        .collect::<Result<Vec<_>>>()
                })?
            }
        };
        progress.finish_and_clear();

        let mut portfolios = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(portfolio) => portfolios.push(portfolio),
                Err(failure) => failures.push(failure),
            }
        }
        failures.sort_by_key(|f| f.date);

        let built = portfolios.len();
        let weights = Portfolio::concat(portfolios)?;
        let asset_returns = self.join_forward_returns(&weights)?;

        info!(
            strategy = strategy.name(),
            periods = built,
            skipped = failures.len(),
            rows = asset_returns.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backtest complete"
        );
        Ok(BacktestOutcome {
            asset_returns,
            failures,
        })
    }

    fn check_betas(&self, strategy: &Strategy) -> Result<()> {
        if !strategy.requires_betas() {
            return Ok(());
        }
        let betas = self.total_risk.data().column("predicted_beta")?;
        if betas.len() == betas.null_count() {
            return Err(TaviraError::InvalidData(format!(
                "strategy {} has a beta constraint but no predicted betas are available",
                strategy.name()
            )));
        }
        Ok(())
    }

    /// Signal, score and alpha over the whole history.
    fn alphas(&self, strategy: &Strategy) -> Result<Alpha> {
        let keys = [col("date"), col("asset_id")];
        let returns = self.returns.data().clone().lazy().select([
            col("date"),
            col("asset_id"),
            col("ret"),
            col("market_cap"),
        ]);
        let risk = self.total_risk.data().clone().lazy();
        let df = self
            .universe
            .data()
            .clone()
            .lazy()
            .join(returns, keys.clone(), keys.clone(), JoinArgs::new(JoinType::Left))
            .join(risk, keys.clone(), keys, JoinArgs::new(JoinType::Left))
            .collect()?;

        let history = History::new(df)?;
        history.require(strategy.signal().required_columns())?;

        let signal = strategy.signal().signal(&history)?;
        let score = strategy.score().score(&signal)?;
        let alpha = strategy.alpha().alpha(&score, &self.total_risk)?;
        debug!(
            signal = strategy.signal().name(),
            score = strategy.score().name(),
            alpha = strategy.alpha().name(),
            rows = alpha.len(),
            "computed alphas"
        );
        Ok(alpha)
    }

    /// Per-date inputs: eligible assets with an alpha, plus their betas.
    fn period_inputs(&self, alpha: &Alpha) -> Result<HashMap<Date, PeriodInput>> {
        let keys = [col("date"), col("asset_id")];
        let betas = self.total_risk.data().clone().lazy().select([
            col("date"),
            col("asset_id"),
            col("predicted_beta"),
        ]);
        let df = self
            .universe
            .data()
            .clone()
            .lazy()
            .join(
                alpha.data().clone().lazy(),
                keys.clone(),
                keys.clone(),
                JoinArgs::new(JoinType::Inner),
            )
            .join(betas, keys.clone(), keys, JoinArgs::new(JoinType::Left))
            .sort(["date", "asset_id"], SortMultipleOptions::default())
            .collect()?;

        let dates = date_values(&df, "date")?;
        let ids = str_values(&df, "asset_id")?;
        let alphas = opt_f64_values(&df, "alpha")?;
        let betas = opt_f64_values(&df, "predicted_beta")?;

        let mut inputs = HashMap::new();
        let mut start = 0;
        for run in dates.chunk_by(|a, b| a == b) {
            let end = start + run.len();
            let date = run[0];
            let input = PeriodInput::new(
                date,
                ids[start..end].to_vec(),
                alphas[start..end].iter().map(|a| a.unwrap_or(0.0)).collect(),
            )?
            .with_betas(betas[start..end].to_vec())?;
            inputs.insert(date, input);
            start = end;
        }
        Ok(inputs)
    }

    fn process(&self, strategy: &Strategy, input: &PeriodInput) -> Result<PeriodOutcome> {
        let date = input.date;
        match strategy
            .portfolio()
            .construct(input, &self.risk, strategy.constraints())
        {
            Ok(portfolio) => Ok(Ok(portfolio)),
            Err(err) if err.is_period_recoverable() => {
                warn!(%date, error = %err, "skipping period");
                Ok(Err(PeriodFailure {
                    date,
                    reason: err.to_string(),
                }))
            }
            Err(err) => Err(err),
        }
    }

    /// Left-joins each weight with the asset's next return.
    fn join_forward_returns(&self, weights: &Portfolio) -> Result<AssetReturns> {
        let keys = [col("date"), col("asset_id")];
        let df = weights
            .data()
            .clone()
            .lazy()
            .join(
                forward_returns(&self.returns),
                keys.clone(),
                keys,
                JoinArgs::new(JoinType::Left),
            )
            .sort(["asset_id", "date"], SortMultipleOptions::default())
            .collect()?;
        AssetReturns::new(df)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} periods")
        {
            bar.set_style(style);
        }
        bar
    }
}

/// `ret` shifted back one period within each asset's own date-sorted series.
///
/// The last observation of every asset gets a null forward return.
pub fn forward_returns(returns: &Returns) -> LazyFrame {
    returns
        .data()
        .clone()
        .lazy()
        .sort(["asset_id", "date"], SortMultipleOptions::default())
        .select([
            col("date"),
            col("asset_id"),
            col("ret")
                .shift(lit(-1))
                .over([col("asset_id")])
                .alias("forward_return"),
        ])
}

fn check_range(config: &BacktestConfig) -> Result<()> {
    if config.start_date > config.end_date {
        return Err(TaviraError::InvalidDate(format!(
            "start {} is after end {}",
            config.start_date, config.end_date
        )));
    }
    Ok(())
}

fn pool_size(workers: Option<usize>, periods: usize) -> usize {
    workers
        .or_else(|| std::thread::available_parallelism().ok().map(NonZeroUsize::get))
        .unwrap_or(1)
        .min(periods)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tavira_traits::types::{date_column, f64_values};

    fn d(m: u32) -> Date {
        Date::from_ymd_opt(2024, m, 28).unwrap()
    }

    #[test]
    fn test_forward_returns_shift_within_asset() {
        let df = DataFrame::new(vec![
            date_column("date", &[d(2), d(1), d(1), d(2), d(3)]),
            Column::new("asset_id".into(), &["A", "A", "B", "B", "A"]),
            Column::new("ret".into(), &[0.02, 0.01, 0.05, 0.06, 0.03]),
            Column::new("market_cap".into(), &[1.0; 5]),
            Column::new("price".into(), &[1.0; 5]),
        ])
        .unwrap();
        let returns = Returns::new(df).unwrap();

        let fwd = forward_returns(&returns)
            .sort(["asset_id", "date"], SortMultipleOptions::default())
            .collect()
            .unwrap();
        assert_eq!(str_values(&fwd, "asset_id").unwrap(), ["A", "A", "A", "B", "B"]);
        assert_eq!(
            opt_f64_values(&fwd, "forward_return").unwrap(),
            [Some(0.02), Some(0.03), None, Some(0.06), None]
        );
        assert!(f64_values(&fwd, "forward_return").unwrap()[2].is_nan());
    }

    #[test]
    fn test_pool_size_capped_by_periods() {
        assert_eq!(pool_size(Some(4), 2), 2);
        assert_eq!(pool_size(Some(4), 0), 1);
        assert_eq!(pool_size(Some(3), 10), 3);
        assert!(pool_size(None, 10) >= 1);
    }

    #[test]
    fn test_reversed_range_rejected() {
        let config = BacktestConfig {
            start_date: d(5),
            end_date: d(1),
            ..Default::default()
        };
        assert!(matches!(check_range(&config), Err(TaviraError::InvalidDate(_))));
        assert!(check_range(&BacktestConfig::default()).is_ok());
    }

    #[test]
    fn test_config_serde_defaults_progress() {
        let json = r#"{"interval":"daily","start_date":"2020-01-01","end_date":"2020-12-31"}"#;
        let config: BacktestConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.interval, Interval::Daily);
        assert!(!config.show_progress);
        assert_eq!(config.lookback, 0);
        assert_eq!(config.history_start(), config.start_date);
    }

    #[test]
    fn test_history_start_precedes_rebalance_range() {
        let config = BacktestConfig {
            interval: Interval::Monthly,
            start_date: d(5),
            end_date: d(9),
            show_progress: false,
            lookback: 3,
        };
        assert_eq!(config.history_start(), d(2));
        assert!(!config.is_rebalance_date(d(4)));
        assert!(config.is_rebalance_date(d(5)));
        assert!(config.is_rebalance_date(d(9)));
    }

    #[test]
    fn test_execution_mode_serde() {
        let mode: ExecutionMode = serde_json::from_str(r#"{"parallel":{"workers":4}}"#).unwrap();
        assert_eq!(mode, ExecutionMode::Parallel { workers: Some(4) });
        assert_eq!(ExecutionMode::default(), ExecutionMode::Sequential);
    }
}
