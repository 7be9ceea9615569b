//! Performance evaluation of backtest results.
//!
//! Aggregates asset-level P&L into per-date portfolio, benchmark and active
//! returns and derives the usual summary statistics from them.

use derive_more::Display;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tavira_traits::stats::{mean, ols, sample_std};
use tavira_traits::types::{date_column, date_values, f64_values, str_values};
use tavira_traits::{AssetReturns, Date, Interval, Portfolio, Result};

/// How per-period returns are chained into cumulative returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compounding {
    /// Running sum of log returns.
    #[default]
    #[display("sum")]
    Sum,
    /// Running product of gross returns, minus one.
    #[display("product")]
    Product,
}

/// Per-date portfolio, benchmark and active return series.
#[derive(Debug, Clone)]
pub struct Performance {
    interval: Interval,
    annualize: bool,
    dates: Vec<Date>,
    total: Vec<f64>,
    benchmark: Vec<f64>,
    active: Vec<f64>,
    gross_leverage: Vec<f64>,
    turnover: Vec<f64>,
}

impl Performance {
    /// Builds the return series from a backtest result.
    ///
    /// Benchmark weights are matched to the portfolio's `(date, asset_id)`
    /// rows; without a benchmark every benchmark weight is zero. Dates on
    /// which no forward return is known (the final period) are dropped, and
    /// a missing forward return contributes nothing within a date.
    ///
    /// # Errors
    ///
    /// Propagates polars errors.
    pub fn new(
        interval: Interval,
        asset_returns: &AssetReturns,
        benchmark: Option<&Portfolio>,
    ) -> Result<Self> {
        let keys = [col("date"), col("asset_id")];
        let lf = asset_returns.data().clone().lazy();
        let lf = match benchmark {
            Some(bmk) => lf.join(
                bmk.data().clone().lazy().select([
                    col("date"),
                    col("asset_id"),
                    col("weight").alias("weight_bmk"),
                ]),
                keys.clone(),
                keys,
                JoinArgs::new(JoinType::Left),
            ),
            None => lf.with_column(lit(0.0).alias("weight_bmk")),
        };

        let fwd = col("forward_return");
        let per_date = lf
            .with_column(col("weight_bmk").fill_null(lit(0.0)))
            .group_by([col("date")])
            .agg([
                (col("weight") * fwd.clone()).sum().alias("total_ret"),
                (col("weight_bmk") * fwd.clone()).sum().alias("bmk_ret"),
                ((col("weight") - col("weight_bmk")) * fwd.clone())
                    .sum()
                    .alias("active_ret"),
                when(col("weight").lt(lit(0.0)))
                    .then(lit(-1.0) * col("weight"))
                    .otherwise(col("weight"))
                    .sum()
                    .alias("gross_leverage"),
                fwd.count().alias("observed"),
            ])
            .filter(col("observed").gt(lit(0)))
            .sort(["date"], SortMultipleOptions::default())
            .collect()?;

        Ok(Self {
            interval,
            annualize: true,
            dates: date_values(&per_date, "date")?,
            total: f64_values(&per_date, "total_ret")?,
            benchmark: f64_values(&per_date, "bmk_ret")?,
            active: f64_values(&per_date, "active_ret")?,
            gross_leverage: f64_values(&per_date, "gross_leverage")?,
            turnover: turnover(asset_returns.data())?,
        })
    }

    /// Switches annualization of means and volatilities on or off.
    #[must_use]
    pub fn with_annualize(mut self, annualize: bool) -> Self {
        self.annualize = annualize;
        self
    }

    /// Rebalance interval the statistics are scaled by.
    pub const fn interval(&self) -> Interval {
        self.interval
    }

    /// Dates with at least one realized forward return.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Number of evaluated periods.
    pub fn periods(&self) -> usize {
        self.dates.len()
    }

    fn scale(&self) -> f64 {
        if self.annualize {
            self.interval.periods_per_year() as f64
        } else {
            1.0
        }
    }

    fn annual_mean(&self, series: &[f64]) -> f64 {
        mean(series) * self.scale()
    }

    fn annual_std(&self, series: &[f64]) -> f64 {
        sample_std(series) * self.scale().sqrt()
    }

    /// Mean portfolio return.
    pub fn expected_return(&self) -> f64 {
        self.annual_mean(&self.total)
    }

    /// Standard deviation of portfolio returns.
    pub fn volatility(&self) -> f64 {
        self.annual_std(&self.total)
    }

    /// Expected return over volatility.
    pub fn sharpe_ratio(&self) -> f64 {
        self.expected_return() / self.volatility()
    }

    /// Mean benchmark return.
    pub fn expected_benchmark_return(&self) -> f64 {
        self.annual_mean(&self.benchmark)
    }

    /// Standard deviation of benchmark returns.
    pub fn benchmark_volatility(&self) -> f64 {
        self.annual_std(&self.benchmark)
    }

    /// Mean active return.
    pub fn expected_active_return(&self) -> f64 {
        self.annual_mean(&self.active)
    }

    /// Standard deviation of active returns (tracking error).
    pub fn active_risk(&self) -> f64 {
        self.annual_std(&self.active)
    }

    /// Expected active return over active risk.
    pub fn information_ratio(&self) -> f64 {
        self.expected_active_return() / self.active_risk()
    }

    /// Slope of portfolio returns regressed on benchmark returns.
    pub fn total_beta(&self) -> f64 {
        ols(&self.benchmark, &self.total).1
    }

    /// Per-period intercept of portfolio returns regressed on benchmark
    /// returns.
    pub fn total_alpha(&self) -> f64 {
        ols(&self.benchmark, &self.total).0
    }

    /// Largest peak-to-trough loss of the compounded portfolio value.
    pub fn max_drawdown(&self) -> f64 {
        let mut max_dd: f64 = 0.0;
        let mut peak: f64 = 0.0;
        for cum_ret in compound(&self.total, Compounding::Product) {
            peak = peak.max(cum_ret);
            max_dd = max_dd.max((peak - cum_ret) / (1.0 + peak));
        }
        max_dd
    }

    /// Mean one-way turnover between consecutive rebalances.
    pub fn average_turnover(&self) -> f64 {
        mean(&self.turnover)
    }

    /// Mean sum of absolute weights.
    pub fn average_gross_leverage(&self) -> f64 {
        mean(&self.gross_leverage)
    }

    /// Per-date `total_ret`, `bmk_ret` and `active_ret`.
    ///
    /// # Errors
    ///
    /// Propagates polars errors.
    pub fn returns(&self) -> Result<DataFrame> {
        self.frame(self.total.clone(), self.benchmark.clone(), self.active.clone())
    }

    /// Cumulative `total_ret`, `bmk_ret` and `active_ret` per date.
    ///
    /// # Errors
    ///
    /// Propagates polars errors.
    pub fn cumulative_returns(&self, compounding: Compounding) -> Result<DataFrame> {
        self.frame(
            compound(&self.total, compounding),
            compound(&self.benchmark, compounding),
            compound(&self.active, compounding),
        )
    }

    fn frame(&self, total: Vec<f64>, bmk: Vec<f64>, active: Vec<f64>) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            date_column("date", &self.dates),
            Column::new("total_ret".into(), total),
            Column::new("bmk_ret".into(), bmk),
            Column::new("active_ret".into(), active),
        ])?)
    }

    /// All statistics in one serializable record.
    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary {
            interval: self.interval,
            annualized: self.annualize,
            periods: self.periods(),
            start_date: self.dates.first().copied(),
            end_date: self.dates.last().copied(),
            expected_return: self.expected_return(),
            volatility: self.volatility(),
            sharpe_ratio: self.sharpe_ratio(),
            expected_benchmark_return: self.expected_benchmark_return(),
            benchmark_volatility: self.benchmark_volatility(),
            expected_active_return: self.expected_active_return(),
            active_risk: self.active_risk(),
            information_ratio: self.information_ratio(),
            total_beta: self.total_beta(),
            total_alpha: self.total_alpha(),
            max_drawdown: self.max_drawdown(),
            average_turnover: self.average_turnover(),
            average_gross_leverage: self.average_gross_leverage(),
        }
    }
}

/// Snapshot of every performance statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Rebalance interval
    pub interval: Interval,
    /// Whether means and volatilities are annualized
    pub annualized: bool,
    /// Number of evaluated periods
    pub periods: usize,
    /// First evaluated date
    pub start_date: Option<Date>,
    /// Last evaluated date
    pub end_date: Option<Date>,
    /// Mean portfolio return
    pub expected_return: f64,
    /// Portfolio volatility
    pub volatility: f64,
    /// Sharpe ratio
    pub sharpe_ratio: f64,
    /// Mean benchmark return
    pub expected_benchmark_return: f64,
    /// Benchmark volatility
    pub benchmark_volatility: f64,
    /// Mean active return
    pub expected_active_return: f64,
    /// Active risk
    pub active_risk: f64,
    /// Information ratio
    pub information_ratio: f64,
    /// Beta to the benchmark
    pub total_beta: f64,
    /// Per-period regression intercept
    pub total_alpha: f64,
    /// Maximum drawdown
    pub max_drawdown: f64,
    /// Mean one-way turnover
    pub average_turnover: f64,
    /// Mean gross leverage
    pub average_gross_leverage: f64,
}

impl fmt::Display for PerformanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = |x: f64| format!("{:.2}%", x * 100.0);
        let num = |x: f64| format!("{x:.2}");
        let rows = [
            (
                "Expected Return",
                pct(self.expected_return),
                pct(self.expected_benchmark_return),
                pct(self.expected_active_return),
            ),
            (
                "Volatility",
                pct(self.volatility),
                pct(self.benchmark_volatility),
                pct(self.active_risk),
            ),
            ("Sharpe Ratio", num(self.sharpe_ratio), String::new(), String::new()),
            ("Information Ratio", num(self.information_ratio), String::new(), String::new()),
            ("Total Beta", num(self.total_beta), String::new(), String::new()),
            ("Total Alpha", pct(self.total_alpha), String::new(), String::new()),
            ("Max Drawdown", pct(self.max_drawdown), String::new(), String::new()),
            ("Avg Turnover", pct(self.average_turnover), String::new(), String::new()),
            ("Avg Gross Leverage", num(self.average_gross_leverage), String::new(), String::new()),
        ];

        writeln!(f, "{} Performance Summary {}", "-".repeat(20), "-".repeat(20))?;
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => {
                writeln!(f, "{start} to {end}, {} {} periods", self.periods, self.interval)?;
            }
            _ => writeln!(f, "no evaluated periods")?,
        }
        writeln!(f)?;
        writeln!(f, "{:<20} {:>12} {:>12} {:>12}", "Metric", "Portfolio", "Benchmark", "Active")?;
        writeln!(f, "{}", "-".repeat(59))?;
        for (name, portfolio, benchmark, active) in rows {
            writeln!(f, "{name:<20} {portfolio:>12} {benchmark:>12} {active:>12}")?;
        }
        Ok(())
    }
}

fn compound(returns: &[f64], compounding: Compounding) -> Vec<f64> {
    match compounding {
        Compounding::Sum => returns
            .iter()
            .scan(0.0, |acc, r| {
                *acc += r.ln_1p();
                Some(*acc)
            })
            .collect(),
        Compounding::Product => returns
            .iter()
            .scan(1.0, |acc, r| {
                *acc *= 1.0 + r;
                Some(*acc - 1.0)
            })
            .collect(),
    }
}

/// Half the summed absolute weight change between consecutive rebalance
/// dates. Assets entering or leaving count against zero.
fn turnover(df: &DataFrame) -> Result<Vec<f64>> {
    let dates = date_values(df, "date")?;
    let ids = str_values(df, "asset_id")?;
    let weights = f64_values(df, "weight")?;

    let mut by_date: BTreeMap<Date, HashMap<String, f64>> = BTreeMap::new();
    for ((date, id), w) in dates.into_iter().zip(ids).zip(weights) {
        by_date.entry(date).or_default().insert(id, w);
    }

    let books: Vec<&HashMap<String, f64>> = by_date.values().collect();
    Ok(books
        .windows(2)
        .map(|pair| {
            let (prev, next) = (pair[0], pair[1]);
            let traded: f64 = next
                .iter()
                .map(|(id, w)| (w - prev.get(id).copied().unwrap_or(0.0)).abs())
                .sum();
            let closed: f64 = prev
                .iter()
                .filter(|(id, _)| !next.contains_key(*id))
                .map(|(_, w)| w.abs())
                .sum();
            0.5 * (traded + closed)
        })
        .collect())
}
