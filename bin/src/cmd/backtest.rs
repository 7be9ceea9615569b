//! Backtest command implementation.

use crate::cmd::OutputFormat;
use crate::cmd::summary::{final_cumulative, print_header};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tavira_data::{DataConfig, ParquetStore};
use tavira_eval::{
    BacktestConfig, Backtester, Benchmark, Compounding, ExecutionMode, Performance,
    PerformanceSummary, PeriodFailure, Strategy,
};
use tavira_optimize::{Constraint, DecilePortfolio, MeanVarianceEfficient};
use tavira_risk::{RiskConfig, SpecificRiskPolicy};
use tavira_signals::registry::create_signal;
use tavira_signals::{GrinoldKahn, ZScore};
use tavira_traits::{Interval, RiskUnits};
use tracing::info;

/// Portfolio constructor selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum PortfolioKind {
    /// Mean-variance efficient under the risk model
    #[default]
    Mve,
    /// Equal weight across the top alpha decile
    TopDecile,
}

/// Parsed arguments of `tavira backtest`.
#[derive(Debug, Clone)]
pub(crate) struct BacktestArgs {
    pub(crate) strategy: String,
    pub(crate) interval: Interval,
    pub(crate) start: NaiveDate,
    pub(crate) end: NaiveDate,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) portfolio: PortfolioKind,
    pub(crate) gamma: f64,
    pub(crate) ic: f64,
    pub(crate) workers: Option<usize>,
    pub(crate) sequential: bool,
    pub(crate) units: RiskUnits,
    pub(crate) specific_risk: SpecificRiskPolicy,
    pub(crate) omit_factors: Vec<String>,
    pub(crate) output: Option<PathBuf>,
    pub(crate) data: DataConfig,
    pub(crate) benchmark: bool,
    pub(crate) progress: bool,
    pub(crate) format: OutputFormat,
}

impl BacktestArgs {
    fn mode(&self) -> ExecutionMode {
        if self.sequential {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Parallel {
                workers: self.workers,
            }
        }
    }

    fn risk_config(&self) -> RiskConfig {
        RiskConfig {
            units: self.units,
            specific_risk: self.specific_risk,
            omitted_factors: self.omit_factors.clone(),
        }
    }

    fn strategy(&self) -> Result<Strategy> {
        let signal = create_signal(&self.strategy, self.interval)?;
        let builder = Strategy::builder()
            .name(self.strategy.clone())
            .boxed_signal(signal)
            .score(ZScore)
            .alpha(GrinoldKahn::new(self.ic, self.units))
            .constraints(self.constraints.clone());
        let strategy = match self.portfolio {
            PortfolioKind::Mve => builder.portfolio(MeanVarianceEfficient::new(self.gamma)),
            PortfolioKind::TopDecile => builder.portfolio(DecilePortfolio::top()),
        }
        .build()?;
        Ok(strategy)
    }
}

#[derive(Serialize)]
struct BacktestReport<'a> {
    strategy: &'a str,
    constraints: Vec<String>,
    rows: usize,
    summary: PerformanceSummary,
    cumulative_return: Option<f64>,
    failures: &'a [PeriodFailure],
}

/// Run a backtest over the configured date range.
pub(crate) fn run_backtest(args: &BacktestArgs) -> Result<()> {
    let strategy = args.strategy()?;
    let store = ParquetStore::new(args.data.clone());
    let config = BacktestConfig {
        interval: args.interval,
        start_date: args.start,
        end_date: args.end,
        show_progress: args.progress,
        lookback: 0,
    }
    .with_lookback_for(&strategy);

    let backtester = Backtester::new(
        config,
        &store,
        &store,
        Arc::new(store.clone()),
        args.risk_config(),
    )
    .with_context(|| format!("loading data from {}", args.data.root().display()))?;

    let outcome = backtester.run(&strategy, args.mode())?;
    info!(
        rows = outcome.asset_returns.len(),
        failures = outcome.failures.len(),
        "backtest finished"
    );

    if let Some(path) = &args.output {
        outcome
            .asset_returns
            .write_parquet(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let benchmark = if args.benchmark {
        Some(Benchmark::market_cap_weighted(
            backtester.universe(),
            backtester.returns(),
        )?)
    } else {
        None
    };
    let performance = Performance::new(
        args.interval,
        &outcome.asset_returns,
        benchmark.as_ref().map(Benchmark::weights),
    )?;
    let cumulative = final_cumulative(&performance, Compounding::Product)?;

    match args.format {
        OutputFormat::Json => {
            let report = BacktestReport {
                strategy: strategy.name(),
                constraints: args.constraints.iter().map(ToString::to_string).collect(),
                rows: outcome.asset_returns.len(),
                summary: performance.summary(),
                cumulative_return: cumulative,
                failures: &outcome.failures,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            print_header("Backtest");
            println!("Strategy:    {}", strategy.name());
            println!("Period:      {} to {}", args.start, args.end);
            println!("Interval:    {}", args.interval);
            let constraints: Vec<String> =
                args.constraints.iter().map(ToString::to_string).collect();
            println!("Constraints: {}", constraints.join(", "));
            println!("Portfolio:   {}", strategy.portfolio().name());
            println!("Mode:        {}", describe(args.mode()));
            println!();

            if !outcome.failures.is_empty() {
                println!("Skipped {} period(s):", outcome.failures.len());
                for failure in &outcome.failures {
                    println!("  {}  {}", failure.date, failure.reason);
                }
                println!();
            }

            println!("{}", performance.summary());
            if let Some(value) = cumulative {
                println!("Cumulative return: {:.2}%", value * 100.0);
            }
            if let Some(path) = &args.output {
                println!("Results written to {}", path.display());
            }
            println!();
        }
    }

    Ok(())
}

fn describe(mode: ExecutionMode) -> String {
    match mode {
        ExecutionMode::Sequential => "sequential".to_string(),
        ExecutionMode::Parallel { workers: None } => "parallel".to_string(),
        ExecutionMode::Parallel { workers: Some(n) } => format!("parallel ({n} workers)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tavira_data::SyntheticMarket;

    fn args(data: DataConfig, start: NaiveDate, end: NaiveDate) -> BacktestArgs {
        BacktestArgs {
            strategy: "reversal".to_string(),
            interval: Interval::Monthly,
            start,
            end,
            constraints: vec![Constraint::FullInvestment, Constraint::LongOnly],
            portfolio: PortfolioKind::Mve,
            gamma: 2.0,
            ic: 0.05,
            workers: Some(2),
            sequential: false,
            units: RiskUnits::Percent,
            specific_risk: SpecificRiskPolicy::FillZero,
            omit_factors: Vec::new(),
            output: None,
            data,
            benchmark: true,
            progress: false,
            format: OutputFormat::Json,
        }
    }

    #[test]
    fn test_mode_selection() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        let mut a = args(DataConfig::default(), date, date);
        assert_eq!(a.mode(), ExecutionMode::Parallel { workers: Some(2) });
        a.sequential = true;
        assert_eq!(a.mode(), ExecutionMode::Sequential);
        assert_eq!(describe(ExecutionMode::Parallel { workers: Some(3) }), "parallel (3 workers)");
    }

    #[test]
    fn test_unknown_signal_is_an_error() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        let mut a = args(DataConfig::default(), date, date);
        a.strategy = "value".to_string();
        assert!(a.strategy().is_err());
    }

    #[test]
    fn test_run_backtest_writes_results() {
        let dir = tempfile::TempDir::new().unwrap();
        let data = DataConfig::new(dir.path());
        let market = SyntheticMarket::new(5, 6);
        let dates = market.dates().unwrap();
        market
            .build()
            .unwrap()
            .write_parquet(&data, Interval::Monthly)
            .unwrap();

        let output = dir.path().join("out").join("results.parquet");
        std::fs::create_dir_all(output.parent().unwrap()).unwrap();
        let mut a = args(data, dates[0], dates[5]);
        a.output = Some(output.clone());
        run_backtest(&a).unwrap();

        let restored = tavira_traits::AssetReturns::read_parquet(&output).unwrap();
        assert!(!restored.is_empty());
    }

    #[test]
    fn test_top_decile_portfolio_selected() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        let mut a = args(DataConfig::default(), date, date);
        assert_eq!(a.strategy().unwrap().portfolio().name(), "mve");
        a.portfolio = PortfolioKind::TopDecile;
        assert_eq!(a.strategy().unwrap().portfolio().name(), "decile");
    }

    #[test]
    fn test_missing_store_reports_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        let a = args(DataConfig::new(dir.path()), date, date);
        let err = run_backtest(&a).unwrap_err();
        assert!(format!("{err:#}").contains("loading data from"));
    }
}
