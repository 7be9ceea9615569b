//! Summary command implementation.

use crate::cmd::OutputFormat;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tavira_data::{DataConfig, ParquetStore};
use tavira_eval::{Benchmark, Compounding, Performance, PerformanceSummary};
use tavira_traits::types::{date_values, opt_f64_values};
use tavira_traits::{AssetReturns, Interval, MarketDataProvider, UniverseProvider};

/// Prints a boxed section header.
pub(crate) fn print_header(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{title:^62}║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
}

/// Last cumulative portfolio return, if any period was evaluated.
pub(crate) fn final_cumulative(
    performance: &Performance,
    compounding: Compounding,
) -> Result<Option<f64>> {
    let cumulative = performance.cumulative_returns(compounding)?;
    Ok(opt_f64_values(&cumulative, "total_ret")?
        .last()
        .copied()
        .flatten())
}

#[derive(Serialize)]
struct SummaryReport {
    input: String,
    summary: PerformanceSummary,
    cumulative_return: Option<f64>,
}

/// Summarize a backtest result previously written to Parquet.
pub(crate) fn summarize(
    input: &Path,
    interval: Interval,
    data: Option<&DataConfig>,
    annualize: bool,
    format: OutputFormat,
) -> Result<()> {
    let results = AssetReturns::read_parquet(input)
        .with_context(|| format!("reading {}", input.display()))?;

    let benchmark = data
        .map(|config| load_benchmark(config, interval, &results))
        .transpose()?
        .flatten();

    let performance = Performance::new(
        interval,
        &results,
        benchmark.as_ref().map(Benchmark::weights),
    )?
    .with_annualize(annualize);
    let cumulative = final_cumulative(&performance, Compounding::Product)?;

    match format {
        OutputFormat::Json => {
            let report = SummaryReport {
                input: input.display().to_string(),
                summary: performance.summary(),
                cumulative_return: cumulative,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            print_header("Performance");
            println!("Input: {}", input.display());
            println!();
            println!("{}", performance.summary());
            if let Some(value) = cumulative {
                println!("Cumulative return: {:.2}%", value * 100.0);
            }
            println!();
        }
    }
    Ok(())
}

/// Market-cap-weighted benchmark over the dates spanned by `results`.
fn load_benchmark(
    config: &DataConfig,
    interval: Interval,
    results: &AssetReturns,
) -> Result<Option<Benchmark>> {
    let dates = date_values(results.data(), "date")?;
    let (Some(start), Some(end)) = (dates.iter().min(), dates.iter().max()) else {
        return Ok(None);
    };

    let store = ParquetStore::new(config.clone());
    let universe = store.load_universe(interval, *start, *end)?;
    let returns = store.load_returns(interval, *start, *end)?;
    Ok(Some(Benchmark::market_cap_weighted(&universe, &returns)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tavira_data::SyntheticMarket;
    use tavira_eval::{BacktestConfig, Backtester, Strategy};
    use tavira_optimize::{Constraint, MeanVarianceEfficient};
    use tavira_risk::RiskConfig;
    use tavira_signals::{GrinoldKahn, Reversal, ZScore};

    fn saved_results(dir: &Path) -> (DataConfig, std::path::PathBuf) {
        let data = DataConfig::new(dir);
        let market = SyntheticMarket::new(5, 6);
        let dates = market.dates().unwrap();
        let store = Arc::new(market.build().unwrap());
        store.write_parquet(&data, Interval::Monthly).unwrap();

        let config = BacktestConfig {
            interval: Interval::Monthly,
            start_date: dates[0],
            end_date: dates[5],
            show_progress: false,
            lookback: 0,
        };
        let backtester = Backtester::new(
            config,
            store.as_ref(),
            store.as_ref(),
            store.clone(),
            RiskConfig::default(),
        )
        .unwrap();
        let strategy = Strategy::builder()
            .signal(Reversal::default())
            .score(ZScore)
            .alpha(GrinoldKahn::default())
            .portfolio(MeanVarianceEfficient::default())
            .constraints([Constraint::FullInvestment, Constraint::LongOnly])
            .build()
            .unwrap();
        let results = backtester.run_sequential(&strategy).unwrap();
        let path = dir.join("results.parquet");
        results.write_parquet(&path).unwrap();
        (data, path)
    }

    #[test]
    fn test_summarize_with_benchmark() {
        let dir = tempfile::TempDir::new().unwrap();
        let (data, path) = saved_results(dir.path());
        summarize(&path, Interval::Monthly, Some(&data), true, OutputFormat::Json).unwrap();
        summarize(&path, Interval::Monthly, None, false, OutputFormat::Text).unwrap();
    }

    #[test]
    fn test_benchmark_covers_result_dates() {
        let dir = tempfile::TempDir::new().unwrap();
        let (data, path) = saved_results(dir.path());
        let results = AssetReturns::read_parquet(&path).unwrap();
        let benchmark = load_benchmark(&data, Interval::Monthly, &results)
            .unwrap()
            .unwrap();

        let mut result_dates = date_values(results.data(), "date").unwrap();
        let mut bench_dates = date_values(benchmark.weights().data(), "date").unwrap();
        bench_dates.sort_unstable();
        bench_dates.dedup();
        result_dates.sort_unstable();
        result_dates.dedup();
        assert_eq!(bench_dates, result_dates);
    }

    #[test]
    fn test_missing_input_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.parquet");
        let err = summarize(&missing, Interval::Monthly, None, true, OutputFormat::Text)
            .unwrap_err();
        assert!(format!("{err:#}").contains("nope.parquet"));
    }
}
