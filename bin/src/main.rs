//! Tavira CLI binary.
//!
//! Provides a command-line interface for running backtests against a Parquet
//! data store and summarizing their results.

mod cmd;
mod data;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use cmd::OutputFormat;
use cmd::backtest::PortfolioKind;
use std::path::PathBuf;
use std::process;
use tavira_optimize::Constraint;
use tavira_risk::SpecificRiskPolicy;
use tavira_traits::{Interval, RiskUnits};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "tavira")]
#[command(about = "Factor-model portfolio backtesting", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest and optionally write the results to Parquet
    Backtest {
        /// Signal driving the strategy (see `tavira signals`)
        #[arg(short, long, default_value = "momentum")]
        strategy: String,

        /// Rebalance interval
        #[arg(short, long, default_value = "monthly")]
        interval: Interval,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Comma-separated constraints, e.g. full-investment,long-only,max-weight=0.05
        #[arg(short, long, value_delimiter = ',', default_value = "full-investment,long-only")]
        constraints: Vec<Constraint>,

        /// Portfolio constructor
        #[arg(short, long, value_enum, default_value_t = PortfolioKind::Mve)]
        portfolio: PortfolioKind,

        /// Risk aversion
        #[arg(short, long, default_value_t = tavira_optimize::DEFAULT_RISK_AVERSION)]
        gamma: f64,

        /// Information coefficient of the Grinold-Kahn alpha
        #[arg(long, default_value_t = 0.05)]
        ic: f64,

        /// Worker threads (defaults to available cores)
        #[arg(short, long, conflicts_with = "sequential")]
        workers: Option<usize>,

        /// Process periods one at a time
        #[arg(long)]
        sequential: bool,

        /// Units of the stored risk figures
        #[arg(long, value_enum, default_value_t = UnitsArg::Percent)]
        units: UnitsArg,

        /// Treatment of assets without specific risk
        #[arg(long, value_enum, default_value_t = SpecificRiskArg::FillZero)]
        specific_risk: SpecificRiskArg,

        /// Factors left out of the risk model
        #[arg(long, value_delimiter = ',')]
        omit_factors: Vec<String>,

        /// Write the P&L table to this Parquet file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Data store root (defaults to $TAVIRA_DATA_ROOT)
        #[arg(long)]
        data_root: Option<PathBuf>,

        /// Compare against the market-cap-weighted benchmark
        #[arg(long)]
        benchmark: bool,

        /// Draw a progress bar
        #[arg(long)]
        progress: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Summarize a saved backtest result
    Summary {
        /// Parquet file written by `tavira backtest --output`
        #[arg(long)]
        input: PathBuf,

        /// Rebalance interval of the result
        #[arg(short, long, default_value = "monthly")]
        interval: Interval,

        /// Compare against the market-cap-weighted benchmark
        #[arg(long)]
        benchmark: bool,

        /// Data store root, needed with --benchmark
        #[arg(long)]
        data_root: Option<PathBuf>,

        /// Report per-period means and volatilities
        #[arg(long)]
        no_annualize: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List available signals
    Signals {
        /// Show detailed information
        #[arg(long)]
        detailed: bool,
    },
}

/// Risk figure units accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UnitsArg {
    Percent,
    Decimal,
}

impl From<UnitsArg> for RiskUnits {
    fn from(arg: UnitsArg) -> Self {
        match arg {
            UnitsArg::Percent => Self::Percent,
            UnitsArg::Decimal => Self::Decimal,
        }
    }
}

/// Specific-risk policies accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SpecificRiskArg {
    FillZero,
    DropAsset,
}

impl From<SpecificRiskArg> for SpecificRiskPolicy {
    fn from(arg: SpecificRiskArg) -> Self {
        match arg {
            SpecificRiskArg::FillZero => Self::FillZero,
            SpecificRiskArg::DropAsset => Self::DropAsset,
        }
    }
}

impl Cli {
    /// Initialize logging based on verbosity level.
    fn init_logging(&self) {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Warning: failed to set tracing subscriber: {e}");
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    match cli.command {
        Commands::Backtest {
            strategy,
            interval,
            start,
            end,
            constraints,
            portfolio,
            gamma,
            ic,
            workers,
            sequential,
            units,
            specific_risk,
            omit_factors,
            output,
            data_root,
            benchmark,
            progress,
            format,
        } => {
            let args = cmd::backtest::BacktestArgs {
                strategy,
                interval,
                start,
                end,
                constraints,
                portfolio,
                gamma,
                ic,
                workers,
                sequential,
                units: units.into(),
                specific_risk: specific_risk.into(),
                omit_factors,
                output,
                data: data::data_config(data_root)?,
                benchmark,
                progress,
                format,
            };
            cmd::backtest::run_backtest(&args)?;
        }
        Commands::Summary {
            input,
            interval,
            benchmark,
            data_root,
            no_annualize,
            format,
        } => {
            let data = if benchmark {
                Some(data::data_config(data_root)?)
            } else {
                None
            };
            cmd::summary::summarize(&input, interval, data.as_ref(), !no_annualize, format)?;
        }
        Commands::Signals { detailed } => {
            cmd::signals::list_signals(detailed);
        }
    }

    Ok(())
}
