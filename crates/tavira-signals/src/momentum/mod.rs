//! Return-based signals.
//!
//! Both flavours sum log returns over a trailing window per asset and then
//! lag the sum by at least one period, so the value at `t` only depends on
//! returns strictly before `t`:
//! - Long-term momentum: 11-month (230-day) window, skipping the latest month
//! - Short-term reversal: the negated latest month (22 days)

mod long_term;
mod short_term;

pub use long_term::{Momentum, MomentumConfig};
pub use short_term::{Reversal, ReversalConfig};

use polars::prelude::*;
use tavira_traits::{History, Result, Signal, TaviraError};

/// Rolling sum of `ln(1 + ret)` per asset over `window` rows, lagged by `skip`
/// rows, multiplied by `sign`.
fn lagged_log_return_sum(history: &History, window: usize, skip: usize, sign: f64) -> Result<Signal> {
    if window == 0 {
        return Err(TaviraError::InvalidData("window must be positive".to_string()));
    }
    if skip == 0 {
        return Err(TaviraError::InvalidData(
            "skip must be at least one period".to_string(),
        ));
    }
    history.require(&["ret"])?;

    let options = RollingOptionsFixedWindow {
        window_size: window,
        min_periods: window,
        ..Default::default()
    };

    let df = history
        .data()
        .clone()
        .lazy()
        .with_column(col("ret").cast(DataType::Float64).log1p().alias("__logret"))
        .with_column(
            col("__logret")
                .rolling_sum(options)
                .over([col("asset_id")])
                .alias("signal"),
        )
        .with_column(
            (col("signal").shift(lit(skip as i64)).over([col("asset_id")]) * lit(sign))
                .alias("signal"),
        )
        .select([col("date"), col("asset_id"), col("signal")])
        .sort(
            ["asset_id", "date"],
            SortMultipleOptions::new().with_maintain_order(true),
        )
        .collect()?;

    Signal::new(df)
}
