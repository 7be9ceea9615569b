//! Market-cap-weighted benchmark.

use polars::prelude::*;
use tavira_traits::{Portfolio, Result, Returns, Universe};

/// Benchmark weights per date.
#[derive(Debug, Clone)]
pub struct Benchmark {
    weights: Portfolio,
}

impl Benchmark {
    /// Weights every universe member by its share of the date's total
    /// market cap.
    ///
    /// Members without a market cap on a date are left out of that date.
    ///
    /// # Errors
    ///
    /// Propagates polars and schema errors.
    pub fn market_cap_weighted(universe: &Universe, returns: &Returns) -> Result<Self> {
        let keys = [col("date"), col("asset_id")];
        let caps = returns
            .data()
            .clone()
            .lazy()
            .select([col("date"), col("asset_id"), col("market_cap")]);
        let df = universe
            .data()
            .clone()
            .lazy()
            .join(caps, keys.clone(), keys, JoinArgs::new(JoinType::Left))
            .filter(col("market_cap").is_not_null().and(col("market_cap").gt(lit(0.0))))
            .with_column(
                (col("market_cap") / col("market_cap").sum().over([col("date")])).alias("weight"),
            )
            .select([col("date"), col("asset_id"), col("weight")])
            .sort(["date", "asset_id"], SortMultipleOptions::default())
            .collect()?;
        Ok(Self {
            weights: Portfolio::new(df)?,
        })
    }

    /// Wraps precomputed weights.
    pub const fn from_weights(weights: Portfolio) -> Self {
        Self { weights }
    }

    /// Benchmark weights as a portfolio table.
    pub const fn weights(&self) -> &Portfolio {
        &self.weights
    }

    /// Consumes the benchmark.
    pub fn into_portfolio(self) -> Portfolio {
        self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tavira_traits::Date;
    use tavira_traits::types::{date_column, f64_values, str_values};

    #[test]
    fn test_weights_sum_to_one_per_date() {
        let d1 = Date::from_ymd_opt(2024, 1, 31).unwrap();
        let d2 = Date::from_ymd_opt(2024, 2, 29).unwrap();
        let universe = Universe::new(
            DataFrame::new(vec![
                date_column("date", &[d1, d1, d2, d2]),
                Column::new("asset_id".into(), &["A", "B", "A", "B"]),
            ])
            .unwrap(),
        )
        .unwrap();
        let returns = Returns::new(
            DataFrame::new(vec![
                date_column("date", &[d1, d1, d2, d2]),
                Column::new("asset_id".into(), &["A", "B", "A", "B"]),
                Column::new("ret".into(), &[0.01, 0.02, 0.03, 0.04]),
                Column::new("market_cap".into(), &[Some(300.0), Some(100.0), Some(50.0), None]),
                Column::new("price".into(), &[10.0, 20.0, 11.0, 21.0]),
            ])
            .unwrap(),
        )
        .unwrap();

        let benchmark = Benchmark::market_cap_weighted(&universe, &returns).unwrap();
        let df = benchmark.weights().data();
        assert_eq!(str_values(df, "asset_id").unwrap(), ["A", "B", "A"]);
        let w = f64_values(df, "weight").unwrap();
        assert_relative_eq!(w[0], 0.75);
        assert_relative_eq!(w[1], 0.25);
        assert_relative_eq!(w[2], 1.0);
    }
}
