//! Typed record tables.
//!
//! Every stage of the pipeline hands the next one a validated wrapper around a
//! polars [`DataFrame`]. Validation happens once, eagerly, at construction:
//! the column set must match exactly, each column must carry its declared
//! dtype, non-nullable columns must be free of nulls and key columns must be
//! unique. Columns are reordered into their canonical order. Nothing is ever
//! coerced.

use crate::types::{Date, date_lit, date_values, str_values};
use crate::{AssetId, Result, TaviraError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Logical type of a record column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Calendar date.
    Date,
    /// UTF-8 identifier.
    Str,
    /// 64-bit float.
    Float,
}

impl ColumnKind {
    /// The polars dtype this kind must be stored as.
    #[must_use]
    pub const fn dtype(self) -> DataType {
        match self {
            Self::Date => DataType::Date,
            Self::Str => DataType::String,
            Self::Float => DataType::Float64,
        }
    }
}

/// Declaration of one column of a record table.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    /// Column name.
    pub name: &'static str,
    /// Required dtype.
    pub kind: ColumnKind,
    /// Whether nulls are allowed.
    pub nullable: bool,
}

const fn column(name: &'static str, kind: ColumnKind, nullable: bool) -> ColumnSpec {
    ColumnSpec {
        name,
        kind,
        nullable,
    }
}

/// A validated table with a fixed column contract.
pub trait Record: Sized {
    /// Table name used in diagnostics.
    const NAME: &'static str;
    /// Columns in canonical order.
    const COLUMNS: &'static [ColumnSpec];
    /// Columns that jointly identify a row.
    const KEYS: &'static [&'static str];

    /// Wraps an already validated frame.
    #[doc(hidden)]
    fn from_validated(data: DataFrame) -> Self;

    /// Borrows the underlying frame.
    fn data(&self) -> &DataFrame;

    /// Validates `df` against the contract and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::SchemaViolation`] for a column set or dtype
    /// mismatch and [`TaviraError::DuplicateKey`] for repeated keys.
    fn try_new(df: DataFrame) -> Result<Self> {
        validate(df, Self::NAME, Self::COLUMNS, Self::KEYS).map(Self::from_validated)
    }

    /// An empty table with the canonical schema.
    fn empty() -> Self {
        Self::from_validated(DataFrame::empty_with_schema(&schema_of(Self::COLUMNS)))
    }

    /// The canonical polars schema.
    fn schema() -> Schema {
        schema_of(Self::COLUMNS)
    }
}

fn schema_of(columns: &[ColumnSpec]) -> Schema {
    columns
        .iter()
        .map(|c| Field::new(c.name.into(), c.kind.dtype()))
        .collect()
}

fn validate(
    df: DataFrame,
    table: &'static str,
    columns: &[ColumnSpec],
    keys: &[&str],
) -> Result<DataFrame> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let missing: Vec<&str> = columns
        .iter()
        .map(|c| c.name)
        .filter(|name| !present.iter().any(|p| p == name))
        .collect();
    if !missing.is_empty() {
        return Err(TaviraError::schema(
            table,
            format!("missing columns {missing:?}"),
        ));
    }

    let extra: Vec<&String> = present
        .iter()
        .filter(|p| !columns.iter().any(|c| c.name == p.as_str()))
        .collect();
    if !extra.is_empty() {
        return Err(TaviraError::schema(
            table,
            format!("unexpected columns {extra:?}"),
        ));
    }

    for spec in columns {
        let col = df.column(spec.name)?;
        let expected = spec.kind.dtype();
        if col.dtype() != &expected {
            return Err(TaviraError::schema(
                table,
                format!(
                    "column {} has type {}, expected {}",
                    spec.name,
                    col.dtype(),
                    expected
                ),
            ));
        }
        if !spec.nullable && col.null_count() > 0 {
            return Err(TaviraError::schema(
                table,
                format!("column {} contains {} nulls", spec.name, col.null_count()),
            ));
        }
    }

    let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
    let df = df.select(names)?;

    if !keys.is_empty() && df.height() > 1 {
        let duplicates = df
            .clone()
            .lazy()
            .group_by(keys.iter().map(|k| col(*k)).collect::<Vec<_>>())
            .agg([len().alias("__count")])
            .filter(col("__count").gt(lit(1)))
            .limit(1)
            .collect()?;

        if duplicates.height() > 0 {
            let key = keys
                .iter()
                .map(|k| {
                    duplicates
                        .column(k)
                        .and_then(|c| c.get(0).map(|v| format!("{k}={v}")))
                })
                .collect::<PolarsResult<Vec<_>>>()?
                .join(", ");
            return Err(TaviraError::DuplicateKey { table, key });
        }
    }

    Ok(df)
}

macro_rules! record_table {
    (
        $(#[$meta:meta])*
        $name:ident,
        keys = [$($key:literal),*],
        columns = [$(($col:literal, $kind:ident, $nullable:literal)),+ $(,)?]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            data: DataFrame,
        }

        impl Record for $name {
            const NAME: &'static str = stringify!($name);
            const COLUMNS: &'static [ColumnSpec] =
                &[$(column($col, ColumnKind::$kind, $nullable)),+];
            const KEYS: &'static [&'static str] = &[$($key),*];

            fn from_validated(data: DataFrame) -> Self {
                Self { data }
            }

            fn data(&self) -> &DataFrame {
                &self.data
            }
        }

        impl $name {
            /// Validates `df` against the table contract.
            pub fn new(df: DataFrame) -> Result<Self> {
                <Self as Record>::try_new(df)
            }

            /// Returns a reference to the underlying DataFrame.
            pub const fn data(&self) -> &DataFrame {
                &self.data
            }

            /// Consumes self and returns the underlying DataFrame.
            pub fn into_inner(self) -> DataFrame {
                self.data
            }

            /// Number of rows.
            pub fn len(&self) -> usize {
                self.data.height()
            }

            /// Whether the table has no rows.
            pub fn is_empty(&self) -> bool {
                self.data.height() == 0
            }
        }

        impl TryFrom<DataFrame> for $name {
            type Error = TaviraError;

            fn try_from(df: DataFrame) -> Result<Self> {
                Self::new(df)
            }
        }

        impl AsRef<DataFrame> for $name {
            fn as_ref(&self) -> &DataFrame {
                &self.data
            }
        }
    };
}

record_table!(
    /// Point-in-time universe membership: one row per eligible asset per date.
    Universe,
    keys = ["date", "asset_id"],
    columns = [("date", Date, false), ("asset_id", Str, false)]
);

record_table!(
    /// Realized per-period returns with market data used for the benchmark.
    Returns,
    keys = ["date", "asset_id"],
    columns = [
        ("date", Date, false),
        ("asset_id", Str, false),
        ("ret", Float, true),
        ("market_cap", Float, true),
        ("price", Float, true),
    ]
);

record_table!(
    /// Per-asset risk forecasts.
    TotalRisk,
    keys = ["date", "asset_id"],
    columns = [
        ("date", Date, false),
        ("asset_id", Str, false),
        ("total_risk", Float, true),
        ("specific_risk", Float, true),
        ("predicted_beta", Float, true),
    ]
);

record_table!(
    /// Sparse factor exposures for a single date.
    FactorExposures,
    keys = ["asset_id", "factor"],
    columns = [
        ("asset_id", Str, false),
        ("factor", Str, false),
        ("exposure", Float, true),
    ]
);

record_table!(
    /// Sparse, usually upper-triangular, factor covariances for a single date.
    FactorCovariances,
    keys = ["factor_1", "factor_2"],
    columns = [
        ("factor_1", Str, false),
        ("factor_2", Str, false),
        ("covariance", Float, true),
    ]
);

record_table!(
    /// Specific (idiosyncratic) risk for a single date.
    SpecificRisk,
    keys = ["asset_id"],
    columns = [("asset_id", Str, false), ("specific_risk", Float, true)]
);

record_table!(
    /// Raw per-asset feature. A null value means insufficient history.
    Signal,
    keys = ["date", "asset_id"],
    columns = [
        ("date", Date, false),
        ("asset_id", Str, false),
        ("signal", Float, true),
    ]
);

record_table!(
    /// Cross-sectionally normalized signal.
    Score,
    keys = ["date", "asset_id"],
    columns = [
        ("date", Date, false),
        ("asset_id", Str, false),
        ("score", Float, false),
    ]
);

record_table!(
    /// Expected-return estimate per asset per date.
    Alpha,
    keys = ["date", "asset_id"],
    columns = [
        ("date", Date, false),
        ("asset_id", Str, false),
        ("alpha", Float, false),
    ]
);

record_table!(
    /// Portfolio weights for one or more rebalance dates.
    Portfolio,
    keys = ["date", "asset_id"],
    columns = [
        ("date", Date, false),
        ("asset_id", Str, false),
        ("weight", Float, false),
    ]
);

record_table!(
    /// Profit-and-loss record: weights joined with next-period realized returns.
    ///
    /// `forward_return` is null for the last observation of each asset.
    AssetReturns,
    keys = ["date", "asset_id"],
    columns = [
        ("date", Date, false),
        ("asset_id", Str, false),
        ("weight", Float, false),
        ("forward_return", Float, true),
    ]
);

impl Universe {
    /// Sorted, unique rebalance dates.
    pub fn dates(&self) -> Result<Vec<Date>> {
        let mut dates = date_values(&self.data, "date")?;
        dates.sort_unstable();
        dates.dedup();
        Ok(dates)
    }

    /// Sorted asset ids eligible on `date`.
    pub fn assets_on(&self, date: Date) -> Result<Vec<AssetId>> {
        let slice = self
            .data
            .clone()
            .lazy()
            .filter(col("date").eq(date_lit(date)))
            .select([col("asset_id")])
            .collect()?;
        let mut ids = str_values(&slice, "asset_id")?;
        ids.sort_unstable();
        Ok(ids)
    }
}

impl Portfolio {
    /// Concatenates per-period portfolios into one table sorted by
    /// `(date, asset_id)`.
    pub fn concat(portfolios: Vec<Self>) -> Result<Self> {
        let frames: Vec<LazyFrame> = portfolios
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.data.lazy())
            .collect();
        if frames.is_empty() {
            return Ok(<Self as Record>::empty());
        }
        let data = concat(frames, UnionArgs::default())?
            .sort(["date", "asset_id"], SortMultipleOptions::default())
            .collect()?;
        Self::new(data)
    }
}

impl AssetReturns {
    /// Writes the table to a Parquet file.
    pub fn write_parquet(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        let mut df = self.data.clone();
        ParquetWriter::new(&mut file).finish(&mut df)?;
        Ok(())
    }

    /// Reads and validates a table previously written with
    /// [`AssetReturns::write_parquet`].
    pub fn read_parquet(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let df = ParquetReader::new(file).finish()?;
        Self::new(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::date_column;
    use rstest::rstest;

    fn d(m: u32) -> Date {
        Date::from_ymd_opt(2024, m, 28).unwrap()
    }

    fn alpha_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("alpha".into(), &[0.1, 0.2]),
            date_column("date", &[d(1), d(1)]),
            Column::new("asset_id".into(), &["A", "B"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_valid_table_is_reordered() {
        let alpha = Alpha::new(alpha_frame()).unwrap();
        let names: Vec<String> = alpha
            .data()
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["date", "asset_id", "alpha"]);
        assert_eq!(alpha.len(), 2);
    }

    #[test]
    fn test_missing_column_fails() {
        let df = alpha_frame().drop("alpha").unwrap();
        let err = Alpha::new(df).unwrap_err();
        assert!(matches!(err, TaviraError::SchemaViolation { table: "Alpha", .. }));
    }

    #[test]
    fn test_extra_column_fails() {
        let mut df = alpha_frame();
        df.with_column(Column::new("extra".into(), &[1.0, 2.0])).unwrap();
        let err = Alpha::new(df).unwrap_err();
        assert!(err.to_string().contains("unexpected columns"));
    }

    #[test]
    fn test_wrong_dtype_fails() {
        let df = DataFrame::new(vec![
            date_column("date", &[d(1)]),
            Column::new("asset_id".into(), &["A"]),
            Column::new("alpha".into(), &[1i64]),
        ])
        .unwrap();
        let err = Alpha::new(df).unwrap_err();
        assert!(err.to_string().contains("column alpha has type"));
    }

    #[test]
    fn test_null_in_non_nullable_column_fails() {
        let df = DataFrame::new(vec![
            date_column("date", &[d(1)]),
            Column::new("asset_id".into(), &["A"]),
            Column::new("score".into(), &[None::<f64>]),
        ])
        .unwrap();
        assert!(Score::new(df.clone()).is_err());

        let mut df = df;
        df.rename("score", "signal".into()).unwrap();
        assert!(Signal::new(df).is_ok());
    }

    #[test]
    fn test_duplicate_keys_fail() {
        let df = DataFrame::new(vec![
            date_column("date", &[d(1), d(1)]),
            Column::new("asset_id".into(), &["A", "A"]),
            Column::new("weight".into(), &[0.5, 0.5]),
        ])
        .unwrap();
        let err = Portfolio::new(df).unwrap_err();
        match err {
            TaviraError::DuplicateKey { table, key } => {
                assert_eq!(table, "Portfolio");
                assert!(key.contains("asset_id"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[rstest]
    #[case(Universe::schema().len(), 2)]
    #[case(Returns::schema().len(), 5)]
    #[case(TotalRisk::schema().len(), 5)]
    #[case(AssetReturns::schema().len(), 4)]
    fn test_schema_width(#[case] actual: usize, #[case] expected: usize) {
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_universe_slicing() {
        let df = DataFrame::new(vec![
            date_column("date", &[d(1), d(1), d(2)]),
            Column::new("asset_id".into(), &["B", "A", "C"]),
        ])
        .unwrap();
        let universe = Universe::new(df).unwrap();
        assert_eq!(universe.dates().unwrap(), vec![d(1), d(2)]);
        assert_eq!(universe.assets_on(d(1)).unwrap(), vec!["A", "B"]);
        assert!(universe.assets_on(d(3)).unwrap().is_empty());
    }

    #[test]
    fn test_portfolio_concat() {
        let p1 = Portfolio::new(
            DataFrame::new(vec![
                date_column("date", &[d(2)]),
                Column::new("asset_id".into(), &["A"]),
                Column::new("weight".into(), &[1.0]),
            ])
            .unwrap(),
        )
        .unwrap();
        let p2 = Portfolio::new(
            DataFrame::new(vec![
                date_column("date", &[d(1)]),
                Column::new("asset_id".into(), &["B"]),
                Column::new("weight".into(), &[1.0]),
            ])
            .unwrap(),
        )
        .unwrap();

        let all = Portfolio::concat(vec![p1, Portfolio::empty(), p2]).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(date_values(all.data(), "date").unwrap(), vec![d(1), d(2)]);

        assert!(Portfolio::concat(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_asset_returns_parquet_roundtrip() {
        let df = DataFrame::new(vec![
            date_column("date", &[d(1), d(2)]),
            Column::new("asset_id".into(), &["A", "A"]),
            Column::new("weight".into(), &[1.0, 1.0]),
            Column::new("forward_return".into(), &[Some(0.01), None]),
        ])
        .unwrap();
        let returns = AssetReturns::new(df).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asset_returns.parquet");
        returns.write_parquet(&path).unwrap();

        let loaded = AssetReturns::read_parquet(&path).unwrap();
        assert!(loaded.data().equals_missing(returns.data()));
    }
}
