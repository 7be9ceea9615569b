//! Property-based tests for the signal and score stages.

use polars::prelude::*;
use proptest::prelude::*;
use tavira_signals::{Momentum, MomentumConfig, Reversal, ZScore};
use tavira_traits::stats::{mean, sample_std, standardize};
use tavira_traits::types::{date_column, date_lit, opt_f64_values};
use tavira_traits::{Date, History, ScoreConstructor, Signal, SignalConstructor};

fn day(i: usize) -> Date {
    Date::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Days::new(i as u64)
}

fn history(returns: &[Vec<f64>]) -> History {
    let mut dates = Vec::new();
    let mut ids = Vec::new();
    let mut rets = Vec::new();
    for (a, series) in returns.iter().enumerate() {
        for (t, r) in series.iter().enumerate() {
            dates.push(day(t));
            ids.push(format!("A{a:03}"));
            rets.push(*r);
        }
    }
    let df = DataFrame::new(vec![
        date_column("date", &dates),
        Column::new("asset_id".into(), ids),
        Column::new("ret".into(), rets),
    ])
    .unwrap();
    History::new(df).unwrap()
}

fn values(signal: &Signal) -> Vec<Option<f64>> {
    opt_f64_values(signal.data(), "signal").unwrap()
}

fn returns_strategy() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..4, 3usize..20).prop_flat_map(|(assets, periods)| {
        prop::collection::vec(prop::collection::vec(-0.5f64..0.5, periods), assets)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Perturbing the return at `t + 1` leaves every signal value at or before
    /// `t` unchanged.
    #[test]
    fn prop_signal_has_no_look_ahead(
        returns in returns_strategy(),
        shock in -0.4f64..0.4,
        window in 1usize..4,
        skip in 1usize..3,
        pick in any::<prop::sample::Index>(),
    ) {
        let periods = returns[0].len();
        let t = pick.index(periods - 1);
        let signal = Momentum::new(MomentumConfig { window, skip });

        let base = values(&signal.signal(&history(&returns)).unwrap());

        let mut perturbed = returns.clone();
        for series in &mut perturbed {
            series[t + 1] += shock;
        }
        let after = values(&signal.signal(&history(&perturbed)).unwrap());

        for asset in 0..returns.len() {
            for s in 0..=t {
                let i = asset * periods + s;
                prop_assert_eq!(base[i], after[i]);
            }
        }
    }

    /// A perturbation at `t` never reaches the reversal signal at `t` either,
    /// since the minimum lag is one period.
    #[test]
    fn prop_reversal_ignores_same_period(
        returns in returns_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        let periods = returns[0].len();
        let t = pick.index(periods);
        let base = values(&Reversal::default().signal(&history(&returns)).unwrap());

        let mut perturbed = returns.clone();
        perturbed[0][t] += 0.25;
        let after = values(&Reversal::default().signal(&history(&perturbed)).unwrap());
        prop_assert_eq!(base[t], after[t]);
    }

    /// Z-scores have mean 0 and standard deviation 1 on every date with
    /// dispersion and are all zero on the others.
    #[test]
    fn prop_zscore_neutral(
        raw in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 2..30), 1..5),
    ) {
        let mut dates = Vec::new();
        let mut ids = Vec::new();
        let mut vals = Vec::new();
        for (t, cross_section) in raw.iter().enumerate() {
            for (a, v) in cross_section.iter().enumerate() {
                dates.push(day(t));
                ids.push(format!("A{a:03}"));
                vals.push(Some(*v));
            }
        }
        let signal = Signal::new(
            DataFrame::new(vec![
                date_column("date", &dates),
                Column::new("asset_id".into(), ids),
                Column::new("signal".into(), vals),
            ])
            .unwrap(),
        )
        .unwrap();

        let score = ZScore.score(&signal).unwrap();
        prop_assert_eq!(score.len(), signal.len());

        for (t, cross_section) in raw.iter().enumerate() {
            let (_, moments) = standardize(cross_section);
            let slice = score
                .data()
                .clone()
                .lazy()
                .filter(col("date").eq(date_lit(day(t))))
                .collect()
                .unwrap();
            let z = tavira_traits::types::f64_values(&slice, "score").unwrap();
            if !moments.applied {
                prop_assert!(z.iter().all(|v| *v == 0.0));
                continue;
            }
            // Near-constant dates lose precision when dividing by a tiny std.
            if moments.std > 1e-6 {
                prop_assert!(mean(&z).abs() < 1e-9);
                prop_assert!((sample_std(&z) - 1.0).abs() < 1e-9);
            }
        }
    }
}
