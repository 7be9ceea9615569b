//! Property-based tests for covariance assembly.

use polars::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;
use tavira_risk::{RiskConfig, RiskModelAssembler};
use tavira_traits::{
    AssetId, Date, FactorCovariances, FactorExposures, Result, RiskModelProvider, SpecificRisk,
};

#[derive(Debug, Clone)]
struct RandomModel {
    exposures: Vec<(String, String, f64)>,
    covariances: Vec<(String, String, f64)>,
    specific: Vec<(String, f64)>,
}

impl RiskModelProvider for RandomModel {
    fn load_factor_exposures(&self, _date: Date) -> Result<FactorExposures> {
        FactorExposures::new(df!(
            "asset_id" => self.exposures.iter().map(|e| e.0.clone()).collect::<Vec<_>>(),
            "factor" => self.exposures.iter().map(|e| e.1.clone()).collect::<Vec<_>>(),
            "exposure" => self.exposures.iter().map(|e| e.2).collect::<Vec<_>>(),
        )?)
    }

    fn load_factor_covariances(&self, _date: Date) -> Result<FactorCovariances> {
        FactorCovariances::new(df!(
            "factor_1" => self.covariances.iter().map(|e| e.0.clone()).collect::<Vec<_>>(),
            "factor_2" => self.covariances.iter().map(|e| e.1.clone()).collect::<Vec<_>>(),
            "covariance" => self.covariances.iter().map(|e| e.2).collect::<Vec<_>>(),
        )?)
    }

    fn load_specific_risk(&self, _date: Date) -> Result<SpecificRisk> {
        SpecificRisk::new(df!(
            "asset_id" => self.specific.iter().map(|e| e.0.clone()).collect::<Vec<_>>(),
            "specific_risk" => self.specific.iter().map(|e| e.1).collect::<Vec<_>>(),
        )?)
    }
}

fn model_strategy() -> impl Strategy<Value = (RandomModel, Vec<AssetId>)> {
    (1usize..5, 1usize..8).prop_flat_map(|(k, n)| {
        let exposures = prop::collection::vec(-2.0f64..2.0, n * k);
        let covariances = prop::collection::vec(prop::option::of(-5.0f64..5.0), k * k);
        let specific = prop::collection::vec(prop::option::of(1.0f64..50.0), n);
        let keep = prop::collection::vec(any::<bool>(), n);
        (exposures, covariances, specific, keep).prop_map(move |(x, c, s, keep)| {
            let asset = |i: usize| format!("ID{i:02}");
            let factor = |j: usize| format!("F{j}");
            let mut model = RandomModel {
                exposures: Vec::new(),
                covariances: Vec::new(),
                specific: Vec::new(),
            };
            for i in 0..n {
                for j in 0..k {
                    model.exposures.push((asset(i), factor(j), x[i * k + j]));
                }
                if let Some(v) = s[i] {
                    model.specific.push((asset(i), v));
                }
            }
            for a in 0..k {
                for b in a..k {
                    if let Some(v) = c[a * k + b] {
                        model.covariances.push((factor(a), factor(b), v));
                    }
                }
            }
            if model.covariances.is_empty() {
                model.covariances.push((factor(0), factor(0), 1.0));
            }
            // request in reverse order so sorting is exercised
            let mut ids: Vec<AssetId> = (0..n).filter(|i| keep[*i]).map(asset).collect();
            ids.reverse();
            (model, ids)
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_covariance_symmetric_and_covers_request((model, ids) in model_strategy()) {
        let date = Date::from_ymd_opt(2024, 6, 28).unwrap();
        let assembler = RiskModelAssembler::new(Arc::new(model), RiskConfig::default());
        let cov = assembler.build_covariance(date, &ids).unwrap();

        let mut sorted = ids.clone();
        sorted.sort();
        prop_assert_eq!(cov.asset_ids(), sorted.as_slice());
        prop_assert_eq!(cov.matrix().dim(), (ids.len(), ids.len()));
        prop_assert!(cov.is_symmetric(1e-12));
    }
}
