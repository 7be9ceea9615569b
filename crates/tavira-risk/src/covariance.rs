//! Labeled asset-by-asset covariance matrix.

use ndarray::Array2;
use polars::prelude::*;
use tavira_traits::{AssetId, Result, TaviraError};

/// Dense covariance matrix whose rows and columns follow `asset_ids`.
///
/// Asset ids are unique and sorted, so alpha and weight vectors built in the
/// same order line up positionally with the matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    asset_ids: Vec<AssetId>,
    matrix: Array2<f64>,
}

impl CovarianceMatrix {
    /// Wraps a matrix.
    ///
    /// # Errors
    ///
    /// Fails when the matrix is not `n × n` for `n` ids, or when the ids are
    /// not strictly increasing.
    pub fn new(asset_ids: Vec<AssetId>, matrix: Array2<f64>) -> Result<Self> {
        let n = asset_ids.len();
        if matrix.dim() != (n, n) {
            return Err(TaviraError::DimensionMismatch {
                expected: n,
                actual: matrix.nrows(),
            });
        }
        if asset_ids.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TaviraError::InvalidData(
                "covariance labels must be sorted and unique".to_string(),
            ));
        }
        Ok(Self { asset_ids, matrix })
    }

    /// Row and column labels.
    pub fn asset_ids(&self) -> &[AssetId] {
        &self.asset_ids
    }

    /// The dense matrix.
    pub const fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Consumes self, returning labels and matrix.
    pub fn into_parts(self) -> (Vec<AssetId>, Array2<f64>) {
        (self.asset_ids, self.matrix)
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.asset_ids.len()
    }

    /// Whether the matrix has no assets.
    pub fn is_empty(&self) -> bool {
        self.asset_ids.is_empty()
    }

    /// Position of `asset_id` in the labels.
    pub fn index_of(&self, asset_id: &str) -> Option<usize> {
        self.asset_ids
            .binary_search_by(|a| a.as_str().cmp(asset_id))
            .ok()
    }

    /// Covariance between two assets.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.matrix[[self.index_of(a)?, self.index_of(b)?]])
    }

    /// Whether `|Σᵢⱼ − Σⱼᵢ| <= tol` everywhere.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        let n = self.len();
        (0..n).all(|i| (i + 1..n).all(|j| (self.matrix[[i, j]] - self.matrix[[j, i]]).abs() <= tol))
    }

    /// Frame with an `asset_id` column followed by one column per asset.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.len() + 1);
        columns.push(Column::new("asset_id".into(), self.asset_ids.clone()));
        for (j, id) in self.asset_ids.iter().enumerate() {
            columns.push(Column::new(
                id.as_str().into(),
                self.matrix.column(j).to_vec(),
            ));
        }
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(v: &[&str]) -> Vec<AssetId> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lookup_and_frame() {
        let cov = CovarianceMatrix::new(
            ids(&["A", "B"]),
            array![[0.04, 0.01], [0.01, 0.09]],
        )
        .unwrap();

        assert_eq!(cov.len(), 2);
        assert_eq!(cov.get("B", "A"), Some(0.01));
        assert_eq!(cov.get("C", "A"), None);
        assert!(cov.is_symmetric(0.0));

        let df = cov.to_dataframe().unwrap();
        assert_eq!(df.shape(), (2, 3));
    }

    #[test]
    fn test_rejects_bad_shape_and_order() {
        assert!(CovarianceMatrix::new(ids(&["A"]), Array2::zeros((2, 2))).is_err());
        assert!(CovarianceMatrix::new(ids(&["B", "A"]), Array2::zeros((2, 2))).is_err());
        assert!(CovarianceMatrix::new(ids(&["A", "A"]), Array2::zeros((2, 2))).is_err());
    }

    #[test]
    fn test_asymmetry_detected() {
        let cov =
            CovarianceMatrix::new(ids(&["A", "B"]), array![[1.0, 0.5], [0.4, 1.0]]).unwrap();
        assert!(!cov.is_symmetric(1e-9));
        assert!(cov.is_symmetric(0.2));
    }
}
