//! Statistical helpers shared by score construction and performance
//! evaluation.
//!
//! All functions ignore non-finite inputs when estimating moments and use the
//! sample (N-1) standard deviation.

/// Standard deviations at or below this value are treated as zero variance.
pub const MIN_STD_THRESHOLD: f64 = 1e-10;

fn finite(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|x| x.is_finite())
}

/// Arithmetic mean of the finite values, NaN when there are none.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    let (sum, n) = finite(values).fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Sample standard deviation of the finite values, NaN below two observations.
#[must_use]
pub fn sample_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let n = finite(values).count();
    if n < 2 {
        return f64::NAN;
    }
    let ss: f64 = finite(values).map(|x| (x - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Moments computed while standardizing.
#[derive(Debug, Clone, Copy)]
pub struct StandardizeResult {
    /// Mean of the finite inputs.
    pub mean: f64,
    /// Sample standard deviation of the finite inputs.
    pub std: f64,
    /// False when the inputs had no usable dispersion and zeros were returned.
    pub applied: bool,
}

/// Standardizes values to z-scores.
///
/// When the dispersion is below [`MIN_STD_THRESHOLD`] (constant input or a
/// single observation) every output is `0.0`. Non-finite inputs stay NaN.
///
/// # Examples
///
/// ```
/// use tavira_traits::stats::standardize;
///
/// let (z, result) = standardize(&[1.0, 2.0, 3.0]);
/// assert!(result.applied);
/// assert!((z[0] + 1.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn standardize(values: &[f64]) -> (Vec<f64>, StandardizeResult) {
    let m = mean(values);
    let s = sample_std(values);
    let applied = s.is_finite() && s > MIN_STD_THRESHOLD;

    let z = values
        .iter()
        .map(|x| match (x.is_finite(), applied) {
            (false, _) => f64::NAN,
            (true, true) => (x - m) / s,
            (true, false) => 0.0,
        })
        .collect();

    (
        z,
        StandardizeResult {
            mean: m,
            std: s,
            applied,
        },
    )
}

/// Ordinary least squares fit of `y = alpha + beta * x` over pairs where both
/// sides are finite. Returns `(alpha, beta)`, NaN when `x` has no variance.
#[must_use]
pub fn ols(x: &[f64], y: &[f64]) -> (f64, f64) {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .collect();
    if pairs.len() < 2 {
        return (f64::NAN, f64::NAN);
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = pairs.iter().map(|p| (p.0 - mx).powi(2)).sum();
    let sxy: f64 = pairs.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();

    if sxx <= f64::EPSILON {
        return (f64::NAN, f64::NAN);
    }
    let beta = sxy / sxx;
    (my - beta * mx, beta)
}
