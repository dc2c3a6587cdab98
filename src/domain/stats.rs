//! Statistics Primitives
//!
//! Arithmetic building blocks shared by every analysis layer:
//! - mean / population standard deviation
//! - log returns: r_i = ln(close_i / close_{i-1})
//! - Pearson correlation
//! - ordinary least squares (single and multiple regressors)
//!
//! None of these functions panic or return NaN for degenerate input.
//! Empty or length-mismatched slices produce 0.0, zero variance produces
//! a correlation of 0.0, and non-finite intermediates are mapped to 0.0.

/// Variance below this is treated as zero
pub const MIN_VARIANCE: f64 = 1e-12;

/// Arithmetic mean, 0.0 for an empty slice
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    finite_or_zero(xs.iter().sum::<f64>() / xs.len() as f64)
}

/// Population standard deviation.
///
/// `mean_hint` skips recomputing the mean when the caller already has it.
pub fn standard_deviation(xs: &[f64], mean_hint: Option<f64>) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean_hint.unwrap_or_else(|| mean(xs));
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    finite_or_zero(variance.sqrt())
}

/// Log returns of a close series: length n-1.
///
/// Bars with a non-positive price on either side contribute a 0.0 return so
/// the output stays index-aligned with the input.
pub fn calculate_returns(closes: &[f64]) -> Vec<f64> {
    if closes.len() < 2 {
        return Vec::new();
    }
    closes
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 && w[1] > 0.0 {
                finite_or_zero((w[1] / w[0]).ln())
            } else {
                0.0
            }
        })
        .collect()
}

/// Pearson correlation coefficient on equal-length slices.
///
/// r = Σ[(a_i - ā)(b_i - b̄)] / √[Σ(a_i - ā)² × Σ(b_i - b̄)²]
///
/// Returns 0.0 for empty input, mismatched lengths, or zero variance in
/// either series. The result is clamped to [-1, 1].
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }

    let mean_a = mean(a);
    let mean_b = mean(b);

    let mut covariance = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        covariance += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a < MIN_VARIANCE || var_b < MIN_VARIANCE {
        return 0.0;
    }

    clamp(covariance / (var_a.sqrt() * var_b.sqrt()), -1.0, 1.0)
}

/// Clamp into [lo, hi]. NaN collapses to `lo`.
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_nan() {
        return lo;
    }
    x.max(lo).min(hi)
}

/// Replace NaN / ±∞ with 0.0
pub fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Natural log of every price; non-positive prices map to 0.0
pub fn log_prices(prices: &[f64]) -> Vec<f64> {
    prices
        .iter()
        .map(|&p| if p > 0.0 { p.ln() } else { 0.0 })
        .collect()
}

/// Z-score of the last element against the slice's own mean and
/// population standard deviation. 0.0 when the deviation is degenerate.
pub fn last_z_score(xs: &[f64]) -> f64 {
    let Some(&last) = xs.last() else {
        return 0.0;
    };
    let m = mean(xs);
    let sd = standard_deviation(xs, Some(m));
    if sd < 1e-10 {
        return 0.0;
    }
    finite_or_zero((last - m) / sd)
}

/// Simple linear regression y = intercept + slope·x
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Standard error of the slope estimate
    pub slope_std_err: f64,
    /// Number of observations used
    pub n: usize,
}

impl LinearFit {
    /// t-statistic of the slope, 0.0 when the standard error vanishes
    pub fn slope_t_stat(&self) -> f64 {
        if self.slope_std_err < 1e-15 {
            return 0.0;
        }
        finite_or_zero(self.slope / self.slope_std_err)
    }
}

/// Ordinary least squares with intercept.
///
/// Returns `None` for fewer than 3 points, mismatched lengths, or an x
/// series without variance.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len();
    if n != y.len() || n < 3 {
        return None;
    }

    let x_mean = mean(x);
    let y_mean = mean(y);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (xi, yi) in x.iter().zip(y.iter()) {
        sxy += (xi - x_mean) * (yi - y_mean);
        sxx += (xi - x_mean).powi(2);
    }

    if sxx < MIN_VARIANCE {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let sse: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| (yi - (intercept + slope * xi)).powi(2))
        .sum();
    let mse = sse / (n - 2) as f64;
    let slope_std_err = (mse / sxx).sqrt();

    if !slope.is_finite() || !intercept.is_finite() {
        return None;
    }

    Some(LinearFit {
        slope,
        intercept,
        slope_std_err: finite_or_zero(slope_std_err),
        n,
    })
}

/// Multiple regression result: coefficients and their standard errors.
///
/// `coefficients[0]` is the intercept when the design matrix carries a
/// leading column of ones.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiFit {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub n: usize,
}

impl MultiFit {
    /// t-statistic for coefficient `idx`
    pub fn t_stat(&self, idx: usize) -> f64 {
        match (self.coefficients.get(idx), self.std_errors.get(idx)) {
            (Some(&b), Some(&se)) if se > 1e-15 => finite_or_zero(b / se),
            _ => 0.0,
        }
    }
}

/// OLS for y = X·b via the normal equations (XᵀX) b = Xᵀy.
///
/// `rows` is the design matrix in row-major form; every row must have the
/// same number of columns k. Solved with Gauss–Jordan elimination and
/// partial pivoting, which is plenty for the k ≤ 5 systems used here.
pub fn multiple_regression(rows: &[Vec<f64>], y: &[f64]) -> Option<MultiFit> {
    let n = rows.len();
    let k = rows.first()?.len();
    if n != y.len() || k == 0 || n <= k || rows.iter().any(|r| r.len() != k) {
        return None;
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &yi) in rows.iter().zip(y.iter()) {
        for i in 0..k {
            xty[i] += row[i] * yi;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    let inverse = invert(&xtx)?;
    let coefficients: Vec<f64> = (0..k)
        .map(|i| (0..k).map(|j| inverse[i][j] * xty[j]).sum())
        .collect();

    let sse: f64 = rows
        .iter()
        .zip(y.iter())
        .map(|(row, &yi)| {
            let fitted: f64 = row.iter().zip(coefficients.iter()).map(|(x, b)| x * b).sum();
            (yi - fitted).powi(2)
        })
        .sum();
    let sigma2 = sse / (n - k) as f64;

    let std_errors = (0..k)
        .map(|i| finite_or_zero((sigma2 * inverse[i][i]).max(0.0).sqrt()))
        .collect();

    if coefficients.iter().any(|c| !c.is_finite()) {
        return None;
    }

    Some(MultiFit { coefficients, std_errors, n })
}

/// Invert a small square matrix, `None` if singular
fn invert(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let k = matrix.len();
    let scale = matrix
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    let tolerance = scale.max(1.0) * 1e-12;
    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut inv: Vec<Vec<f64>> = (0..k)
        .map(|i| (0..k).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..k {
        let pivot = (col..k).max_by(|&r1, &r2| {
            a[r1][col]
                .abs()
                .partial_cmp(&a[r2][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < tolerance {
            return None;
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);

        let diag = a[col][col];
        for j in 0..k {
            a[col][j] /= diag;
            inv[col][j] /= diag;
        }

        for row in 0..k {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..k {
                a[row][j] -= factor * a[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }

    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&xs), 5.0);
        // Population formula
        assert_relative_eq!(standard_deviation(&xs, None), 2.0);
        assert_relative_eq!(standard_deviation(&xs, Some(5.0)), 2.0);
    }

    #[test]
    fn test_empty_inputs_return_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(standard_deviation(&[], None), 0.0);
        assert!(calculate_returns(&[100.0]).is_empty());
        assert_eq!(pearson_correlation(&[], &[]), 0.0);
        assert_eq!(last_z_score(&[]), 0.0);
    }

    #[test]
    fn test_calculate_returns() {
        let closes = [100.0, 110.0, 99.0];
        let r = calculate_returns(&closes);
        assert_eq!(r.len(), 2);
        assert_relative_eq!(r[0], (1.1f64).ln(), epsilon = 1e-12);
        assert_relative_eq!(r[1], (0.9f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_returns_with_bad_price_stay_aligned() {
        let r = calculate_returns(&[100.0, 0.0, 101.0, 102.0]);
        assert_eq!(r.len(), 3);
        assert_eq!(r[0], 0.0);
        assert_eq!(r[1], 0.0);
        assert!(r[2] > 0.0);
    }

    #[test]
    fn test_correlation_with_self_is_one() {
        let a: Vec<f64> = (0..50).map(|i| (i as f64 * 0.37).sin() + i as f64 * 0.01).collect();
        assert_relative_eq!(pearson_correlation(&a, &a), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_correlation_inverse_and_bounds() {
        let a: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let b: Vec<f64> = a.iter().map(|x| -2.0 * x + 3.0).collect();
        let r = pearson_correlation(&a, &b);
        assert_relative_eq!(r, -1.0, epsilon = 1e-9);
        assert!((-1.0..=1.0).contains(&r));
    }

    #[test]
    fn test_correlation_degenerate() {
        let flat = [1.0; 10];
        let moving: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert_eq!(pearson_correlation(&flat, &moving), 0.0);
        assert_eq!(pearson_correlation(&moving, &moving[..5]), 0.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(0.5, 0.0, 1.0), 0.5);
        assert_eq!(clamp(f64::NAN, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_linear_regression_exact() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.5 * v + 2.0).collect();
        let fit = linear_regression(&x, &y).unwrap();
        assert_relative_eq!(fit.slope, 1.5, epsilon = 1e-10);
        assert_relative_eq!(fit.intercept, 2.0, epsilon = 1e-10);
        assert!(fit.slope_std_err < 1e-8);
    }

    #[test]
    fn test_linear_regression_flat_x() {
        assert!(linear_regression(&[1.0; 10], &[2.0; 10]).is_none());
    }

    #[test]
    fn test_multiple_regression_recovers_coefficients() {
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let t = i as f64;
                vec![1.0, t, (t * 0.7).sin()]
            })
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| 0.5 + 0.2 * r[1] - 3.0 * r[2]).collect();
        let fit = multiple_regression(&rows, &y).unwrap();
        assert_relative_eq!(fit.coefficients[0], 0.5, epsilon = 1e-8);
        assert_relative_eq!(fit.coefficients[1], 0.2, epsilon = 1e-8);
        assert_relative_eq!(fit.coefficients[2], -3.0, epsilon = 1e-8);
    }

    #[test]
    fn test_multiple_regression_singular() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![1.0, i as f64, 2.0 * i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(multiple_regression(&rows, &y).is_none());
    }

    #[test]
    fn test_last_z_score_sign() {
        let mut xs = vec![1.0; 19];
        xs.push(2.0);
        assert!(last_z_score(&xs) > 0.0);
        let mut ys = vec![1.0; 19];
        ys.push(0.0);
        assert!(last_z_score(&ys) < 0.0);
    }
}
