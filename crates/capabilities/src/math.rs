//! Numerical Helpers
//!
//! Small dense linear-algebra and descriptive-statistics routines shared by
//! the capability implementations. Matrices are `ndarray` arrays; systems
//! are solved with Gaussian elimination (partial pivoting) and symmetric
//! eigenproblems with cyclic Jacobi rotations, which is plenty for the
//! feature counts an uploaded spreadsheet has.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use ml_analysis_core::{CoreError, CoreResult};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator)
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Lag-1 autocorrelation of a residual series
pub fn lag1_autocorrelation(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let m = mean(values);
    let denom: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    if denom == 0.0 {
        return 0.0;
    }
    let num: f64 = values
        .windows(2)
        .map(|w| (w[0] - m) * (w[1] - m))
        .sum();
    num / denom
}

/// Error summary of predictions against actual values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorSummary {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Mean absolute percentage error over non-zero actuals, in percent
    pub mape: f64,
    pub r2: f64,
}

pub fn error_summary(actual: &[f64], predicted: &[f64]) -> ErrorSummary {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return ErrorSummary {
            mse: 0.0,
            rmse: 0.0,
            mae: 0.0,
            mape: 0.0,
            r2: 0.0,
        };
    }
    let mut sse = 0.0;
    let mut sae = 0.0;
    let mut ape = 0.0;
    let mut ape_count = 0usize;
    for i in 0..n {
        let err = actual[i] - predicted[i];
        sse += err * err;
        sae += err.abs();
        if actual[i] != 0.0 {
            ape += (err / actual[i]).abs();
            ape_count += 1;
        }
    }
    let mse = sse / n as f64;
    let m = mean(&actual[..n]);
    let sst: f64 = actual[..n].iter().map(|v| (v - m).powi(2)).sum();
    ErrorSummary {
        mse,
        rmse: mse.sqrt(),
        mae: sae / n as f64,
        mape: if ape_count > 0 {
            ape / ape_count as f64 * 100.0
        } else {
            0.0
        },
        r2: if sst > 0.0 { 1.0 - sse / sst } else { 0.0 },
    }
}

/// Column-wise z-score scaling parameters
#[derive(Debug, Clone)]
pub struct Standardizer {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl Standardizer {
    /// Fit on a row-major matrix. Constant columns keep a unit scale.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut means = Vec::with_capacity(cols);
        let mut stds = Vec::with_capacity(cols);
        for j in 0..cols {
            let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            means.push(mean(&column));
            let sd = variance(&column).sqrt();
            stds.push(if sd > 1e-12 { sd } else { 1.0 });
        }
        Self { means, stds }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, v)| (v - self.means[j]) / self.stds[j])
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    pub fn inverse_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, v)| v * self.stds[j] + self.means[j])
            .collect()
    }
}

/// Row-major `Vec<Vec<f64>>` into an `Array2`
pub fn to_array2(rows: &[Vec<f64>]) -> CoreResult<Array2<f64>> {
    let n = rows.len();
    let m = rows.first().map(|r| r.len()).unwrap_or(0);
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Array2::from_shape_vec((n, m), flat)
        .map_err(|e| CoreError::internal(format!("matrix shape error: {}", e)))
}

/// Solve `a * x = b` for square `a` using Gaussian elimination with
/// partial pivoting.
pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> CoreResult<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(CoreError::computation("solve requires a square system"));
    }
    let mut m = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                m[[i, col]]
                    .abs()
                    .partial_cmp(&m[[j, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if m[[pivot, col]].abs() < 1e-12 {
            return Err(CoreError::computation("singular matrix"));
        }
        if pivot != col {
            for k in 0..n {
                m.swap([col, k], [pivot, k]);
            }
            rhs.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut acc = rhs[row];
        for k in (row + 1)..n {
            acc -= m[[row, k]] * x[k];
        }
        x[row] = acc / m[[row, row]];
    }
    Ok(x)
}

/// Least squares `min ||x b - y||² + ridge ||b||²` via the normal equations.
///
/// When `skip_first` is set the first coefficient (an intercept column) is
/// not penalized.
pub fn least_squares(
    x: &Array2<f64>,
    y: &Array1<f64>,
    ridge: f64,
    skip_first: bool,
) -> CoreResult<Array1<f64>> {
    if x.nrows() != y.len() {
        return Err(CoreError::computation("design matrix and target differ in length"));
    }
    if x.nrows() < x.ncols() {
        return Err(CoreError::invalid_data(format!(
            "{} observations are not enough to estimate {} coefficients",
            x.nrows(),
            x.ncols()
        )));
    }
    let xt = x.t();
    let mut xtx = xt.dot(x);
    let start = usize::from(skip_first);
    for i in start..xtx.nrows() {
        xtx[[i, i]] += ridge;
    }
    let xty = xt.dot(y);
    solve(&xtx, &xty)
}

/// Prepend a column of ones
pub fn with_intercept(rows: &[Vec<f64>]) -> CoreResult<Array2<f64>> {
    let augmented: Vec<Vec<f64>> = rows
        .iter()
        .map(|r| std::iter::once(1.0).chain(r.iter().copied()).collect())
        .collect();
    to_array2(&augmented)
}

/// Eigen-decomposition of a symmetric matrix.
///
/// Returns eigenvalues in descending order and the matching eigenvectors as
/// columns.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> CoreResult<(Vec<f64>, Array2<f64>)> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(CoreError::computation("eigen-decomposition requires a square matrix"));
    }
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    for _sweep in 0..100 {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[[i, j]].powi(2))
            .sum();
        if off < 1e-18 {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() < 1e-15 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        a[[j, j]]
            .partial_cmp(&a[[i, i]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let values = order.iter().map(|&i| a[[i, i]]).collect();
    let vectors = v.select(Axis(1), &order);
    Ok((values, vectors))
}

/// Sample covariance matrix of a row-major data matrix
pub fn covariance(data: &Array2<f64>) -> Array2<f64> {
    let n = data.nrows().max(2) as f64;
    let centered = data - &data.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(data.ncols()));
    centered.t().dot(&centered) / (n - 1.0)
}

/// Deterministic train/test split of row indices.
///
/// Small datasets (fewer than 10 rows) are evaluated in-sample.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    if n < 10 {
        return (indices.clone(), indices);
    }
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let fraction = test_fraction.clamp(0.05, 0.5);
    let test_len = ((n as f64) * fraction).round().max(1.0) as usize;
    let test = indices[..test_len].to_vec();
    let train = indices[test_len..].to_vec();
    (train, test)
}

/// Mean silhouette coefficient for a labelled point set.
///
/// Points labelled `None` (noise) are ignored. Returns `None` when fewer
/// than two clusters are present.
pub fn silhouette(points: &[Vec<f64>], labels: &[Option<usize>]) -> Option<f64> {
    let clusters: std::collections::BTreeSet<usize> = labels.iter().flatten().copied().collect();
    if clusters.len() < 2 {
        return None;
    }
    let mut total = 0.0;
    let mut count = 0usize;
    for (i, point) in points.iter().enumerate() {
        let Some(own) = labels[i] else { continue };
        let mut sums: std::collections::BTreeMap<usize, (f64, usize)> = Default::default();
        for (j, other) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            if let Some(label) = labels[j] {
                let entry = sums.entry(label).or_insert((0.0, 0));
                entry.0 += euclidean(point, other);
                entry.1 += 1;
            }
        }
        let a = match sums.get(&own) {
            Some((sum, n)) if *n > 0 => sum / *n as f64,
            // Singleton clusters score 0 by convention
            _ => {
                count += 1;
                continue;
            }
        };
        let b = sums
            .iter()
            .filter(|(label, (_, n))| **label != own && *n > 0)
            .map(|(_, (sum, n))| sum / *n as f64)
            .fold(f64::INFINITY, f64::min);
        if b.is_finite() {
            let denom = a.max(b);
            total += if denom > 0.0 { (b - a) / denom } else { 0.0 };
        }
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

/// Round for presentation in result documents
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
