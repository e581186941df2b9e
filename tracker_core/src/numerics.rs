//! Dense matrix primitives and small numeric helpers.
//!
//! All per-point coordinate data in the crate is stored as a `nalgebra`
//! dense matrix: `PointMatrix` is a (P rows x D cols) matrix of positions.
//! The filter family additionally needs flattened row-major vectors of
//! length P*D; conversions between the two live here so the rest of the
//! crate never hand-rolls the flattening order.

use nalgebra::DMatrix;

/// A dense P x D matrix of point coordinates (D is 2 or 3).
pub type PointMatrix = DMatrix<f64>;

/// Row-major flatten of a P x D point matrix into a length P*D vector:
/// point 0's x, point 0's y, [point 0's z,] point 1's x, ...
pub fn flatten_row_major(points: &PointMatrix) -> Vec<f64> {
    let (rows, cols) = points.shape();
    let mut out = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            out.push(points[(r, c)]);
        }
    }
    out
}

/// Inverse of [`flatten_row_major`]: rebuild a P x D matrix from a length
/// P*D row-major vector.
pub fn unflatten_row_major(flat: &[f64], dim: usize) -> PointMatrix {
    let rows = flat.len() / dim;
    PointMatrix::from_fn(rows, dim, |r, c| flat[r * dim + c])
}

/// True if any entry of the matrix is NaN.
pub fn has_nan(m: &DMatrix<f64>) -> bool {
    m.iter().any(|v| v.is_nan())
}

/// Index of the smallest value in a slice, ties broken by first occurrence.
/// Returns `None` for an empty slice or a slice that is entirely NaN.
pub fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// `n` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![start];
    }
    let step = (stop - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Supported `cdist` metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdistMetric {
    Euclidean,
    Cityblock,
    Cosine,
    Sqeuclidean,
    Chebyshev,
}

impl CdistMetric {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "euclidean" => Some(Self::Euclidean),
            "cityblock" | "manhattan" => Some(Self::Cityblock),
            "cosine" => Some(Self::Cosine),
            "sqeuclidean" => Some(Self::Sqeuclidean),
            "chebyshev" => Some(Self::Chebyshev),
            _ => None,
        }
    }
}

/// Pairwise distance matrix between the rows of `a` (N rows) and `b` (M
/// rows), both with the same number of columns K. Returns an N x M matrix.
pub fn cdist(a: &DMatrix<f64>, b: &DMatrix<f64>, metric: CdistMetric) -> DMatrix<f64> {
    let n = a.nrows();
    let m = b.nrows();
    let rows_a: Vec<Vec<f64>> = (0..n).map(|i| a.row(i).iter().copied().collect()).collect();
    let rows_b: Vec<Vec<f64>> = (0..m).map(|j| b.row(j).iter().copied().collect()).collect();
    let mut out = DMatrix::<f64>::zeros(n, m);
    for i in 0..n {
        for j in 0..m {
            out[(i, j)] = pairwise(&rows_a[i], &rows_b[j], metric);
        }
    }
    out
}

fn pairwise(a: &[f64], b: &[f64], metric: CdistMetric) -> f64 {
    match metric {
        CdistMetric::Euclidean => {
            a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
        }
        CdistMetric::Sqeuclidean => a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>(),
        CdistMetric::Cityblock => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum::<f64>(),
        CdistMetric::Chebyshev => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0_f64, f64::max),
        CdistMetric::Cosine => {
            let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
            let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                1.0
            } else {
                1.0 - dot / (norm_a * norm_b)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_round_trip() {
        let m = PointMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let flat = flatten_row_major(&m);
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0]);
        let back = unflatten_row_major(&flat, 2);
        assert_eq!(back, m);
    }

    #[test]
    fn argmin_picks_first_tie() {
        let v = vec![3.0, 1.0, 1.0, 2.0];
        assert_eq!(argmin(&v), Some(1));
    }

    #[test]
    fn argmin_ignores_nan() {
        let v = vec![f64::NAN, 2.0, f64::NAN];
        assert_eq!(argmin(&v), Some(1));
    }

    #[test]
    fn argmin_all_nan_is_none() {
        let v = vec![f64::NAN, f64::NAN];
        assert_eq!(argmin(&v), None);
    }

    #[test]
    fn linspace_endpoints() {
        let v = linspace(0.0, 10.0, 5);
        assert_eq!(v.len(), 5);
        assert!((v[0] - 0.0).abs() < 1e-12);
        assert!((v[4] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn cdist_euclidean_zero_diagonal() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 1.0]);
        let d = cdist(&a, &a, CdistMetric::Euclidean);
        assert!((d[(0, 0)]).abs() < 1e-12);
        assert!((d[(1, 1)]).abs() < 1e-12);
        assert!((d[(0, 1)] - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn has_nan_detects() {
        let m = DMatrix::from_row_slice(1, 2, &[1.0, f64::NAN]);
        assert!(has_nan(&m));
        let m2 = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        assert!(!has_nan(&m2));
    }
}
