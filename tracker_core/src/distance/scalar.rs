//! Per-pair distance functions: one number per (object, candidate) pair,
//! evaluated with a plain nested loop.

use std::cell::Cell;

use nalgebra::DMatrix;

use super::{labels_compatible, Distance};
use crate::candidate::Candidate;

type ScalarFn = fn(&dyn Candidate, &dyn Candidate) -> f64;

/// Wraps a pairwise scalar distance function and evaluates it over the
/// full cross product of the two pools.
#[derive(Debug)]
pub struct ScalarDistance {
    name: &'static str,
    func: ScalarFn,
    label_mismatch_warned: Cell<bool>,
}

impl ScalarDistance {
    pub fn new(name: &'static str, func: ScalarFn) -> Self {
        Self {
            name,
            func,
            label_mismatch_warned: Cell::new(false),
        }
    }
}

impl Distance for ScalarDistance {
    fn get_distances(&self, objects: &[&dyn Candidate], candidates: &[&dyn Candidate]) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(objects.len(), candidates.len());
        for (i, object) in objects.iter().enumerate() {
            for (j, candidate) in candidates.iter().enumerate() {
                if !labels_compatible(object.label(), candidate.label()) {
                    if !self.label_mismatch_warned.get() {
                        tracing::warn!(
                            distance = self.name,
                            "comparing candidates with mismatched labels; they will never be matched"
                        );
                        self.label_mismatch_warned.set(true);
                    }
                    out[(i, j)] = f64::INFINITY;
                } else {
                    out[(i, j)] = (self.func)(*object, *candidate);
                }
            }
        }
        out
    }
}

/// Frobenius norm of the difference between two P x D point matrices.
pub fn frobenius(a: &dyn Candidate, b: &dyn Candidate) -> f64 {
    let pa = a.absolute_points();
    let pb = b.absolute_points();
    if pa.shape() != pb.shape() {
        return f64::INFINITY;
    }
    (pa - pb).norm()
}

/// Mean per-point Euclidean distance.
pub fn mean_euclidean(a: &dyn Candidate, b: &dyn Candidate) -> f64 {
    let pa = a.absolute_points();
    let pb = b.absolute_points();
    if pa.shape() != pb.shape() || pa.nrows() == 0 {
        return f64::INFINITY;
    }
    let mut total = 0.0;
    for r in 0..pa.nrows() {
        let mut sq = 0.0;
        for c in 0..pa.ncols() {
            let d = pa[(r, c)] - pb[(r, c)];
            sq += d * d;
        }
        total += sq.sqrt();
    }
    total / pa.nrows() as f64
}

/// Mean per-point Manhattan (L1) distance.
pub fn mean_manhattan(a: &dyn Candidate, b: &dyn Candidate) -> f64 {
    let pa = a.absolute_points();
    let pb = b.absolute_points();
    if pa.shape() != pb.shape() || pa.nrows() == 0 {
        return f64::INFINITY;
    }
    let mut total = 0.0;
    for r in 0..pa.nrows() {
        let mut l1 = 0.0;
        for c in 0..pa.ncols() {
            l1 += (pa[(r, c)] - pb[(r, c)]).abs();
        }
        total += l1;
    }
    total / pa.nrows() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;
    use crate::numerics::PointMatrix;

    fn det(points: &[f64], rows: usize, cols: usize, label: Option<&str>) -> Detection {
        Detection::new(
            PointMatrix::from_row_slice(rows, cols, points),
            None,
            label.map(String::from),
            None,
        )
        .unwrap()
    }

    #[test]
    fn frobenius_zero_for_identical_points() {
        let a = det(&[1.0, 2.0], 1, 2, None);
        let b = det(&[1.0, 2.0], 1, 2, None);
        assert!((frobenius(&a, &b)).abs() < 1e-12);
    }

    #[test]
    fn mean_euclidean_averages_per_point_distance() {
        let a = det(&[0.0, 0.0, 0.0, 0.0], 2, 2, None);
        let b = det(&[3.0, 4.0, 0.0, 0.0], 2, 2, None);
        assert!((mean_euclidean(&a, &b) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn mismatched_labels_produce_infinite_distance() {
        let a = det(&[0.0, 0.0], 1, 2, Some("cat"));
        let b = det(&[0.0, 0.0], 1, 2, Some("dog"));
        let d = ScalarDistance::new("frobenius", frobenius);
        let objects: Vec<&dyn Candidate> = vec![&a];
        let candidates: Vec<&dyn Candidate> = vec![&b];
        let m = d.get_distances(&objects, &candidates);
        assert!(m[(0, 0)].is_infinite());
    }
}
