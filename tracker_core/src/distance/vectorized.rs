//! Batched distance functions: IoU, keypoint voting, normalized mean
//! Euclidean, and any [`CdistMetric`], each respecting label compatibility.

use std::cell::Cell;

use nalgebra::DMatrix;

use super::{labels_compatible, Distance};
use crate::candidate::Candidate;
use crate::numerics::{cdist, flatten_row_major, CdistMetric};

#[derive(Debug, Clone, Copy)]
enum Metric {
    Cdist(CdistMetric),
    Iou,
    KeypointVote { distance_threshold: f64, score_threshold: f64 },
    NormalizedMeanEuclidean { height: f64, width: f64 },
}

/// A distance evaluated either as one batched `cdist` call over flattened
/// point vectors, or, for box/keypoint-shaped metrics that don't reduce to
/// `cdist`, pairwise with labels masked in.
#[derive(Debug)]
pub struct VectorizedDistance {
    name: String,
    metric: Metric,
    shape_mismatch_warned: Cell<bool>,
    degenerate_warned: Cell<bool>,
}

impl VectorizedDistance {
    pub fn cdist(metric: CdistMetric) -> Self {
        Self {
            name: format!("{metric:?}").to_lowercase(),
            metric: Metric::Cdist(metric),
            shape_mismatch_warned: Cell::new(false),
            degenerate_warned: Cell::new(false),
        }
    }

    pub fn iou() -> Self {
        Self {
            name: "iou".to_string(),
            metric: Metric::Iou,
            shape_mismatch_warned: Cell::new(false),
            degenerate_warned: Cell::new(false),
        }
    }

    pub fn keypoint_vote(distance_threshold: f64, score_threshold: f64) -> Self {
        Self {
            name: "keypoint_vote".to_string(),
            metric: Metric::KeypointVote { distance_threshold, score_threshold },
            shape_mismatch_warned: Cell::new(false),
            degenerate_warned: Cell::new(false),
        }
    }

    pub fn normalized_mean_euclidean(height: f64, width: f64) -> Self {
        Self {
            name: "normalized_mean_euclidean".to_string(),
            metric: Metric::NormalizedMeanEuclidean { height, width },
            shape_mismatch_warned: Cell::new(false),
            degenerate_warned: Cell::new(false),
        }
    }

    fn pairwise_matrix(
        &self,
        objects: &[&dyn Candidate],
        candidates: &[&dyn Candidate],
        f: impl Fn(&Self, &dyn Candidate, &dyn Candidate) -> f64,
    ) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(objects.len(), candidates.len());
        for (i, o) in objects.iter().enumerate() {
            for (j, c) in candidates.iter().enumerate() {
                out[(i, j)] = if labels_compatible(o.label(), c.label()) {
                    f(self, *o, *c)
                } else {
                    f64::INFINITY
                };
            }
        }
        out
    }

    fn iou_pair(&self, a: &dyn Candidate, b: &dyn Candidate) -> f64 {
        let pa = a.absolute_points();
        let pb = b.absolute_points();
        if pa.shape() != (2, 2) || pb.shape() != (2, 2) {
            self.warn_shape_mismatch();
            return f64::INFINITY;
        }
        let (ax1, ay1, ax2, ay2) = (pa[(0, 0)], pa[(0, 1)], pa[(1, 0)], pa[(1, 1)]);
        let (bx1, by1, bx2, by2) = (pb[(0, 0)], pb[(0, 1)], pb[(1, 0)], pb[(1, 1)]);

        let inter_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        let inter_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
        let inter_area = inter_w * inter_h;

        let area_a = (ax2 - ax1).max(0.0) * (ay2 - ay1).max(0.0);
        let area_b = (bx2 - bx1).max(0.0) * (by2 - by1).max(0.0);
        let union = area_a + area_b - inter_area;

        if union <= 0.0 {
            if !self.degenerate_warned.get() {
                tracing::warn!("degenerate box in IoU distance (zero or negative union area)");
                self.degenerate_warned.set(true);
            }
            return 1.0;
        }
        1.0 - (inter_area / union)
    }

    fn keypoint_vote_pair(&self, a: &dyn Candidate, b: &dyn Candidate, distance_threshold: f64, score_threshold: f64) -> f64 {
        let pa = a.absolute_points();
        let pb = b.absolute_points();
        if pa.shape() != pb.shape() || pa.nrows() == 0 {
            self.warn_shape_mismatch();
            return f64::INFINITY;
        }
        let n = pa.nrows();
        let scores_a = a.scores();
        let scores_b = b.scores();
        let mut matches = 0usize;
        for r in 0..n {
            let above_threshold = scores_a.map(|s| s[r] > score_threshold).unwrap_or(true)
                && scores_b.map(|s| s[r] > score_threshold).unwrap_or(true);
            if !above_threshold {
                continue;
            }
            let mut sq = 0.0;
            for c in 0..pa.ncols() {
                let d = pa[(r, c)] - pb[(r, c)];
                sq += d * d;
            }
            if sq.sqrt() <= distance_threshold {
                matches += 1;
            }
        }
        1.0 / (1.0 + matches as f64)
    }

    fn normalized_mean_euclidean_pair(&self, a: &dyn Candidate, b: &dyn Candidate, height: f64, width: f64) -> f64 {
        let pa = a.absolute_points();
        let pb = b.absolute_points();
        if pa.shape() != pb.shape() || pa.nrows() == 0 {
            self.warn_shape_mismatch();
            return f64::INFINITY;
        }
        let norm = (height * height + width * width).sqrt();
        if norm <= 0.0 {
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
        (total / pa.nrows() as f64) / norm
    }

    fn warn_shape_mismatch(&self) {
        if !self.shape_mismatch_warned.get() {
            tracing::warn!(distance = %self.name, "comparing candidates with incompatible point-matrix shapes");
            self.shape_mismatch_warned.set(true);
        }
    }

    fn mask_label_mismatches(&self, objects: &[&dyn Candidate], candidates: &[&dyn Candidate], out: &mut DMatrix<f64>) {
        for (i, o) in objects.iter().enumerate() {
            for (j, c) in candidates.iter().enumerate() {
                if !labels_compatible(o.label(), c.label()) {
                    out[(i, j)] = f64::INFINITY;
                }
            }
        }
    }
}

impl Distance for VectorizedDistance {
    fn get_distances(&self, objects: &[&dyn Candidate], candidates: &[&dyn Candidate]) -> DMatrix<f64> {
        match self.metric {
            Metric::Cdist(metric) => {
                let objects_flat: Vec<Vec<f64>> = objects.iter().map(|o| flatten_row_major(&o.absolute_points())).collect();
                let candidates_flat: Vec<Vec<f64>> =
                    candidates.iter().map(|c| flatten_row_major(&c.absolute_points())).collect();
                let mut out = self.group_cdist(&objects_flat, &candidates_flat, metric);
                self.mask_label_mismatches(objects, candidates, &mut out);
                out
            }
            Metric::Iou => self.pairwise_matrix(objects, candidates, |s, a, b| s.iou_pair(a, b)),
            Metric::KeypointVote { distance_threshold, score_threshold } => self
                .pairwise_matrix(objects, candidates, move |s, a, b| {
                    s.keypoint_vote_pair(a, b, distance_threshold, score_threshold)
                }),
            Metric::NormalizedMeanEuclidean { height, width } => {
                self.pairwise_matrix(objects, candidates, move |s, a, b| s.normalized_mean_euclidean_pair(a, b, height, width))
            }
        }
    }
}

impl VectorizedDistance {
    /// One batched `cdist` call when every flattened row in both pools
    /// shares a length; otherwise falls back to a per-pair loop that
    /// treats any two rows of different length as infinitely distant.
    fn group_cdist(&self, objects_flat: &[Vec<f64>], candidates_flat: &[Vec<f64>], metric: CdistMetric) -> DMatrix<f64> {
        let common_len = objects_flat.first().map(|r| r.len());
        let uniform = common_len.is_some()
            && objects_flat.iter().all(|r| Some(r.len()) == common_len)
            && candidates_flat.iter().all(|r| Some(r.len()) == common_len);

        if let (true, Some(k)) = (uniform, common_len) {
            if k > 0 {
                let a = DMatrix::from_fn(objects_flat.len(), k, |r, c| objects_flat[r][c]);
                let b = DMatrix::from_fn(candidates_flat.len(), k, |r, c| candidates_flat[r][c]);
                return cdist(&a, &b, metric);
            }
        }

        let mut out = DMatrix::from_element(objects_flat.len(), candidates_flat.len(), f64::INFINITY);
        for (i, orow) in objects_flat.iter().enumerate() {
            for (j, crow) in candidates_flat.iter().enumerate() {
                if !orow.is_empty() && orow.len() == crow.len() {
                    let a = DMatrix::from_row_slice(1, orow.len(), orow);
                    let b = DMatrix::from_row_slice(1, crow.len(), crow);
                    out[(i, j)] = cdist(&a, &b, metric)[(0, 0)];
                } else {
                    self.warn_shape_mismatch();
                }
            }
        }
        out
    }
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
    fn cdist_euclidean_batched() {
        let a = det(&[0.0, 0.0], 1, 2, None);
        let b = det(&[3.0, 4.0], 1, 2, None);
        let d = VectorizedDistance::cdist(CdistMetric::Euclidean);
        let objects: Vec<&dyn Candidate> = vec![&a];
        let candidates: Vec<&dyn Candidate> = vec![&b];
        let m = d.get_distances(&objects, &candidates);
        assert!((m[(0, 0)] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn iou_perfect_overlap_is_zero_distance() {
        let a = det(&[0.0, 0.0, 10.0, 10.0], 2, 2, None);
        let b = det(&[0.0, 0.0, 10.0, 10.0], 2, 2, None);
        let d = VectorizedDistance::iou();
        let objects: Vec<&dyn Candidate> = vec![&a];
        let candidates: Vec<&dyn Candidate> = vec![&b];
        let m = d.get_distances(&objects, &candidates);
        assert!(m[(0, 0)].abs() < 1e-12);
    }

    #[test]
    fn iou_disjoint_boxes_is_max_distance() {
        let a = det(&[0.0, 0.0, 1.0, 1.0], 2, 2, None);
        let b = det(&[100.0, 100.0, 101.0, 101.0], 2, 2, None);
        let d = VectorizedDistance::iou();
        let objects: Vec<&dyn Candidate> = vec![&a];
        let candidates: Vec<&dyn Candidate> = vec![&b];
        let m = d.get_distances(&objects, &candidates);
        assert!((m[(0, 0)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mismatched_labels_are_masked_to_infinity() {
        let a = det(&[0.0, 0.0], 1, 2, Some("cat"));
        let b = det(&[0.0, 0.0], 1, 2, Some("dog"));
        let d = VectorizedDistance::cdist(CdistMetric::Euclidean);
        let objects: Vec<&dyn Candidate> = vec![&a];
        let candidates: Vec<&dyn Candidate> = vec![&b];
        let m = d.get_distances(&objects, &candidates);
        assert!(m[(0, 0)].is_infinite());
    }

    #[test]
    fn keypoint_vote_rewards_more_matching_points() {
        let a = det(&[0.0, 0.0, 10.0, 10.0], 2, 2, None);
        let b = det(&[0.1, 0.1, 10.0, 10.0], 2, 2, None);
        let d = VectorizedDistance::keypoint_vote(1.0, 0.0);
        let objects: Vec<&dyn Candidate> = vec![&a];
        let candidates: Vec<&dyn Candidate> = vec![&b];
        let m = d.get_distances(&objects, &candidates);
        assert!((m[(0, 0)] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn keypoint_vote_ignores_low_score_points() {
        let a = Detection::new(PointMatrix::from_row_slice(2, 2, &[0.0, 0.0, 10.0, 10.0]), Some(vec![1.0, 1.0]), None, None)
            .unwrap();
        let b = Detection::new(PointMatrix::from_row_slice(2, 2, &[0.0, 0.0, 10.0, 10.0]), Some(vec![0.0, 1.0]), None, None)
            .unwrap();
        let d = VectorizedDistance::keypoint_vote(1.0, 0.5);
        let objects: Vec<&dyn Candidate> = vec![&a];
        let candidates: Vec<&dyn Candidate> = vec![&b];
        let m = d.get_distances(&objects, &candidates);
        assert!((m[(0, 0)] - 0.5).abs() < 1e-12);
    }
}
