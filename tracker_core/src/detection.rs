//! The `Detection` data-model entity.

use crate::candidate::Candidate;
use crate::error::{Result, TrackerError};
use crate::numerics::PointMatrix;
use crate::transform::CoordinateTransformation;

/// An opaque class label. Detections and tracked objects are only ever
/// compared for equality on this, never inspected further by the core.
pub type Label = String;

/// An opaque re-identification embedding. The core never interprets its
/// contents; it is only ever handed to a caller-supplied re-id distance.
pub type Embedding = Vec<f64>;

/// One detector output for a single frame.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Relative (camera-frame) points, P x D with D in {2, 3}.
    points: PointMatrix,
    /// Absolute (world-frame) points, same shape as `points`. Computed from
    /// `points` via the active transform when the detection is ingested by
    /// the tracker; equal to `points` until then.
    absolute_points: PointMatrix,
    /// Per-point confidence, length P if present.
    scores: Option<Vec<f64>>,
    label: Option<Label>,
    embedding: Option<Embedding>,
    /// Set by the tracker when the detection is stored in an object's
    /// history.
    age: u64,
}

impl Detection {
    /// Validates shape (2 <= D <= 3, P >= 1, scores length == P if present)
    /// and builds a new detection. `absolute_points` starts out equal to
    /// `points`; the tracker refreshes it on ingestion via a transform.
    pub fn new(
        points: PointMatrix,
        scores: Option<Vec<f64>>,
        label: Option<Label>,
        embedding: Option<Embedding>,
    ) -> Result<Self> {
        let (rows, cols) = points.shape();
        if rows == 0 {
            return Err(TrackerError::Shape("detection must have at least one point".into()));
        }
        if !(2..=3).contains(&cols) {
            return Err(TrackerError::Shape(format!(
                "detection point dimension must be 2 or 3, got {cols}"
            )));
        }
        if let Some(s) = &scores {
            if s.len() != rows {
                return Err(TrackerError::Shape(format!(
                    "scores length {} does not match point count {}",
                    s.len(),
                    rows
                )));
            }
        }
        let absolute_points = points.clone();
        Ok(Self {
            points,
            absolute_points,
            scores,
            label,
            embedding,
            age: 0,
        })
    }

    pub fn points(&self) -> &PointMatrix {
        &self.points
    }

    pub fn absolute_points(&self) -> &PointMatrix {
        &self.absolute_points
    }

    pub fn scores(&self) -> Option<&[f64]> {
        self.scores.as_deref()
    }

    pub fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }

    pub fn embedding(&self) -> Option<&Embedding> {
        self.embedding.as_ref()
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn set_age(&mut self, age: u64) {
        self.age = age;
    }

    pub fn num_points(&self) -> usize {
        self.points.nrows()
    }

    pub fn dim_points(&self) -> usize {
        self.points.ncols()
    }

    /// Recomputes `absolute_points` from `points` via `transform`. Called by
    /// the tracker at the start of `update`, before any filter math.
    pub fn refresh_absolute_points(&mut self, transform: &dyn CoordinateTransformation) {
        self.absolute_points = transform.rel_to_abs(&self.points);
    }

    /// Per-point observed mask: `scores[i] > threshold` if scores are
    /// present, else every point counts as observed.
    pub fn observed_mask(&self, detection_threshold: f64) -> Vec<bool> {
        match &self.scores {
            Some(scores) => scores.iter().map(|&s| s > detection_threshold).collect(),
            None => vec![true; self.num_points()],
        }
    }
}

impl Candidate for Detection {
    fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }

    fn absolute_points(&self) -> PointMatrix {
        self.absolute_points.clone()
    }

    fn scores(&self) -> Option<&[f64]> {
        self.scores()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_dimension() {
        let points = PointMatrix::from_row_slice(1, 4, &[1.0, 2.0, 3.0, 4.0]);
        assert!(Detection::new(points, None, None, None).is_err());
    }

    #[test]
    fn rejects_mismatched_scores() {
        let points = PointMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        assert!(Detection::new(points, Some(vec![0.5]), None, None).is_err());
    }

    #[test]
    fn observed_mask_without_scores_is_all_true() {
        let points = PointMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let det = Detection::new(points, None, None, None).unwrap();
        assert_eq!(det.observed_mask(0.0), vec![true, true]);
    }

    #[test]
    fn observed_mask_thresholds_scores() {
        let points = PointMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let det = Detection::new(points, Some(vec![0.1, 0.9]), None, None).unwrap();
        assert_eq!(det.observed_mask(0.5), vec![false, true]);
    }
}
