//! Pluggable distance functions between two pools of [`Candidate`]s.
//!
//! A [`Distance`] always produces a rows-by-columns matrix: rows index the
//! first candidate pool (normally the existing tracked objects), columns
//! index the second (normally the frame's detections, or, during
//! re-identification, a second pool of tracked objects).

mod scalar;
mod vectorized;

pub use scalar::ScalarDistance;
pub use vectorized::VectorizedDistance;

use nalgebra::DMatrix;

use crate::candidate::Candidate;
use crate::detection::Label;
use crate::error::{Result, TrackerError};
use crate::numerics::CdistMetric;

/// Computes a full distance matrix between two candidate pools.
pub trait Distance: std::fmt::Debug {
    fn get_distances(&self, objects: &[&dyn Candidate], candidates: &[&dyn Candidate]) -> DMatrix<f64>;
}

/// True unless both labels are present and differ. `None` on either side
/// is treated as "matches anything" (unlabeled candidates).
fn labels_compatible(a: Option<&Label>, b: Option<&Label>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

/// Resolves a distance function by name, the way a config file or CLI flag
/// would name one. Any [`CdistMetric`] name is accepted directly; a few
/// named distances need extra parameters.
pub fn resolve(
    name: &str,
    keypoint_distance_threshold: Option<f64>,
    normalization_height: Option<f64>,
    normalization_width: Option<f64>,
) -> Result<Box<dyn Distance>> {
    resolve_with_score_threshold(name, keypoint_distance_threshold, 0.0, normalization_height, normalization_width)
}

/// Same as [`resolve`], but lets the caller set the per-point score
/// threshold `keypoint_vote` gates its votes on (the same concept as
/// `TrackerConfig::detection_threshold`).
pub fn resolve_with_score_threshold(
    name: &str,
    keypoint_distance_threshold: Option<f64>,
    keypoint_score_threshold: f64,
    normalization_height: Option<f64>,
    normalization_width: Option<f64>,
) -> Result<Box<dyn Distance>> {
    match name {
        "frobenius" => Ok(Box::new(ScalarDistance::new("frobenius", scalar::frobenius))),
        "mean_euclidean" => Ok(Box::new(ScalarDistance::new("mean_euclidean", scalar::mean_euclidean))),
        "mean_manhattan" => Ok(Box::new(ScalarDistance::new("mean_manhattan", scalar::mean_manhattan))),
        "iou" => Ok(Box::new(VectorizedDistance::iou())),
        "keypoint_vote" => {
            let threshold = keypoint_distance_threshold.ok_or_else(|| {
                TrackerError::Configuration("keypoint_vote distance requires a keypoint_distance_threshold".into())
            })?;
            Ok(Box::new(VectorizedDistance::keypoint_vote(threshold, keypoint_score_threshold)))
        }
        "normalized_mean_euclidean" => {
            let height = normalization_height.ok_or_else(|| {
                TrackerError::Configuration("normalized_mean_euclidean distance requires a frame height".into())
            })?;
            let width = normalization_width.ok_or_else(|| {
                TrackerError::Configuration("normalized_mean_euclidean distance requires a frame width".into())
            })?;
            Ok(Box::new(VectorizedDistance::normalized_mean_euclidean(height, width)))
        }
        other => match CdistMetric::parse(other) {
            Some(metric) => Ok(Box::new(VectorizedDistance::cdist(metric))),
            None => Err(TrackerError::Configuration(format!("unknown distance function: {other}"))),
        },
    }
}
