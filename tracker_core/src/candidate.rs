//! A small seam shared by [`crate::detection::Detection`] and
//! [`crate::object::TrackedObject`] so that a [`crate::distance::Distance`]
//! can be computed either between a frame's detections and the existing
//! objects (normal association) or between two pools of `TrackedObject`
//! (the re-identification pass, which matches dead objects against freshly
//! spawned candidates) without a pseudo-inheritance hierarchy.

use crate::detection::Label;
use crate::numerics::PointMatrix;

/// Anything a [`Distance`](crate::distance::Distance) can compare: has an
/// optional label, a P x D absolute-coordinate point matrix, and optional
/// per-point scores.
pub trait Candidate: std::fmt::Debug {
    fn label(&self) -> Option<&Label>;
    fn absolute_points(&self) -> PointMatrix;
    fn scores(&self) -> Option<&[f64]>;
}
