//! Error taxonomy for the tracker core.
//!
//! Configuration and shape errors are fatal to the call that raised them and
//! leave tracker state untouched, so callers may retry with corrected input.
//! Numerical non-events (singular innovation covariance, degenerate IoU,
//! near-zero homography divisor) never surface here: they are logged once
//! and the operation falls back instead.

use thiserror::Error;

/// Errors the tracker core can return to a caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// Invalid constructor arguments: missing distance, partially configured
    /// re-id, non-invertible homography, malformed movement vector.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Detection points with an unsupported dimension, a scores length that
    /// doesn't match the point count, IoU called on non-4-column rows, or a
    /// matcher cost matrix containing NaN.
    #[error("shape error: {0}")]
    Shape(String),

    /// `get_estimate(absolute = true)` was called on an object that has
    /// never had a coordinate transform installed.
    #[error("no coordinate transform has ever been installed on this object")]
    TransformNotInstalled,

    /// A distance function produced NaN; fatal to the current `update` call.
    #[error("distance function produced NaN at row {row}, col {col}")]
    NanCost { row: usize, col: usize },

    /// A filter's innovation covariance was singular. Used only internally
    /// to name the condition in logs; the filter update is skipped rather
    /// than propagated as an error.
    #[error("singular innovation covariance: {0}")]
    Numerical(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
