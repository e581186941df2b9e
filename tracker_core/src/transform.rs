//! Coordinate transformation plug-in.
//!
//! The tracker treats a `CoordinateTransformation` as opaque: it is supplied
//! per frame by the caller (camera-motion estimation lives outside the
//! core) and only ever applied, never fitted.

use crate::error::{Result, TrackerError};
use crate::numerics::PointMatrix;

/// Two mutually-inverse pure functions mapping between the current camera's
/// relative frame and a fixed absolute (world) frame.
pub trait CoordinateTransformation: std::fmt::Debug {
    /// Relative (current-frame) points -> absolute (world-frame) points.
    fn rel_to_abs(&self, points: &PointMatrix) -> PointMatrix;
    /// Absolute (world-frame) points -> relative (current-frame) points.
    fn abs_to_rel(&self, points: &PointMatrix) -> PointMatrix;
}

/// No motion compensation: relative and absolute coordinates coincide.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformation;

impl CoordinateTransformation for IdentityTransformation {
    fn rel_to_abs(&self, points: &PointMatrix) -> PointMatrix {
        points.clone()
    }

    fn abs_to_rel(&self, points: &PointMatrix) -> PointMatrix {
        points.clone()
    }
}

/// Constant 2D camera translation `v`: `abs = rel + v`, `rel = abs - v`.
#[derive(Debug, Clone)]
pub struct TranslationTransformation {
    movement_vector: Vec<f64>,
}

impl TranslationTransformation {
    pub fn new(movement_vector: Vec<f64>) -> Result<Self> {
        if movement_vector.is_empty() {
            return Err(TrackerError::Configuration(
                "translation movement vector must not be empty".into(),
            ));
        }
        Ok(Self { movement_vector })
    }

    fn apply(&self, points: &PointMatrix, sign: f64) -> PointMatrix {
        let cols = points.ncols();
        let v = &self.movement_vector;
        PointMatrix::from_fn(points.nrows(), cols, |r, c| {
            let delta = if c < v.len() { v[c] } else { 0.0 };
            points[(r, c)] + sign * delta
        })
    }
}

impl CoordinateTransformation for TranslationTransformation {
    fn rel_to_abs(&self, points: &PointMatrix) -> PointMatrix {
        self.apply(points, -1.0)
    }

    fn abs_to_rel(&self, points: &PointMatrix) -> PointMatrix {
        self.apply(points, 1.0)
    }
}

const HOMOGRAPHY_EPS: f64 = 1e-7;

/// A planar homography, applied to homogeneous-coordinate rows with
/// perspective division. `abs_to_rel` applies `h`; `rel_to_abs` applies
/// its inverse (precomputed at construction, which is also where a
/// non-invertible `h` is rejected).
#[derive(Debug, Clone)]
pub struct HomographyTransformation {
    h: nalgebra::Matrix3<f64>,
    h_inv: nalgebra::Matrix3<f64>,
}

impl HomographyTransformation {
    pub fn new(h: nalgebra::Matrix3<f64>) -> Result<Self> {
        let h_inv = h.try_inverse().ok_or_else(|| {
            TrackerError::Configuration("homography matrix is not invertible".into())
        })?;
        Ok(Self { h, h_inv })
    }

    fn apply(matrix: &nalgebra::Matrix3<f64>, points: &PointMatrix) -> PointMatrix {
        let rows = points.nrows();
        let cols = points.ncols();
        let mut out = PointMatrix::zeros(rows, cols);
        for r in 0..rows {
            let x = points[(r, 0)];
            let y = points[(r, 1)];
            let hv = matrix * nalgebra::Vector3::new(x, y, 1.0);
            let mut w = hv.z;
            if w.abs() < HOMOGRAPHY_EPS {
                w = if w < 0.0 { -HOMOGRAPHY_EPS } else { HOMOGRAPHY_EPS };
            }
            out[(r, 0)] = hv.x / w;
            out[(r, 1)] = hv.y / w;
            if cols > 2 {
                for c in 2..cols {
                    out[(r, c)] = points[(r, c)];
                }
            }
        }
        out
    }
}

impl CoordinateTransformation for HomographyTransformation {
    fn rel_to_abs(&self, points: &PointMatrix) -> PointMatrix {
        Self::apply(&self.h_inv, points)
    }

    fn abs_to_rel(&self, points: &PointMatrix) -> PointMatrix {
        Self::apply(&self.h, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_idempotent() {
        let t = IdentityTransformation;
        let p = PointMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(t.abs_to_rel(&t.rel_to_abs(&p)), p);
    }

    #[test]
    fn translation_is_an_involution() {
        let t = TranslationTransformation::new(vec![5.0, -3.0]).unwrap();
        let p = PointMatrix::from_row_slice(1, 2, &[10.0, 10.0]);
        let round = t.abs_to_rel(&t.rel_to_abs(&p));
        assert!((round[(0, 0)] - p[(0, 0)]).abs() < 1e-12);
        assert!((round[(0, 1)] - p[(0, 1)]).abs() < 1e-12);
    }

    #[test]
    fn homography_round_trip_within_tolerance() {
        let h = nalgebra::Matrix3::new(1.1, 0.05, 2.0, -0.02, 0.95, 3.0, 0.0001, 0.0002, 1.0);
        let t = HomographyTransformation::new(h).unwrap();
        let p = PointMatrix::from_row_slice(3, 2, &[10.0, 20.0, -5.0, 7.0, 100.0, 50.0]);
        let round = t.abs_to_rel(&t.rel_to_abs(&p));
        for r in 0..3 {
            for c in 0..2 {
                assert!((round[(r, c)] - p[(r, c)]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn singular_homography_is_rejected() {
        let h = nalgebra::Matrix3::zeros();
        assert!(HomographyTransformation::new(h).is_err());
    }
}
