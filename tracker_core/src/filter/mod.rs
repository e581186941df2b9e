//! Filter family: three interchangeable state estimators sharing one
//! contract. State layout is fixed across all variants: components
//! `0..P*D` are positions (row-major flatten of the P x D point matrix),
//! components `P*D..2*P*D` are the corresponding velocities.

mod full;
mod none;
mod optimized;

pub use full::{FullKalman, FullKalmanFactory};
pub use none::{NoFilter, NoFilterFactory};
pub use optimized::{OptimizedKalman, OptimizedKalmanFactory};

use crate::numerics::PointMatrix;

/// Common contract for the per-object state estimator.
pub trait Filter: std::fmt::Debug {
    /// Advances the state by one time step (Δt = 1). No-op for `NoFilter`.
    fn predict(&mut self);

    /// Folds a flattened P*D measurement into the state. `r` is an optional
    /// measurement-noise diagonal (length `dim_z`); `observed` is an
    /// optional per-component mask: components with `observed[i] == false`
    /// leave both position and velocity untouched.
    fn update(&mut self, z: &[f64], r: Option<&[f64]>, observed: Option<&[bool]>);

    /// The full `2*P*D`-long state: positions then velocities.
    fn state_vector(&self) -> Vec<f64>;

    /// Overwrites the full state vector directly (used for the
    /// first-observation override in `TrackedObject::hit`).
    fn set_state_vector(&mut self, x: Vec<f64>);

    /// Measurement dimension, `P*D`.
    fn dim_z(&self) -> usize;
}

/// Produces a filter bound to the shape of an initial detection.
pub trait FilterFactory: std::fmt::Debug {
    fn create(&self, initial_points: &PointMatrix) -> Box<dyn Filter>;
}

/// Extracts the P x D position matrix from a filter's state vector.
pub fn positions_from_state(state: &[f64], num_points: usize, dim_points: usize) -> PointMatrix {
    let dim_z = num_points * dim_points;
    crate::numerics::unflatten_row_major(&state[..dim_z], dim_points)
}
