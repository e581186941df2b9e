use nalgebra::DMatrix;

use super::{Filter, FilterFactory};
use crate::numerics::{flatten_row_major, PointMatrix};

/// Standard linear Kalman filter over the full `2*P*D x 2*P*D` covariance.
///
/// `F = [[I, dt*I], [0, I]]` with `dt = 1`, `H = [I, 0]`,
/// `Q = diag(1,..,1, q,..,q)` (position block identity, velocity block
/// scaled by `process_noise`), `R = r*I`, `P0` has position block `p*I` and
/// velocity block `I`.
#[derive(Debug, Clone)]
pub struct FullKalman {
    dim_z: usize,
    x: DMatrix<f64>,
    p: DMatrix<f64>,
    f: DMatrix<f64>,
    q: DMatrix<f64>,
    r_default: f64,
}

impl FullKalman {
    fn new(dim_z: usize, process_noise: f64, position_variance: f64, measurement_noise: f64) -> Self {
        let dim_x = 2 * dim_z;
        let mut f = DMatrix::<f64>::identity(dim_x, dim_x);
        for i in 0..dim_z {
            f[(i, dim_z + i)] = 1.0;
        }

        let mut q = DMatrix::<f64>::zeros(dim_x, dim_x);
        for i in 0..dim_z {
            q[(i, i)] = 1.0;
            q[(dim_z + i, dim_z + i)] = process_noise;
        }

        let mut p = DMatrix::<f64>::zeros(dim_x, dim_x);
        for i in 0..dim_z {
            p[(i, i)] = position_variance;
            p[(dim_z + i, dim_z + i)] = 1.0;
        }

        Self {
            dim_z,
            x: DMatrix::<f64>::zeros(dim_x, 1),
            p,
            f,
            q,
            r_default: measurement_noise,
        }
    }

    fn set_initial_positions(&mut self, z: &[f64]) {
        for (i, &v) in z.iter().enumerate() {
            self.x[(i, 0)] = v;
        }
    }

    /// Builds the `dim_z x dim_x` measurement matrix for this update: an
    /// identity in the left (position) block restricted to observed rows,
    /// zero elsewhere.
    fn measurement_matrix(&self, observed: Option<&[bool]>) -> DMatrix<f64> {
        let dim_x = 2 * self.dim_z;
        let mut h = DMatrix::<f64>::zeros(self.dim_z, dim_x);
        for i in 0..self.dim_z {
            let is_observed = observed.map(|o| o[i]).unwrap_or(true);
            if is_observed {
                h[(i, i)] = 1.0;
            }
        }
        h
    }
}

impl Filter for FullKalman {
    fn predict(&mut self) {
        self.x = &self.f * &self.x;
        self.p = &self.f * &self.p * self.f.transpose() + &self.q;
    }

    fn update(&mut self, z: &[f64], r: Option<&[f64]>, observed: Option<&[bool]>) {
        assert_eq!(z.len(), self.dim_z, "measurement length must equal dim_z");

        let h = self.measurement_matrix(observed);
        let z_vec = DMatrix::from_column_slice(self.dim_z, 1, z);

        let mut r_mat = DMatrix::<f64>::zeros(self.dim_z, self.dim_z);
        for i in 0..self.dim_z {
            r_mat[(i, i)] = r.map(|r| r[i]).unwrap_or(self.r_default);
        }

        let y = &z_vec - &h * &self.x;
        let s = &h * &self.p * h.transpose() + &r_mat;

        let s_inv = match s.clone().try_inverse() {
            Some(inv) => inv,
            None => {
                let err = crate::error::TrackerError::Numerical("FullKalman innovation covariance".into());
                tracing::warn!(error = %err, "skipping update");
                return;
            }
        };

        let k = &self.p * h.transpose() * s_inv;
        self.x = &self.x + &k * y;

        let dim_x = 2 * self.dim_z;
        let identity = DMatrix::<f64>::identity(dim_x, dim_x);
        self.p = (identity - &k * &h) * &self.p;
    }

    fn state_vector(&self) -> Vec<f64> {
        self.x.iter().copied().collect()
    }

    fn set_state_vector(&mut self, x: Vec<f64>) {
        self.x = DMatrix::from_column_slice(x.len(), 1, &x);
    }

    fn dim_z(&self) -> usize {
        self.dim_z
    }
}

/// Configurable factory for [`FullKalman`].
#[derive(Debug, Clone)]
pub struct FullKalmanFactory {
    pub process_noise: f64,
    pub position_variance: f64,
    pub measurement_noise: f64,
}

impl Default for FullKalmanFactory {
    fn default() -> Self {
        Self {
            process_noise: 1.0,
            position_variance: 10.0,
            measurement_noise: 1.0,
        }
    }
}

impl FilterFactory for FullKalmanFactory {
    fn create(&self, initial_points: &PointMatrix) -> Box<dyn Filter> {
        let dim_z = initial_points.nrows() * initial_points.ncols();
        let mut filter =
            FullKalman::new(dim_z, self.process_noise, self.position_variance, self.measurement_noise);
        filter.set_initial_positions(&flatten_row_major(initial_points));
        Box::new(filter)
    }
}
