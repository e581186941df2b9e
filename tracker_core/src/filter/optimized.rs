use super::{Filter, FilterFactory};
use crate::numerics::{flatten_row_major, PointMatrix};

/// Diagonal-covariance fast path: the reduction of [`super::FullKalman`]'s
/// equations under the assumption that all component-pairs are decoupled.
/// Instead of a `2*P*D x 2*P*D` matrix, covariance is kept as three
/// length-`P*D` vectors (per-component position variance,
/// position-velocity covariance, velocity variance), so `predict`/`update`
/// never touch a matrix at all.
#[derive(Debug, Clone)]
pub struct OptimizedKalman {
    dim_z: usize,
    positions: Vec<f64>,
    velocities: Vec<f64>,
    var_pos: Vec<f64>,
    cov_pv: Vec<f64>,
    var_vel: Vec<f64>,
    q_pos: f64,
    q_vel: f64,
    r_default: f64,
}

impl OptimizedKalman {
    fn new(dim_z: usize, process_noise: f64, position_variance: f64, measurement_noise: f64) -> Self {
        Self {
            dim_z,
            positions: vec![0.0; dim_z],
            velocities: vec![0.0; dim_z],
            var_pos: vec![position_variance; dim_z],
            cov_pv: vec![0.0; dim_z],
            var_vel: vec![1.0; dim_z],
            q_pos: 1.0,
            q_vel: process_noise,
            r_default: measurement_noise,
        }
    }
}

impl Filter for OptimizedKalman {
    fn predict(&mut self) {
        for i in 0..self.dim_z {
            self.positions[i] += self.velocities[i];

            let a = self.var_pos[i];
            let b = self.cov_pv[i];
            let c = self.var_vel[i];
            self.var_pos[i] = a + 2.0 * b + c + self.q_pos;
            self.cov_pv[i] = b + c;
            self.var_vel[i] = c + self.q_vel;
        }
    }

    fn update(&mut self, z: &[f64], r: Option<&[f64]>, observed: Option<&[bool]>) {
        assert_eq!(z.len(), self.dim_z, "measurement length must equal dim_z");

        for i in 0..self.dim_z {
            let is_observed = observed.map(|o| o[i]).unwrap_or(true);
            if !is_observed {
                continue;
            }

            let r_i = r.map(|r| r[i]).unwrap_or(self.r_default);
            let s = self.var_pos[i] + r_i;
            if s.abs() < 1e-12 {
                let err = crate::error::TrackerError::Numerical(format!("OptimizedKalman innovation variance at point {i}"));
                tracing::warn!(error = %err, "skipping update");
                continue;
            }

            let k_pos = self.var_pos[i] / s;
            let k_vel = self.cov_pv[i] / s;
            let y = z[i] - self.positions[i];

            self.positions[i] += k_pos * y;
            self.velocities[i] += k_vel * y;

            let a = self.var_pos[i];
            let b = self.cov_pv[i];
            self.var_pos[i] = (1.0 - k_pos) * a;
            self.cov_pv[i] = (1.0 - k_pos) * b;
            self.var_vel[i] -= k_vel * b;
        }
    }

    fn state_vector(&self) -> Vec<f64> {
        let mut state = self.positions.clone();
        state.extend(self.velocities.iter());
        state
    }

    fn set_state_vector(&mut self, x: Vec<f64>) {
        self.positions = x[..self.dim_z].to_vec();
        self.velocities = x[self.dim_z..2 * self.dim_z].to_vec();
    }

    fn dim_z(&self) -> usize {
        self.dim_z
    }
}

/// Configurable factory for [`OptimizedKalman`]. This is the tracker's
/// default filter factory.
#[derive(Debug, Clone)]
pub struct OptimizedKalmanFactory {
    pub process_noise: f64,
    pub position_variance: f64,
    pub measurement_noise: f64,
}

impl Default for OptimizedKalmanFactory {
    fn default() -> Self {
        Self {
            process_noise: 1.0,
            position_variance: 10.0,
            measurement_noise: 1.0,
        }
    }
}

impl FilterFactory for OptimizedKalmanFactory {
    fn create(&self, initial_points: &PointMatrix) -> Box<dyn Filter> {
        let dim_z = initial_points.nrows() * initial_points.ncols();
        let mut filter = OptimizedKalman::new(
            dim_z,
            self.process_noise,
            self.position_variance,
            self.measurement_noise,
        );
        filter.positions = flatten_row_major(initial_points);
        Box::new(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_static_measurement() {
        let points = PointMatrix::from_row_slice(1, 2, &[0.0, 0.0]);
        let factory = OptimizedKalmanFactory::default();
        let mut filter = factory.create(&points);

        for _ in 0..20 {
            filter.predict();
            filter.update(&[5.0, 5.0], None, None);
        }

        let state = filter.state_vector();
        assert!((state[0] - 5.0).abs() < 0.1);
        assert!((state[1] - 5.0).abs() < 0.1);
        assert!(state[2].abs() < 0.1);
        assert!(state[3].abs() < 0.1);
    }

    #[test]
    fn agrees_with_full_kalman_within_one_percent() {
        use super::super::FullKalmanFactory;

        let points = PointMatrix::from_row_slice(1, 2, &[0.0, 0.0]);
        let mut opt = OptimizedKalmanFactory::default().create(&points);
        let mut full = FullKalmanFactory::default().create(&points);

        for _ in 0..10 {
            opt.predict();
            full.predict();
            opt.update(&[3.0, -2.0], None, None);
            full.update(&[3.0, -2.0], None, None);
        }

        let opt_state = opt.state_vector();
        let full_state = full.state_vector();
        for i in 0..opt_state.len() {
            let diff = (opt_state[i] - full_state[i]).abs();
            let scale = full_state[i].abs().max(1.0);
            assert!(diff / scale < 0.01, "component {i}: {opt_state:?} vs {full_state:?}");
        }
    }
}
