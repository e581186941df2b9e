use super::{Filter, FilterFactory};
use crate::numerics::{flatten_row_major, PointMatrix};

/// Pass-through filter: no prediction, no smoothing. `update` masks in the
/// raw measurement for observed components and leaves the rest as-is.
/// Velocities are always reported as zero.
#[derive(Debug, Clone)]
pub struct NoFilter {
    dim_z: usize,
    positions: Vec<f64>,
}

impl Filter for NoFilter {
    fn predict(&mut self) {}

    fn update(&mut self, z: &[f64], _r: Option<&[f64]>, observed: Option<&[bool]>) {
        assert_eq!(z.len(), self.dim_z, "measurement length must equal dim_z");
        for i in 0..self.dim_z {
            let is_observed = observed.map(|o| o[i]).unwrap_or(true);
            if is_observed {
                self.positions[i] = z[i];
            }
        }
    }

    fn state_vector(&self) -> Vec<f64> {
        let mut state = self.positions.clone();
        state.extend(std::iter::repeat(0.0).take(self.dim_z));
        state
    }

    fn set_state_vector(&mut self, x: Vec<f64>) {
        self.positions = x[..self.dim_z].to_vec();
    }

    fn dim_z(&self) -> usize {
        self.dim_z
    }
}

/// Factory for [`NoFilter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilterFactory;

impl FilterFactory for NoFilterFactory {
    fn create(&self, initial_points: &PointMatrix) -> Box<dyn Filter> {
        let dim_z = initial_points.nrows() * initial_points.ncols();
        Box::new(NoFilter {
            dim_z,
            positions: flatten_row_major(initial_points),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_overwrites_observed_positions_only() {
        let points = PointMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let mut filter = NoFilterFactory.create(&points);
        filter.predict();
        filter.update(&[9.0, 9.0], None, Some(&[true, false]));
        let state = filter.state_vector();
        assert_eq!(state[0], 9.0);
        assert_eq!(state[1], 1.0);
        assert_eq!(state[2], 0.0);
        assert_eq!(state[3], 0.0);
    }
}
