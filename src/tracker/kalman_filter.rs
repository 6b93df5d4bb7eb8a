//! Constant-velocity Kalman filter over `(cx, cy, a, h)` box measurements.
//!
//! State is 8-dimensional: the four measured quantities followed by their
//! velocities. Fixed-size nalgebra matrices keep everything on the stack.

use nalgebra::{SMatrix, SVector};

pub type Mean = SVector<f64, 8>;
pub type Covariance = SMatrix<f64, 8, 8>;
pub type Measurement = SVector<f64, 4>;

type Projection = SMatrix<f64, 4, 8>;

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Covariance,
    update_mat: Projection,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let mut motion_mat = Covariance::identity();
        for i in 0..4 {
            motion_mat[(i, 4 + i)] = 1.0;
        }

        let mut update_mat = Projection::zeros();
        for i in 0..4 {
            update_mat[(i, i)] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Start a track from an unassociated measurement.
    pub fn initiate(&self, measurement: &Measurement) -> (Mean, Covariance) {
        let mut mean = Mean::zeros();
        mean.fixed_rows_mut::<4>(0).copy_from(measurement);

        let h = measurement[3];
        let pos = 2.0 * self.std_weight_position * h;
        let vel = 10.0 * self.std_weight_velocity * h;
        let std = Mean::from([pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);

        (mean, Covariance::from_diagonal(&std.component_mul(&std)))
    }

    pub fn predict(&self, mean: &Mean, covariance: &Covariance) -> (Mean, Covariance) {
        let h = mean[3];
        let pos = self.std_weight_position * h;
        let vel = self.std_weight_velocity * h;
        let std = Mean::from([pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);
        let motion_cov = Covariance::from_diagonal(&std.component_mul(&std));

        let mean = self.motion_mat * mean;
        let covariance = self.motion_mat * covariance * self.motion_mat.transpose() + motion_cov;
        (mean, covariance)
    }

    /// Project the state distribution into measurement space.
    pub fn project(&self, mean: &Mean, covariance: &Covariance) -> (Measurement, SMatrix<f64, 4, 4>) {
        let h = mean[3];
        let pos = self.std_weight_position * h;
        let std = Measurement::from([pos, pos, 1e-1, pos]);
        let innovation_cov = SMatrix::<f64, 4, 4>::from_diagonal(&std.component_mul(&std));

        let projected_mean = self.update_mat * mean;
        let projected_cov = self.update_mat * covariance * self.update_mat.transpose() + innovation_cov;
        (projected_mean, projected_cov)
    }

    /// Correct the state with a new measurement.
    ///
    /// A singular innovation covariance leaves the prediction untouched.
    pub fn update(
        &self,
        mean: &Mean,
        covariance: &Covariance,
        measurement: &Measurement,
    ) -> (Mean, Covariance) {
        let (projected_mean, projected_cov) = self.project(mean, covariance);
        let Some(s_inv) = projected_cov.try_inverse() else {
            return (*mean, *covariance);
        };

        let kalman_gain = covariance * self.update_mat.transpose() * s_inv;
        let innovation = measurement - projected_mean;

        let new_mean = mean + kalman_gain * innovation;
        let new_covariance = covariance - kalman_gain * projected_cov * kalman_gain.transpose();
        (new_mean, new_covariance)
    }
}
