//! Mahony explicit complementary filter
//!
//! The error between measured and predicted reference directions is the
//! cross product of the two; it is fed back into the gyroscope rate
//! through a proportional gain `kp` and an integral gain `ki`. The
//! integral term estimates gyroscope bias and lives in
//! [`OrientationState`] so it survives between ticks.

use nalgebra::{ComplexField, Quaternion, Vector3};

use crate::math::{Vector3Ext, inverse_rotate_vector, quaternion_rate, rotate_vector};
use crate::orientation::OrientationState;
use crate::types::SensorSample;

pub fn update(
    state: &mut OrientationState,
    sample: &SensorSample,
    kp: f32,
    ki: f32,
    delta_time: f32,
) {
    let q = state.quaternion().into_inner();
    let mut angular_rate = sample.gyroscope.deg_to_rad();

    if let Some(error) = reference_error(&q, sample) {
        let integral = state.integral_error_mut();
        if ki > 0.0 {
            *integral += error * delta_time;
        } else {
            *integral = Vector3::zeros();
        }
        angular_rate += error * kp + *integral * ki;
    } else {
        log::trace!("mahony: no accelerometer correction this tick");
    }

    state.commit(q + quaternion_rate(&q, &angular_rate) * delta_time);
}

/// Sum of `measured × predicted` over the available reference vectors
fn reference_error(q: &Quaternion<f32>, sample: &SensorSample) -> Option<Vector3<f32>> {
    let a = sample.accelerometer.try_unit()?;
    let v = inverse_rotate_vector(q, &Vector3::z());
    let mut error = a.cross(&v);

    if let Some(m) = sample.magnetometer.try_unit() {
        let h = rotate_vector(q, &m);
        let b = Vector3::new((h.x * h.x + h.y * h.y).sqrt(), 0.0, h.z);
        let w = inverse_rotate_vector(q, &b);
        error += m.cross(&w);
    }

    Some(error)
}
