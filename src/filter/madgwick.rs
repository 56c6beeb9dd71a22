//! Madgwick gradient-descent orientation filter
//!
//! The gyroscope rate of change is corrected by one normalized
//! gradient-descent step towards the orientation that best explains the
//! measured gravity (and, when present, the measured magnetic field),
//! scaled by `beta`. The earth magnetic reference is re-estimated every
//! tick from the current orientation, which compensates for magnetic
//! inclination and removes the need for a heading reference.

use nalgebra::{ComplexField, Matrix3x4, Quaternion, Vector3, Vector4};

use crate::math::{NORM_EPSILON, Vector3Ext, quaternion_rate, rotate_vector};
use crate::orientation::OrientationState;
use crate::types::SensorSample;

pub fn update(state: &mut OrientationState, sample: &SensorSample, beta: f32, delta_time: f32) {
    let q = state.quaternion().into_inner();
    let mut rate = quaternion_rate(&q, &sample.gyroscope.deg_to_rad());

    match corrective_step(&q, sample) {
        Some(step) => rate -= step * beta,
        None => log::trace!("madgwick: no accelerometer correction this tick"),
    }

    state.commit(q + rate * delta_time);
}

/// Normalized objective gradient, or `None` when there is nothing to
/// correct against
fn corrective_step(q: &Quaternion<f32>, sample: &SensorSample) -> Option<Quaternion<f32>> {
    let a = sample.accelerometer.try_unit()?;
    let (q1, q2, q3, q4) = (q.w, q.i, q.j, q.k);

    // Gravity: expected minus measured direction in the body frame
    let f_g = Vector3::new(
        2.0 * (q2 * q4 - q1 * q3) - a.x,
        2.0 * (q1 * q2 + q3 * q4) - a.y,
        2.0 * (0.5 - q2 * q2 - q3 * q3) - a.z,
    );
    #[rustfmt::skip]
    let j_g = Matrix3x4::new(
        -2.0 * q3,  2.0 * q4, -2.0 * q1, 2.0 * q2,
         2.0 * q2,  2.0 * q1,  2.0 * q4, 2.0 * q3,
         0.0,      -4.0 * q2, -4.0 * q3, 0.0,
    );
    let mut gradient: Vector4<f32> = j_g.transpose() * f_g;

    if let Some(m) = sample.magnetometer.try_unit() {
        // Earth field direction with the east component folded into north
        let h = rotate_vector(q, &m);
        let bx = (h.x * h.x + h.y * h.y).sqrt();
        let bz = h.z;

        let f_b = Vector3::new(
            2.0 * bx * (0.5 - q3 * q3 - q4 * q4) + 2.0 * bz * (q2 * q4 - q1 * q3) - m.x,
            2.0 * bx * (q2 * q3 - q1 * q4) + 2.0 * bz * (q1 * q2 + q3 * q4) - m.y,
            2.0 * bx * (q1 * q3 + q2 * q4) + 2.0 * bz * (0.5 - q2 * q2 - q3 * q3) - m.z,
        );
        #[rustfmt::skip]
        let j_b = Matrix3x4::new(
            -2.0 * bz * q3,
            2.0 * bz * q4,
            -4.0 * bx * q3 - 2.0 * bz * q1,
            -4.0 * bx * q4 + 2.0 * bz * q2,

            -2.0 * bx * q4 + 2.0 * bz * q2,
            2.0 * bx * q3 + 2.0 * bz * q1,
            2.0 * bx * q2 + 2.0 * bz * q4,
            -2.0 * bx * q1 + 2.0 * bz * q3,

            2.0 * bx * q3,
            2.0 * bx * q4 - 4.0 * bz * q2,
            2.0 * bx * q1 - 4.0 * bz * q3,
            2.0 * bx * q2,
        );
        gradient += j_b.transpose() * f_b;
    }

    let norm = gradient.norm();
    if !(norm.is_finite() && norm > NORM_EPSILON) {
        return None;
    }
    let step = gradient / norm;
    Some(Quaternion::new(step[0], step[1], step[2], step[3]))
}
