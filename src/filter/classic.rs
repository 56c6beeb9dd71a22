//! Classic accelerometer tilt and tilt-compensated compass
//!
//! Ignores the gyroscope and the elapsed time. Roll and pitch come from
//! the accelerometer alone, yaw from the magnetometer projected onto the
//! horizontal plane. Without a magnetometer the current yaw is kept.

use nalgebra::UnitQuaternion;

use crate::compass::{accelerometer_tilt, tilt_compensated_yaw};
use crate::math::quaternion_to_euler;
use crate::orientation::OrientationState;
use crate::types::SensorSample;

pub fn update(state: &mut OrientationState, sample: &SensorSample) {
    let Some((roll, pitch)) = accelerometer_tilt(sample.accelerometer) else {
        log::trace!("classic: no accelerometer, holding orientation");
        return;
    };
    let yaw = tilt_compensated_yaw(sample.accelerometer, sample.magnetometer)
        .unwrap_or_else(|| quaternion_to_euler(&state.quaternion()).2);

    state.set_quaternion(UnitQuaternion::from_euler_angles(roll, pitch, yaw));
}
