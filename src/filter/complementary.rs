//! Complementary filter
//!
//! Blends the gyro-integrated orientation with the absolute orientation
//! measured by the accelerometer (roll and pitch) and the tilt-compensated
//! magnetometer (yaw). `alpha` is the weight of the gyro estimate: 1 trusts
//! the gyroscope only, 0 snaps to the measured attitude every tick.

use nalgebra::{Quaternion, UnitQuaternion};

use crate::compass::{accelerometer_tilt, tilt_compensated_yaw};
use crate::math::{QuaternionExt, Vector3Ext, quaternion_rate, quaternion_to_euler};
use crate::orientation::OrientationState;
use crate::types::SensorSample;

pub fn update(state: &mut OrientationState, sample: &SensorSample, alpha: f32, delta_time: f32) {
    let q = state.quaternion().into_inner();
    let rate = quaternion_rate(&q, &sample.gyroscope.deg_to_rad());
    let Some(predicted) = (q + rate * delta_time).try_unit() else {
        log::trace!("complementary: dropping non-normalizable prediction");
        return;
    };

    let Some(reference) = measured_attitude(&predicted, sample) else {
        state.set_quaternion(predicted);
        return;
    };

    state.commit(blend(predicted.into_inner(), reference.into_inner(), alpha));
}

/// Attitude measured by the accelerometer and magnetometer
///
/// Without a magnetometer the predicted yaw is kept.
fn measured_attitude(
    predicted: &UnitQuaternion<f32>,
    sample: &SensorSample,
) -> Option<UnitQuaternion<f32>> {
    let (roll, pitch) = accelerometer_tilt(sample.accelerometer)?;
    let yaw = tilt_compensated_yaw(sample.accelerometer, sample.magnetometer)
        .unwrap_or_else(|| quaternion_to_euler(predicted).2);
    Some(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
}

/// Weighted sum of two orientations on the same hemisphere
fn blend(predicted: Quaternion<f32>, reference: Quaternion<f32>, alpha: f32) -> Quaternion<f32> {
    let reference = if predicted.dot(&reference) < 0.0 {
        -reference
    } else {
        reference
    };
    predicted * alpha + reference * (1.0 - alpha)
}
