//! Accelerometer tilt and tilt-compensated compass for the North-West-Up frame
//!
//! These are the absolute (drift-free, gyro-free) references used by the
//! classic and complementary algorithms. Both assume the accelerometer
//! measures only gravity, so they are wrong while the body accelerates.

use nalgebra::{ComplexField, RealField, Vector3};

use crate::math::{RAD_TO_DEG, Vector3Ext};

/// Roll and pitch in radians from an accelerometer reading
///
/// Returns `None` when the reading is (near) zero.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use multi_ahrs::compass::accelerometer_tilt;
///
/// let (roll, pitch) = accelerometer_tilt(Vector3::new(0.0, 0.0, 1.0)).unwrap();
/// assert_eq!(roll, 0.0);
/// assert_eq!(pitch, 0.0);
/// ```
pub fn accelerometer_tilt(accelerometer: Vector3<f32>) -> Option<(f32, f32)> {
    let a = accelerometer.try_unit()?;

    let roll = a.y.atan2(a.z);
    let pitch = (-a.x).atan2((a.y * a.y + a.z * a.z).sqrt());

    Some((roll, pitch))
}

/// Tilt-compensated magnetic yaw in radians
///
/// Builds horizontal west and north vectors in the body frame from cross
/// products of gravity and the magnetic field, then reads the angle of the
/// body X axis between them. The result is the Z-Y-X yaw of the body in
/// the North-West-Up frame (positive towards west).
///
/// Returns `None` when either reading is zero or they are parallel.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use multi_ahrs::compass::tilt_compensated_yaw;
///
/// let accel = Vector3::new(0.0, 0.0, 1.0);  // level
/// let mag = Vector3::new(0.0, -1.0, 0.0);   // north is to the right
/// let yaw = tilt_compensated_yaw(accel, mag).unwrap();
/// assert!((yaw.to_degrees() - 90.0).abs() < 1e-3);
/// ```
pub fn tilt_compensated_yaw(accelerometer: Vector3<f32>, magnetometer: Vector3<f32>) -> Option<f32> {
    let west = accelerometer.cross(&magnetometer).try_unit()?;
    let north = west.cross(&accelerometer).try_unit()?;

    Some(west.x.atan2(north.x))
}

/// Tilt-compensated compass heading in degrees, clockwise from magnetic
/// north, in `[-180, 180)`
pub fn calculate_heading(accelerometer: Vector3<f32>, magnetometer: Vector3<f32>) -> Option<f32> {
    tilt_compensated_yaw(accelerometer, magnetometer).map(|yaw| -yaw * RAD_TO_DEG)
}
