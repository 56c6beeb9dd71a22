//! Orientation state shared by every fusion algorithm

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::fusion::FusionAhrs;
use crate::math::{QuaternionExt, RAD_TO_DEG, quaternion_to_euler};
use crate::types::EulerAngles;

/// Mutable estimator state
///
/// Holds the canonical body-to-earth quaternion plus the per-algorithm
/// state that has to survive between ticks: Mahony's integral error and
/// the Fusion filter instance. The active algorithm receives it by
/// exclusive reference each tick.
#[derive(Debug, Clone, Copy)]
pub struct OrientationState {
    quaternion: UnitQuaternion<f32>,
    /// Mahony integral of the reference-vector error, rad/s
    integral_error: Vector3<f32>,
    fusion: FusionAhrs,
}

impl OrientationState {
    pub fn new() -> Self {
        Self {
            quaternion: UnitQuaternion::identity(),
            integral_error: Vector3::zeros(),
            fusion: FusionAhrs::new(),
        }
    }

    /// Seed identity and clear all per-algorithm state
    pub fn reset(&mut self) {
        self.quaternion = UnitQuaternion::identity();
        self.integral_error = Vector3::zeros();
        self.fusion.reset();
    }

    pub fn quaternion(&self) -> UnitQuaternion<f32> {
        self.quaternion
    }

    /// Replace the orientation, e.g. to seed it from an external reference
    pub fn set_quaternion(&mut self, quaternion: UnitQuaternion<f32>) {
        self.quaternion = quaternion;
    }

    /// Normalize and store a candidate orientation
    ///
    /// A candidate that cannot be normalized (zero or non-finite) is dropped
    /// and the last orientation is held. Returns whether it was stored.
    pub fn commit(&mut self, candidate: Quaternion<f32>) -> bool {
        match candidate.try_unit() {
            Some(unit) => {
                self.quaternion = unit;
                true
            }
            None => {
                log::trace!("dropping non-normalizable orientation update");
                false
            }
        }
    }

    pub fn integral_error(&self) -> Vector3<f32> {
        self.integral_error
    }

    pub(crate) fn integral_error_mut(&mut self) -> &mut Vector3<f32> {
        &mut self.integral_error
    }

    pub fn reset_integral_error(&mut self) {
        self.integral_error = Vector3::zeros();
    }

    pub fn fusion(&self) -> &FusionAhrs {
        &self.fusion
    }

    pub(crate) fn fusion_mut(&mut self) -> &mut FusionAhrs {
        &mut self.fusion
    }

    /// Euler angles in degrees derived from the current quaternion
    ///
    /// `declination` (degrees, east positive) only affects `heading`.
    pub fn euler_angles(&self, declination: f32) -> EulerAngles {
        let (roll, pitch, yaw) = quaternion_to_euler(&self.quaternion);
        EulerAngles::from_degrees(
            roll * RAD_TO_DEG,
            pitch * RAD_TO_DEG,
            yaw * RAD_TO_DEG,
            declination,
        )
    }
}

impl Default for OrientationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::DEG_TO_RAD;

    #[test]
    fn test_new_state_is_identity() {
        let state = OrientationState::new();
        assert_eq!(state.quaternion(), UnitQuaternion::identity());
        assert_eq!(state.integral_error(), Vector3::zeros());
        assert_eq!(state.euler_angles(0.0), EulerAngles::default());
    }

    #[test]
    fn test_commit_normalizes() {
        let mut state = OrientationState::new();
        assert!(state.commit(Quaternion::new(2.0, 0.0, 0.0, 2.0)));
        assert!((state.quaternion().into_inner().norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_commit_holds_on_degenerate_candidate() {
        let mut state = OrientationState::new();
        let held = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        state.set_quaternion(held);

        assert!(!state.commit(Quaternion::new(0.0, 0.0, 0.0, 0.0)));
        assert!(!state.commit(Quaternion::new(f32::NAN, 1.0, 0.0, 0.0)));
        assert!(!state.commit(Quaternion::new(f32::INFINITY, 0.0, 0.0, 0.0)));
        assert_eq!(state.quaternion(), held);
    }

    #[test]
    fn test_euler_angles_in_degrees() {
        let mut state = OrientationState::new();
        state.set_quaternion(UnitQuaternion::from_euler_angles(
            10.0 * DEG_TO_RAD,
            -20.0 * DEG_TO_RAD,
            30.0 * DEG_TO_RAD,
        ));

        let angles = state.euler_angles(5.0);
        assert!((angles.roll - 10.0).abs() < 1e-3);
        assert!((angles.pitch + 20.0).abs() < 1e-3);
        assert!((angles.yaw - 30.0).abs() < 1e-3);
        assert!((angles.heading - 335.0).abs() < 1e-3);
    }

    #[test]
    fn test_reset_clears_integral_error() {
        let mut state = OrientationState::new();
        *state.integral_error_mut() = Vector3::new(0.1, 0.2, 0.3);
        state.set_quaternion(UnitQuaternion::from_euler_angles(0.5, 0.0, 0.0));

        state.reset();
        assert_eq!(state.integral_error(), Vector3::zeros());
        assert_eq!(state.quaternion(), UnitQuaternion::identity());
    }
}
