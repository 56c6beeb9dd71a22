//! Sensor fusion algorithms
//!
//! Every algorithm shares one contract: given the orientation state, one
//! sensor sample and the elapsed time, update the state in place. The set
//! is closed, so dispatch is a single `match` on [`Filter`] instead of a
//! trait object.
//!
//! Common rules, enforced here and in each algorithm:
//! - a non-positive or non-finite `delta_time` is a no-op
//! - a zero accelerometer or magnetometer skips that sensor's correction
//! - a candidate orientation that cannot be normalized is dropped, so the
//!   last orientation is held

pub mod classic;
pub mod complementary;
pub mod madgwick;
pub mod mahony;

use crate::fusion::FusionSettings;
use crate::orientation::OrientationState;
use crate::types::SensorSample;

/// One algorithm together with the parameters it uses
///
/// Built from [`FusionParameters::filter`](crate::FusionParameters::filter)
/// each tick, so parameter changes take effect on the next update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Filter {
    Madgwick { beta: f32 },
    Mahony { kp: f32, ki: f32 },
    Complementary { alpha: f32 },
    Fusion { gain: f32 },
    Classic,
    None,
}

impl Filter {
    /// Advance `state` by one tick
    pub fn update(&self, state: &mut OrientationState, sample: &SensorSample, delta_time: f32) {
        if *self == Filter::None {
            return;
        }
        if !(delta_time > 0.0 && delta_time.is_finite()) {
            log::trace!("skipping update, delta time {}", delta_time);
            return;
        }

        match *self {
            Filter::Madgwick { beta } => madgwick::update(state, sample, beta, delta_time),
            Filter::Mahony { kp, ki } => mahony::update(state, sample, kp, ki, delta_time),
            Filter::Complementary { alpha } => {
                complementary::update(state, sample, alpha, delta_time)
            }
            Filter::Fusion { gain } => update_fusion(state, sample, gain, delta_time),
            Filter::Classic => classic::update(state, sample),
            Filter::None => {}
        }
    }
}

/// Hand the tick to the Fusion filter and read its orientation back
///
/// The filter is seeded with the shared quaternion every tick so that
/// switching into it continues from the current estimate. A 6-axis sample
/// goes through the full update with a zero magnetometer: the library's
/// magnetometer-free entry point zeroes heading while it initialises, which
/// would discard the seeded yaw.
fn update_fusion(state: &mut OrientationState, sample: &SensorSample, gain: f32, delta_time: f32) {
    let quaternion = state.quaternion();
    let fusion = state.fusion_mut();

    let settings = fusion.settings();
    if settings.gain != gain {
        fusion.set_settings(FusionSettings { gain, ..settings });
    }
    fusion.set_quaternion(quaternion);

    fusion.update(
        sample.gyroscope,
        sample.accelerometer,
        sample.magnetometer,
        delta_time,
    );

    let updated = fusion.quaternion();
    state.set_quaternion(updated);
}
