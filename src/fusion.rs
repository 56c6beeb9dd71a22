//! Revised AHRS algorithm ("Fusion", Madgwick PhD thesis chapter 7)
//!
//! A complementary filter with a start-up gain ramp, automatic rejection of
//! the accelerometer during motion and of the magnetometer during magnetic
//! interference, and recovery triggers that force the rejected sensor
//! back in after a configurable period.
//!
//! The engine treats this filter as an opaque, pre-validated algorithm: it
//! hands in the current quaternion and sample and reads the result back.
//! It can also be used on its own.

use nalgebra::{ComplexField, Quaternion, UnitQuaternion, Vector3};

use crate::math::{DEG_TO_RAD, QuaternionExt, Vector3Ext, hamilton_product};

/// Gain used while initialising, ramped down to the configured gain
const INITIAL_GAIN: f32 = 10.0;
/// Length of the gain ramp in seconds
const INITIALISATION_PERIOD: f32 = 3.0;
const GYROSCOPE_RANGE_FACTOR: f32 = 0.98;
const RECOVERY_DECREMENT: i32 = 9;

/// Earth axes convention
///
/// - **NWU**: North-West-Up (X=North, Y=West, Z=Up)
/// - **ENU**: East-North-Up (X=East, Y=North, Z=Up)
/// - **NED**: North-East-Down (X=North, Y=East, Z=Down)
///
/// The engine always runs the filter in NWU, the frame shared by every
/// other algorithm in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Convention {
    #[default]
    Nwu,
    Enu,
    Ned,
}

/// Fusion filter settings
///
/// # Example
/// ```
/// use multi_ahrs::fusion::{Convention, FusionAhrs, FusionSettings};
///
/// let settings = FusionSettings {
///     gain: 0.25,
///     acceleration_rejection: 10.0,
///     recovery_trigger_period: 500,
///     ..Default::default()
/// };
/// let ahrs = FusionAhrs::with_settings(settings);
/// assert_eq!(ahrs.settings().convention, Convention::Nwu);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionSettings {
    /// Earth axes convention
    pub convention: Convention,
    /// Filter gain (typically 0.5)
    ///
    /// Higher values trust the accelerometer and magnetometer more.
    pub gain: f32,
    /// Gyroscope range in deg/s; readings above 98% of it restart the
    /// gain ramp. 0 disables the check.
    pub gyroscope_range: f32,
    /// Acceleration rejection threshold in degrees. 0 disables rejection.
    pub acceleration_rejection: f32,
    /// Magnetic rejection threshold in degrees. 0 disables rejection.
    pub magnetic_rejection: f32,
    /// Samples of consecutive rejection before a sensor is forced back in
    pub recovery_trigger_period: u32,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            convention: Convention::default(),
            gain: 0.5,
            gyroscope_range: 0.0,
            acceleration_rejection: 90.0,
            magnetic_rejection: 90.0,
            recovery_trigger_period: 0,
        }
    }
}

/// Diagnostic view of the rejection logic
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FusionInternalStates {
    /// Angle between measured and expected gravity, degrees
    pub acceleration_error: f32,
    pub accelerometer_ignored: bool,
    pub acceleration_recovery_trigger: f32,
    /// Angle between measured and expected magnetic field, degrees
    pub magnetic_error: f32,
    pub magnetometer_ignored: bool,
    pub magnetic_recovery_trigger: f32,
}

/// Operating mode flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FusionFlags {
    /// Gain is still ramping down from its start-up value
    pub initialising: bool,
    /// The gyroscope range was exceeded and the ramp restarted
    pub angular_rate_recovery: bool,
    pub acceleration_recovery: bool,
    pub magnetic_recovery: bool,
}

/// Rejection bookkeeping for one reference sensor
///
/// A reading whose error exceeds the threshold is ignored. Once it has
/// been rejected for more than the recovery period the sensor is forced
/// back in, and stays in until enough accepted readings have drained the
/// trigger.
#[derive(Debug, Clone, Copy)]
struct Rejection {
    /// `(0.5 · sin(threshold))²`, `f32::MAX` when disabled
    threshold_squared: f32,
    period: i32,
    timeout: i32,
    trigger: i32,
    ignored: bool,
    /// Error against the half reference, applied only while not ignored
    half_feedback: Vector3<f32>,
}

impl Default for Rejection {
    fn default() -> Self {
        Self {
            threshold_squared: f32::MAX,
            period: 0,
            timeout: 0,
            trigger: 0,
            ignored: false,
            half_feedback: Vector3::zeros(),
        }
    }
}

impl Rejection {
    fn configure(&mut self, threshold_degrees: f32, period: u32, enabled: bool) {
        self.threshold_squared = if enabled && threshold_degrees > 0.0 {
            (0.5 * (threshold_degrees * DEG_TO_RAD).sin()).powi(2)
        } else {
            f32::MAX
        };
        self.period = period.min(i32::MAX as u32) as i32;
        self.timeout = self.period;
        self.trigger = 0;
    }

    fn reset(&mut self) {
        self.ignored = false;
        self.trigger = 0;
        self.timeout = self.period;
        self.half_feedback = Vector3::zeros();
    }

    /// Accept or reject this tick's feedback; `None` means the sensor gave
    /// no usable reading and is ignored
    fn process(&mut self, feedback: Option<Vector3<f32>>, initialising: bool) {
        self.ignored = true;
        let Some(feedback) = feedback else {
            self.half_feedback = Vector3::zeros();
            return;
        };
        self.half_feedback = feedback;

        if initialising || feedback.norm_squared() <= self.threshold_squared {
            self.ignored = false;
            self.trigger -= RECOVERY_DECREMENT;
        } else {
            self.trigger += 1;
        }

        if self.trigger > self.timeout {
            self.timeout = 0;
            self.ignored = false;
        } else {
            self.timeout = self.period;
        }
        self.trigger = self.trigger.clamp(0, self.period);
    }

    /// Feedback to apply this tick
    fn applied(&self) -> Vector3<f32> {
        if self.ignored {
            Vector3::zeros()
        } else {
            self.half_feedback
        }
    }

    fn recovering(&self) -> bool {
        self.trigger > self.timeout
    }

    fn trigger_ratio(&self) -> f32 {
        if self.period == 0 {
            0.0
        } else {
            self.trigger as f32 / self.period as f32
        }
    }

    fn error_degrees(&self) -> f32 {
        (2.0 * self.half_feedback.norm()).min(1.0).asin().to_degrees()
    }
}

/// Fusion AHRS filter state
#[derive(Debug, Clone, Copy)]
pub struct FusionAhrs {
    settings: FusionSettings,
    quaternion: UnitQuaternion<f32>,
    /// Last accelerometer reading, for linear acceleration
    accelerometer: Vector3<f32>,
    initialising: bool,
    ramped_gain: f32,
    /// Gain decrement per second while initialising
    ramped_gain_step: f32,
    angular_rate_recovery: bool,
    acceleration: Rejection,
    magnetic: Rejection,
    gyroscope_range_threshold: f32,
}

impl FusionAhrs {
    pub fn new() -> Self {
        Self::with_settings(FusionSettings::default())
    }

    pub fn with_settings(settings: FusionSettings) -> Self {
        let mut ahrs = FusionAhrs {
            settings,
            quaternion: UnitQuaternion::identity(),
            accelerometer: Vector3::zeros(),
            initialising: true,
            ramped_gain: INITIAL_GAIN,
            ramped_gain_step: 0.0,
            angular_rate_recovery: false,
            acceleration: Rejection::default(),
            magnetic: Rejection::default(),
            gyroscope_range_threshold: 0.0,
        };
        ahrs.set_settings(settings);
        ahrs
    }

    /// Return to identity and restart the gain ramp
    pub fn reset(&mut self) {
        self.quaternion = UnitQuaternion::identity();
        self.accelerometer = Vector3::zeros();
        self.initialising = true;
        self.ramped_gain = INITIAL_GAIN;
        self.angular_rate_recovery = false;
        self.acceleration.reset();
        self.magnetic.reset();
    }

    pub fn set_settings(&mut self, settings: FusionSettings) {
        self.settings = settings;
        self.gyroscope_range_threshold = if settings.gyroscope_range > 0.0 {
            settings.gyroscope_range * GYROSCOPE_RANGE_FACTOR
        } else {
            0.0
        };
        self.ramped_gain_step = (INITIAL_GAIN - settings.gain) / INITIALISATION_PERIOD;

        // rejection needs a gain to act on and a period to recover in
        let rejection = settings.gain != 0.0 && settings.recovery_trigger_period != 0;
        self.acceleration.configure(
            settings.acceleration_rejection,
            settings.recovery_trigger_period,
            rejection,
        );
        self.magnetic.configure(
            settings.magnetic_rejection,
            settings.recovery_trigger_period,
            rejection,
        );
    }

    pub fn settings(&self) -> FusionSettings {
        self.settings
    }

    /// Update with gyroscope (deg/s), accelerometer (g) and magnetometer
    /// (any unit) readings
    pub fn update(
        &mut self,
        gyroscope: Vector3<f32>,
        accelerometer: Vector3<f32>,
        magnetometer: Vector3<f32>,
        delta_time: f32,
    ) {
        self.accelerometer = accelerometer;

        if self.gyroscope_range_threshold > 0.0
            && gyroscope.norm() > self.gyroscope_range_threshold
        {
            self.angular_rate_recovery = true;
            self.initialising = true;
            self.ramped_gain = INITIAL_GAIN;
        }

        self.ramp_gain(delta_time);

        let half_gravity = self.half_gravity();
        let acceleration_feedback = accelerometer
            .try_unit()
            .map(|a| Self::feedback(a, half_gravity));
        self.acceleration
            .process(acceleration_feedback, self.initialising);

        let half_magnetic = self.half_magnetic();
        // the magnetometer is compared as the horizontal west direction
        let magnetic_feedback = if magnetometer == Vector3::zeros() {
            None
        } else {
            half_gravity
                .cross(&magnetometer)
                .try_unit()
                .map(|west| Self::feedback(west, half_magnetic))
        };
        self.magnetic.process(magnetic_feedback, self.initialising);

        let half_gyroscope = gyroscope * (DEG_TO_RAD * 0.5)
            + (self.acceleration.applied() + self.magnetic.applied()) * self.ramped_gain;

        self.integrate(half_gyroscope, delta_time);
    }

    /// Update without a magnetometer; heading is held at zero while the
    /// gain ramp is running
    pub fn update_no_magnetometer(
        &mut self,
        gyroscope: Vector3<f32>,
        accelerometer: Vector3<f32>,
        delta_time: f32,
    ) {
        self.update(gyroscope, accelerometer, Vector3::zeros(), delta_time);

        if self.initialising {
            let (roll, pitch, _) = self.quaternion.euler_angles();
            self.quaternion = UnitQuaternion::from_euler_angles(roll, pitch, 0.0);
        }
    }

    pub fn quaternion(&self) -> UnitQuaternion<f32> {
        self.quaternion
    }

    pub fn set_quaternion(&mut self, quaternion: UnitQuaternion<f32>) {
        self.quaternion = quaternion;
    }

    /// Gravity direction in the sensor frame
    pub fn gravity(&self) -> Vector3<f32> {
        self.half_gravity() * 2.0
    }

    /// Last accelerometer reading with gravity removed, in g
    pub fn linear_acceleration(&self) -> Vector3<f32> {
        self.accelerometer - self.gravity()
    }

    /// Linear acceleration rotated into the earth frame
    pub fn earth_acceleration(&self) -> Vector3<f32> {
        self.quaternion * self.linear_acceleration()
    }

    pub fn internal_states(&self) -> FusionInternalStates {
        FusionInternalStates {
            acceleration_error: self.acceleration.error_degrees(),
            accelerometer_ignored: self.acceleration.ignored,
            acceleration_recovery_trigger: self.acceleration.trigger_ratio(),
            magnetic_error: self.magnetic.error_degrees(),
            magnetometer_ignored: self.magnetic.ignored,
            magnetic_recovery_trigger: self.magnetic.trigger_ratio(),
        }
    }

    pub fn flags(&self) -> FusionFlags {
        FusionFlags {
            initialising: self.initialising,
            angular_rate_recovery: self.angular_rate_recovery,
            acceleration_recovery: self.acceleration.recovering(),
            magnetic_recovery: self.magnetic.recovering(),
        }
    }

    fn ramp_gain(&mut self, delta_time: f32) {
        if !self.initialising {
            return;
        }
        self.ramped_gain -= self.ramped_gain_step * delta_time;
        if self.ramped_gain < self.settings.gain || self.settings.gain == 0.0 {
            self.ramped_gain = self.settings.gain;
            self.initialising = false;
            self.angular_rate_recovery = false;
        }
    }

    /// Half of the gravity direction expected in the sensor frame
    fn half_gravity(&self) -> Vector3<f32> {
        let q = self.quaternion.as_ref();
        let (qw, qx, qy, qz) = (q.w, q.i, q.j, q.k);

        match self.settings.convention {
            Convention::Nwu | Convention::Enu => Vector3::new(
                qx * qz - qw * qy,
                qy * qz + qw * qx,
                qw * qw - 0.5 + qz * qz,
            ),
            Convention::Ned => Vector3::new(
                qw * qy - qx * qz,
                -(qy * qz + qw * qx),
                0.5 - qw * qw - qz * qz,
            ),
        }
    }

    /// Half of the magnetic reference direction expected in the sensor frame
    fn half_magnetic(&self) -> Vector3<f32> {
        let q = self.quaternion.as_ref();
        let (qw, qx, qy, qz) = (q.w, q.i, q.j, q.k);

        match self.settings.convention {
            // second column of the rotation matrix
            Convention::Nwu => Vector3::new(
                qx * qy + qw * qz,
                qw * qw - 0.5 + qy * qy,
                qy * qz - qw * qx,
            ),
            // negated first column
            Convention::Enu => Vector3::new(
                0.5 - qw * qw - qx * qx,
                qw * qz - qx * qy,
                -(qx * qz + qw * qy),
            ),
            // negated second column
            Convention::Ned => Vector3::new(
                -(qx * qy + qw * qz),
                0.5 - qw * qw - qy * qy,
                qw * qx - qy * qz,
            ),
        }
    }

    /// Cross-product error between a measured unit direction and its
    /// expected half direction; opposing vectors get a full-size error
    fn feedback(sensor: Vector3<f32>, reference: Vector3<f32>) -> Vector3<f32> {
        let cross = sensor.cross(&reference);
        if sensor.dot(&reference) < 0.0 {
            cross.safe_normalize()
        } else {
            cross
        }
    }

    fn integrate(&mut self, half_gyroscope: Vector3<f32>, delta_time: f32) {
        let q = self.quaternion.into_inner();
        let derivative = hamilton_product(&q, &Quaternion::from_imag(half_gyroscope));
        let integrated = q + derivative * delta_time;
        if let Some(unit) = integrated.try_unit() {
            self.quaternion = unit;
        }
    }
}

impl Default for FusionAhrs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn settle(ahrs: &mut FusionAhrs, ticks: usize) {
        for _ in 0..ticks {
            ahrs.update(Vector3::zeros(), Vector3::z(), Vector3::x(), 0.01);
        }
    }

    #[test]
    fn test_new_fusion_ahrs() {
        let ahrs = FusionAhrs::new();
        assert_eq!(ahrs.quaternion(), UnitQuaternion::identity());
        assert!(ahrs.flags().initialising);
    }

    #[test]
    fn test_initialisation_completes() {
        let mut ahrs = FusionAhrs::new();
        // 4 s at 100 Hz covers the 3 s ramp
        settle(&mut ahrs, 400);
        assert!(!ahrs.flags().initialising);
    }

    #[test]
    fn test_gravity_per_convention() {
        let nwu = FusionAhrs::new();
        assert!((nwu.gravity() - Vector3::z()).norm() < EPSILON);

        let ned = FusionAhrs::with_settings(FusionSettings {
            convention: Convention::Ned,
            ..Default::default()
        });
        assert!((ned.gravity() + Vector3::z()).norm() < EPSILON);
    }

    #[test]
    fn test_half_magnetic_nwu_at_identity_points_west() {
        // NWU magnetic reference is the west axis; at identity the
        // gravity-cross-magnetometer direction is +Y
        let ahrs = FusionAhrs::new();
        let half = ahrs.half_magnetic();
        assert!((half - Vector3::new(0.0, 0.5, 0.0)).norm() < EPSILON);
    }

    #[test]
    fn test_gyroscope_overflow_detection() {
        let mut ahrs = FusionAhrs::with_settings(FusionSettings {
            gyroscope_range: 500.0,
            ..Default::default()
        });
        settle(&mut ahrs, 400);
        assert!(!ahrs.flags().initialising);

        ahrs.update(Vector3::new(600.0, 0.0, 0.0), Vector3::z(), Vector3::x(), 0.01);
        assert!(ahrs.flags().angular_rate_recovery);
        assert!(ahrs.flags().initialising);
    }

    #[test]
    fn test_accelerometer_rejection() {
        let mut ahrs = FusionAhrs::with_settings(FusionSettings {
            acceleration_rejection: 10.0,
            recovery_trigger_period: 100,
            ..Default::default()
        });
        settle(&mut ahrs, 400);
        assert!(!ahrs.internal_states().accelerometer_ignored);
        let settled = ahrs.quaternion();

        // 70 degrees off gravity: ignored for the whole recovery period
        let shaken = Vector3::new(2.0, 2.0, 1.0);
        for _ in 0..100 {
            ahrs.update(Vector3::zeros(), shaken, Vector3::x(), 0.01);
            assert!(ahrs.internal_states().accelerometer_ignored);
            assert!(!ahrs.flags().acceleration_recovery);
        }
        assert!(ahrs.quaternion().angle_to(&settled) < 1e-3);
        assert!(ahrs.internal_states().acceleration_recovery_trigger > 0.99);
        assert!(ahrs.internal_states().acceleration_error > 60.0);

        // then forced back in
        ahrs.update(Vector3::zeros(), shaken, Vector3::x(), 0.01);
        assert!(!ahrs.internal_states().accelerometer_ignored);
        assert!(ahrs.flags().acceleration_recovery);
    }

    #[test]
    fn test_recovery_drains_once_readings_agree() {
        let mut ahrs = FusionAhrs::with_settings(FusionSettings {
            acceleration_rejection: 10.0,
            recovery_trigger_period: 20,
            ..Default::default()
        });
        settle(&mut ahrs, 400);
        for _ in 0..21 {
            ahrs.update(Vector3::zeros(), Vector3::new(2.0, 2.0, 1.0), Vector3::x(), 0.01);
        }
        assert!(ahrs.flags().acceleration_recovery);

        settle(&mut ahrs, 500);
        assert!(!ahrs.flags().acceleration_recovery);
        assert!(!ahrs.internal_states().accelerometer_ignored);
        assert!(ahrs.quaternion().angle() < 1.0f32.to_radians());
    }

    #[test]
    fn test_initialising_accepts_any_error() {
        let mut ahrs = FusionAhrs::with_settings(FusionSettings {
            acceleration_rejection: 10.0,
            magnetic_rejection: 10.0,
            recovery_trigger_period: 100,
            ..Default::default()
        });
        let truth = UnitQuaternion::from_euler_angles(0.0, 0.0, 2.5);
        let accelerometer = truth.inverse_transform_vector(&Vector3::z());
        let magnetometer = truth.inverse_transform_vector(&Vector3::x());

        for _ in 0..300 {
            ahrs.update(Vector3::zeros(), accelerometer, magnetometer, 0.01);
        }
        assert!(ahrs.quaternion().angle_to(&truth) < 1.0f32.to_radians());
    }

    #[test]
    fn test_zero_rejection_threshold_disables_rejection() {
        let mut ahrs = FusionAhrs::with_settings(FusionSettings {
            acceleration_rejection: 0.0,
            magnetic_rejection: 0.0,
            ..Default::default()
        });
        settle(&mut ahrs, 400);

        for _ in 0..200 {
            ahrs.update(Vector3::zeros(), Vector3::new(2.0, 2.0, 1.0), Vector3::y(), 0.01);
        }
        let states = ahrs.internal_states();
        assert!(!states.accelerometer_ignored);
        assert!(!states.magnetometer_ignored);
        assert!(!ahrs.flags().acceleration_recovery);
    }

    #[test]
    fn test_no_magnetometer_holds_zero_heading_while_initialising() {
        let mut ahrs = FusionAhrs::new();
        ahrs.set_quaternion(UnitQuaternion::from_euler_angles(0.0, 0.0, 1.0));
        ahrs.update_no_magnetometer(Vector3::zeros(), Vector3::z(), 0.01);

        let (_, _, yaw) = ahrs.quaternion().euler_angles();
        assert!(yaw.abs() < EPSILON);
    }

    #[test]
    fn test_linear_acceleration_at_rest() {
        let mut ahrs = FusionAhrs::new();
        settle(&mut ahrs, 10);
        assert!(ahrs.linear_acceleration().norm() < 1e-4);
        assert!(ahrs.earth_acceleration().norm() < 1e-4);
    }

    #[test]
    fn test_reset_restores_identity() {
        let mut ahrs = FusionAhrs::new();
        for _ in 0..50 {
            ahrs.update(Vector3::new(30.0, 0.0, 0.0), Vector3::z(), Vector3::x(), 0.01);
        }
        assert_ne!(ahrs.quaternion(), UnitQuaternion::identity());

        ahrs.reset();
        assert_eq!(ahrs.quaternion(), UnitQuaternion::identity());
        assert!(ahrs.flags().initialising);
    }
}
