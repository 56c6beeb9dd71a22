//! Engine facade: configuration, time keeping and per-tick dispatch

use nalgebra::{UnitQuaternion, Vector3};

use crate::fusion::{FusionFlags, FusionInternalStates};
use crate::math::{inverse_rotate_vector, rotate_vector};
use crate::orientation::OrientationState;
use crate::parameters::{FusionParameters, ParameterOverrides, beta_from_gyro_meas_error};
use crate::types::{BoardType, EulerAngles, FusionAlgorithm, ImuType, SensorSample};

/// Monotonic microsecond time source
///
/// Any `Fn() -> u64` closure is a clock, which keeps hardware timers and
/// test clocks equally cheap to plug in.
pub trait Clock {
    fn now_micros(&self) -> u64;
}

impl<F: Fn() -> u64> Clock for F {
    fn now_micros(&self) -> u64 {
        self()
    }
}

/// Multi-algorithm attitude and heading reference system
///
/// Owns the selected algorithm, its free parameters, the latest sensor
/// sample and the orientation state. Hosts call [`set_data`](Self::set_data)
/// followed by [`update`](Self::update) once per sensor tick.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use multi_ahrs::{Ahrs, FusionAlgorithm, SensorSample};
///
/// let mut ahrs = Ahrs::new(|| 0u64);
/// ahrs.set_fusion_algorithm(FusionAlgorithm::Mahony);
/// ahrs.begin();
///
/// ahrs.set_data(SensorSample::new(
///     Vector3::zeros(),
///     Vector3::new(0.0, 0.0, 1.0),
///     Vector3::new(1.0, 0.0, 0.0),
/// ));
/// ahrs.update_with_delta_time(0.01);
///
/// let angles = ahrs.angles();
/// assert!(angles.roll.abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct Ahrs<C: Clock> {
    clock: C,
    algorithm: FusionAlgorithm,
    parameters: FusionParameters,
    overrides: ParameterOverrides,
    board_type: BoardType,
    // explicit choice from `set_imu_type`; `imu_type` is the resolved one
    imu_override: Option<ImuType>,
    imu_type: ImuType,
    state: OrientationState,
    sample: SensorSample,
    last_update_micros: Option<u64>,
}

impl<C: Clock> Ahrs<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            algorithm: FusionAlgorithm::default(),
            parameters: FusionParameters::default(),
            overrides: ParameterOverrides::default(),
            board_type: BoardType::default(),
            imu_override: None,
            imu_type: ImuType::default(),
            state: OrientationState::new(),
            sample: SensorSample::default(),
            last_update_micros: None,
        }
    }

    /// Start (or restart) the estimator
    ///
    /// Seeds the identity orientation, clears all per-algorithm state and
    /// applies the defaults for the fitted IMU to every parameter the host
    /// has not set explicitly. Unless an IMU was set explicitly it is
    /// inferred from the current board. Calling it twice is the same as
    /// calling it once.
    pub fn begin(&mut self) {
        self.state.reset();

        self.imu_type = self.imu_override.unwrap_or(self.board_type.imu());
        self.parameters = FusionParameters::for_imu(self.imu_type).with_overrides(&self.overrides);
        self.last_update_micros = None;

        log::info!(
            "AHRS started on {} ({:?}) with {} fusion",
            self.board_type,
            self.imu_type,
            self.algorithm
        );
    }

    /// Store the sample used by the next update
    pub fn set_data(&mut self, sample: SensorSample) {
        self.sample = sample;
    }

    /// Run the selected algorithm with the time elapsed since the last call
    ///
    /// The first call after construction or [`begin`](Self::begin) only
    /// records the timestamp. A clock that moves backwards skips the tick.
    pub fn update(&mut self) {
        let now = self.clock.now_micros();
        let delta_time = match self.last_update_micros.replace(now) {
            Some(previous) => now.wrapping_sub(previous) as i64 as f32 * 1e-6,
            None => 0.0,
        };
        self.update_with_delta_time(delta_time);
    }

    /// Run the selected algorithm with an externally measured delta time
    /// in seconds
    pub fn update_with_delta_time(&mut self, delta_time: f32) {
        self.parameters
            .filter(self.algorithm)
            .update(&mut self.state, &self.sample, delta_time);
    }

    /// Select the fusion algorithm used from the next update on
    ///
    /// The orientation is kept. Entering Mahony from another algorithm
    /// clears its integral error.
    pub fn set_fusion_algorithm(&mut self, algorithm: FusionAlgorithm) {
        if algorithm == self.algorithm {
            return;
        }
        if algorithm == FusionAlgorithm::Mahony {
            self.state.reset_integral_error();
            log::debug!("mahony integral error cleared");
        }
        log::debug!("fusion algorithm {} -> {}", self.algorithm, algorithm);
        self.algorithm = algorithm;
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.parameters.alpha = alpha;
        self.overrides.alpha = Some(alpha);
    }

    pub fn set_beta(&mut self, beta: f32) {
        self.parameters.beta = beta;
        self.overrides.beta = Some(beta);
    }

    /// Set Madgwick's gyroscope measurement error (deg/s) and re-derive beta
    pub fn set_gyro_meas_error(&mut self, gyro_meas_error: f32) {
        self.parameters.gyro_meas_error = gyro_meas_error;
        self.parameters.beta = beta_from_gyro_meas_error(gyro_meas_error);
        self.overrides.gyro_meas_error = Some(gyro_meas_error);
        self.overrides.beta = None;
    }

    pub fn set_kp(&mut self, kp: f32) {
        self.parameters.kp = kp;
        self.overrides.kp = Some(kp);
    }

    pub fn set_ki(&mut self, ki: f32) {
        self.parameters.ki = ki;
        self.overrides.ki = Some(ki);
    }

    pub fn set_fusion_gain(&mut self, gain: f32) {
        self.parameters.fusion_gain = gain;
        self.overrides.fusion_gain = Some(gain);
    }

    /// Magnetic declination in degrees, east positive
    pub fn set_declination(&mut self, declination: f32) {
        self.parameters.declination = declination;
        self.overrides.declination = Some(declination);
    }

    pub fn set_board_type(&mut self, board_type: BoardType) {
        self.board_type = board_type;
    }

    /// Pin the IMU used for defaults; `ImuType::Unknown` goes back to
    /// inferring it from the board
    pub fn set_imu_type(&mut self, imu_type: ImuType) {
        self.imu_type = imu_type;
        self.imu_override = (imu_type != ImuType::Unknown).then_some(imu_type);
    }

    pub fn quaternion(&self) -> UnitQuaternion<f32> {
        self.state.quaternion()
    }

    /// Euler angles and heading derived from the current quaternion
    pub fn angles(&self) -> EulerAngles {
        self.state.euler_angles(self.parameters.declination)
    }

    /// Angles remapped for display in the configurator
    pub fn configurator_angles(&self) -> EulerAngles {
        self.angles().for_configurator()
    }

    pub fn board_type(&self) -> BoardType {
        self.board_type
    }

    pub fn board_type_str(&self) -> &'static str {
        self.board_type.label()
    }

    pub fn imu_type(&self) -> ImuType {
        self.imu_type
    }

    pub fn fusion_algorithm(&self) -> FusionAlgorithm {
        self.algorithm
    }

    pub fn parameters(&self) -> FusionParameters {
        self.parameters
    }

    /// Parameters set explicitly since construction
    pub fn overrides(&self) -> ParameterOverrides {
        self.overrides
    }

    /// Latest sample handed to [`set_data`](Self::set_data)
    pub fn data(&self) -> SensorSample {
        self.sample
    }

    pub fn orientation_state(&self) -> &OrientationState {
        &self.state
    }

    pub fn fusion_flags(&self) -> FusionFlags {
        self.state.fusion().flags()
    }

    pub fn fusion_internal_states(&self) -> FusionInternalStates {
        self.state.fusion().internal_states()
    }

    /// Gravity direction in the sensor frame, from the shared orientation
    pub fn gravity(&self) -> Vector3<f32> {
        inverse_rotate_vector(self.state.quaternion().as_ref(), &Vector3::z())
    }

    /// Latest accelerometer reading with gravity removed, in g
    pub fn linear_acceleration(&self) -> Vector3<f32> {
        self.sample.accelerometer - self.gravity()
    }

    /// Linear acceleration rotated into the earth frame
    pub fn earth_acceleration(&self) -> Vector3<f32> {
        rotate_vector(self.state.quaternion().as_ref(), &self.linear_acceleration())
    }
}
