//! Free parameters of the fusion algorithms and their defaults

use crate::filter::Filter;
use crate::math::DEG_TO_RAD;
use crate::types::{FusionAlgorithm, ImuType};

/// sqrt(3/4), Madgwick's beta scaling of the gyroscope measurement error
const BETA_SCALE: f32 = 0.866_025_4;

/// Magnetic declination applied when none is configured: Sydney, Australia
pub const DEFAULT_DECLINATION: f32 = 12.717;

/// Free parameters for every algorithm family
///
/// Each field belongs to one algorithm (declination belongs to the heading
/// output). Values for inactive algorithms are kept but unused.
///
/// # Example
/// ```
/// use multi_ahrs::FusionParameters;
///
/// let parameters = FusionParameters {
///     kp: 5.0,
///     ki: 0.1,
///     ..Default::default()
/// };
/// assert_eq!(parameters.alpha, 0.98);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParameters {
    /// Madgwick: expected gyroscope measurement error, deg/s
    pub gyro_meas_error: f32,
    /// Madgwick: gradient-descent step gain
    pub beta: f32,
    /// Complementary: weight of the gyro-integrated attitude in `[0, 1]`
    pub alpha: f32,
    /// Mahony: proportional gain
    pub kp: f32,
    /// Mahony: integral gain; the integral only accumulates while positive
    pub ki: f32,
    /// Fusion: filter gain
    pub fusion_gain: f32,
    /// Magnetic declination in degrees, east positive
    pub declination: f32,
}

impl FusionParameters {
    /// Defaults tuned to the gyroscope noise of each IMU
    pub fn for_imu(imu: ImuType) -> Self {
        let gyro_meas_error = match imu {
            ImuType::Lsm9ds1 | ImuType::Unknown => 40.0,
            ImuType::Lsm6ds3 => 10.0,
            ImuType::Bmi270Bmm150 => 5.0,
        };

        Self {
            gyro_meas_error,
            beta: beta_from_gyro_meas_error(gyro_meas_error),
            alpha: 0.98,
            kp: 10.0,
            ki: 0.0,
            fusion_gain: 0.5,
            declination: DEFAULT_DECLINATION,
        }
    }

    /// Variant carrying only the parameters `algorithm` needs
    pub fn filter(&self, algorithm: FusionAlgorithm) -> Filter {
        match algorithm {
            FusionAlgorithm::Madgwick => Filter::Madgwick { beta: self.beta },
            FusionAlgorithm::Mahony => Filter::Mahony {
                kp: self.kp,
                ki: self.ki,
            },
            FusionAlgorithm::Complementary => Filter::Complementary { alpha: self.alpha },
            FusionAlgorithm::Fusion => Filter::Fusion {
                gain: self.fusion_gain,
            },
            FusionAlgorithm::Classic => Filter::Classic,
            FusionAlgorithm::None => Filter::None,
        }
    }

    /// Apply explicitly chosen values on top of these defaults
    pub fn with_overrides(mut self, overrides: &ParameterOverrides) -> Self {
        if let Some(gyro_meas_error) = overrides.gyro_meas_error {
            self.gyro_meas_error = gyro_meas_error;
            self.beta = beta_from_gyro_meas_error(gyro_meas_error);
        }
        if let Some(beta) = overrides.beta {
            self.beta = beta;
        }
        if let Some(alpha) = overrides.alpha {
            self.alpha = alpha;
        }
        if let Some(kp) = overrides.kp {
            self.kp = kp;
        }
        if let Some(ki) = overrides.ki {
            self.ki = ki;
        }
        if let Some(fusion_gain) = overrides.fusion_gain {
            self.fusion_gain = fusion_gain;
        }
        if let Some(declination) = overrides.declination {
            self.declination = declination;
        }
        self
    }
}

impl Default for FusionParameters {
    fn default() -> Self {
        Self::for_imu(ImuType::Unknown)
    }
}

/// Parameters set explicitly by the host, preserved across `begin()`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParameterOverrides {
    pub gyro_meas_error: Option<f32>,
    pub beta: Option<f32>,
    pub alpha: Option<f32>,
    pub kp: Option<f32>,
    pub ki: Option<f32>,
    pub fusion_gain: Option<f32>,
    pub declination: Option<f32>,
}

/// Madgwick's beta for a gyroscope measurement error in deg/s
///
/// # Example
/// ```
/// use multi_ahrs::parameters::beta_from_gyro_meas_error;
///
/// let beta = beta_from_gyro_meas_error(40.0);
/// assert!((beta - 0.6046).abs() < 1e-3);
/// ```
pub fn beta_from_gyro_meas_error(gyro_meas_error: f32) -> f32 {
    BETA_SCALE * gyro_meas_error * DEG_TO_RAD
}
