//! Core types shared between the engine, the algorithms and their callers

use core::fmt;

use nalgebra::Vector3;

use crate::error::{Error, Result};
use crate::math::wrap_degrees_360;

/// One sensor sample
///
/// Produced once per tick by the acquisition layer. Units follow the
/// usual IMU driver conventions:
/// - gyroscope in degrees per second
/// - accelerometer in g
/// - magnetometer in gauss
///
/// A zero magnetometer vector means the IMU has no magnetometer; every
/// algorithm then runs in 6-axis mode.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use multi_ahrs::SensorSample;
///
/// let sample = SensorSample::new(
///     Vector3::new(0.0, 0.0, 0.0),  // deg/s
///     Vector3::new(0.0, 0.0, 1.0),  // g
///     Vector3::new(0.3, 0.0, -0.4), // gauss
/// );
/// assert!(sample.has_magnetometer());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Angular rate in deg/s
    pub gyroscope: Vector3<f32>,
    /// Specific force in g
    pub accelerometer: Vector3<f32>,
    /// Magnetic field in gauss
    pub magnetometer: Vector3<f32>,
}

impl SensorSample {
    pub fn new(
        gyroscope: Vector3<f32>,
        accelerometer: Vector3<f32>,
        magnetometer: Vector3<f32>,
    ) -> Self {
        Self {
            gyroscope,
            accelerometer,
            magnetometer,
        }
    }

    /// Sample from a 6-axis IMU (no magnetometer)
    pub fn without_magnetometer(gyroscope: Vector3<f32>, accelerometer: Vector3<f32>) -> Self {
        Self::new(gyroscope, accelerometer, Vector3::zeros())
    }

    /// Whether the magnetometer reading carries any information
    pub fn has_magnetometer(&self) -> bool {
        self.magnetometer != Vector3::zeros()
    }
}

impl Default for SensorSample {
    fn default() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros(), Vector3::zeros())
    }
}

/// Orientation as Euler angles, in degrees
///
/// Always derived from the engine's quaternion, never stored as the
/// source of truth.
///
/// - `roll`, `pitch`, `yaw` follow the aerospace Z-Y-X sequence in the
///   North-West-Up earth frame (positive yaw turns the nose towards west)
/// - `heading` is the compass heading: clockwise from north, corrected
///   by the magnetic declination, in `[0, 360)`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub heading: f32,
}

impl EulerAngles {
    /// Build angles from roll/pitch/yaw in degrees, deriving the heading
    /// with the given declination (degrees, east positive)
    pub fn from_degrees(roll: f32, pitch: f32, yaw: f32, declination: f32) -> Self {
        Self {
            roll,
            pitch,
            yaw,
            heading: wrap_degrees_360(declination - yaw),
        }
    }

    /// Remap to the configurator display convention
    ///
    /// The configurator draws nose-up pitch as positive and shows yaw as a
    /// compass heading. The remap is stateless and never touches the
    /// quaternion it was derived from.
    ///
    /// # Example
    /// ```
    /// use multi_ahrs::EulerAngles;
    ///
    /// let angles = EulerAngles::from_degrees(5.0, -10.0, 30.0, 0.0);
    /// let display = angles.for_configurator();
    ///
    /// assert_eq!(display.roll, 5.0);
    /// assert_eq!(display.pitch, 10.0);
    /// assert_eq!(display.yaw, 330.0);
    /// ```
    pub fn for_configurator(&self) -> Self {
        Self {
            roll: self.roll,
            pitch: -self.pitch,
            yaw: self.heading,
            heading: self.heading,
        }
    }
}

/// Sensor fusion algorithm selection
///
/// Any value can be selected from any other at runtime. Switching keeps
/// the current orientation; only Mahony's integral error is cleared when
/// it is entered.
///
/// The discriminants match the numeric codes used by parameter stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FusionAlgorithm {
    /// Gradient-descent orientation filter
    #[default]
    Madgwick = 0,
    /// Proportional-integral complementary filter
    Mahony = 1,
    /// Weighted blend of gyro integration and accelerometer/magnetometer
    /// attitude
    Complementary = 2,
    /// Revised AHRS algorithm with sensor rejection and recovery
    Fusion = 3,
    /// Accelerometer tilt plus tilt-compensated compass, no gyro
    Classic = 4,
    /// Bypass: the orientation is never touched
    None = 5,
}

impl FusionAlgorithm {
    /// Every algorithm, in discriminant order
    pub const ALL: [FusionAlgorithm; 6] = [
        FusionAlgorithm::Madgwick,
        FusionAlgorithm::Mahony,
        FusionAlgorithm::Complementary,
        FusionAlgorithm::Fusion,
        FusionAlgorithm::Classic,
        FusionAlgorithm::None,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FusionAlgorithm::Madgwick => "Madgwick",
            FusionAlgorithm::Mahony => "Mahony",
            FusionAlgorithm::Complementary => "Complementary",
            FusionAlgorithm::Fusion => "Fusion",
            FusionAlgorithm::Classic => "Classic",
            FusionAlgorithm::None => "None",
        }
    }
}

impl fmt::Display for FusionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for FusionAlgorithm {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(Error::InvalidFusionAlgorithm(value))
    }
}

/// Inertial measurement unit fitted to the board
///
/// Advisory only: used to pick default free parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImuType {
    /// 9-axis, Nano 33 BLE and Nano 33 BLE Sense Rev 1
    Lsm9ds1 = 0,
    /// 6-axis, no magnetometer, XIAO nRF52840 Sense
    Lsm6ds3 = 1,
    /// 6-axis IMU plus separate magnetometer, Nano 33 BLE Sense Rev 2
    Bmi270Bmm150 = 2,
    #[default]
    Unknown = 3,
}

impl ImuType {
    pub const ALL: [ImuType; 4] = [
        ImuType::Lsm9ds1,
        ImuType::Lsm6ds3,
        ImuType::Bmi270Bmm150,
        ImuType::Unknown,
    ];

    /// Whether the IMU provides magnetometer readings
    pub fn has_magnetometer(&self) -> bool {
        !matches!(self, ImuType::Lsm6ds3)
    }
}

impl TryFrom<u8> for ImuType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(Error::InvalidImuType(value))
    }
}

/// Host board
///
/// Advisory only: used to infer the IMU and label telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoardType {
    Nano33Ble = 0,
    Nano33BleSenseRev1 = 1,
    Nano33BleSenseRev2 = 2,
    XiaoSense = 3,
    #[default]
    NotDefined = 4,
}

/// Display labels indexed by `BoardType` discriminant
const BOARD_LABELS: [&str; 5] = [
    "Nano 33 BLE",
    "Nano 33 BLE Sense Rev 1",
    "Nano 33 BLE Sense Rev 2",
    "Seeed XIAO nRF52840 Sense",
    "Undefined Board",
];

impl BoardType {
    pub const ALL: [BoardType; 5] = [
        BoardType::Nano33Ble,
        BoardType::Nano33BleSenseRev1,
        BoardType::Nano33BleSenseRev2,
        BoardType::XiaoSense,
        BoardType::NotDefined,
    ];

    /// Human-readable board name
    pub fn label(&self) -> &'static str {
        BOARD_LABELS[*self as usize]
    }

    /// IMU fitted to this board
    pub fn imu(&self) -> ImuType {
        match self {
            BoardType::Nano33Ble | BoardType::Nano33BleSenseRev1 => ImuType::Lsm9ds1,
            BoardType::Nano33BleSenseRev2 => ImuType::Bmi270Bmm150,
            BoardType::XiaoSense => ImuType::Lsm6ds3,
            BoardType::NotDefined => ImuType::Unknown,
        }
    }
}

impl fmt::Display for BoardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<u8> for BoardType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(Error::InvalidBoardType(value))
    }
}
