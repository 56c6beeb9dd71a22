#![no_std]

//! Multi AHRS - an attitude and heading reference system with runtime
//! selectable sensor fusion algorithms
//!
//! The engine fuses gyroscope, accelerometer and (optionally) magnetometer
//! readings into a unit quaternion, then derives roll, pitch, yaw and a
//! declination-corrected compass heading from it. The algorithm can be
//! switched between ticks without losing the current orientation.
//!
//! # Features
//!
//! - Madgwick gradient-descent filter
//! - Mahony proportional-integral filter
//! - Complementary filter blending gyro and accelerometer/magnetometer attitude
//! - Fusion AHRS (xioTechnologies revised algorithm) with sensor rejection
//!   and recovery
//! - Classic accelerometer tilt plus tilt-compensated compass
//! - Per-IMU parameter defaults for the Arduino Nano 33 BLE family and the
//!   Seeed XIAO nRF52840 Sense
//! - `#![no_std]`, no allocation
//!
//! All vectors use the North-West-Up earth frame. Gyroscope readings are in
//! deg/s, accelerometer in g, magnetometer in gauss.
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::Vector3;
//! use multi_ahrs::{Ahrs, BoardType, FusionAlgorithm, SensorSample};
//!
//! // Any `Fn() -> u64` returning microseconds is a clock
//! let mut ahrs = Ahrs::new(|| 0u64);
//! ahrs.set_board_type(BoardType::Nano33Ble);
//! ahrs.set_fusion_algorithm(FusionAlgorithm::Fusion);
//! ahrs.set_declination(12.717);
//! ahrs.begin();
//!
//! // Once per sensor tick
//! ahrs.set_data(SensorSample::new(
//!     Vector3::new(0.1, 0.2, 0.3),   // deg/s
//!     Vector3::new(0.0, 0.0, 1.0),   // g
//!     Vector3::new(0.3, 0.0, -0.4),  // gauss
//! ));
//! ahrs.update_with_delta_time(0.01);
//!
//! let angles = ahrs.angles();
//! assert!(angles.heading >= 0.0 && angles.heading < 360.0);
//! ```

pub mod compass;
mod engine;
mod error;
pub mod filter;
pub mod fusion;
mod math;
pub mod orientation;
pub mod parameters;
mod types;

// Re-export all public types and functions
pub use compass::calculate_heading;
pub use engine::{Ahrs, Clock};
pub use error::{Error, Result};
pub use fusion::{Convention, FusionAhrs, FusionFlags, FusionInternalStates, FusionSettings};
pub use math::{
    DEG_TO_RAD, QuaternionExt, RAD_TO_DEG, Vector3Ext, normalize_quaternion, quaternion_to_euler,
    wrap_degrees_360,
};
pub use orientation::OrientationState;
pub use parameters::{FusionParameters, ParameterOverrides};
pub use types::*;
