//! Error types
//!
//! The estimator itself never fails; these errors only come from decoding
//! configuration values (for example enum discriminants read back from a
//! parameter store).

use core::fmt;

/// Result type for configuration decoding
pub type Result<T> = core::result::Result<T, Error>;

/// Configuration decoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Discriminant does not name a fusion algorithm
    InvalidFusionAlgorithm(u8),
    /// Discriminant does not name a board
    InvalidBoardType(u8),
    /// Discriminant does not name an IMU
    InvalidImuType(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidFusionAlgorithm(value) => {
                write!(f, "invalid fusion algorithm: {}", value)
            }
            Error::InvalidBoardType(value) => write!(f, "invalid board type: {}", value),
            Error::InvalidImuType(value) => write!(f, "invalid IMU type: {}", value),
        }
    }
}

impl core::error::Error for Error {}
