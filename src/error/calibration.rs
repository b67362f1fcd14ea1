// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// No samples recorded yet, nothing to build a profile from
    pub const NO_SAMPLES: i32 = 2001;
}

/// Log a calibration error with structured context
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationRecorder, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// Not fatal to a session: the recorder keeps listening and the host treats
/// a failed build as "not yet calibrated".
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Profile build requested with an empty sample collection
    NoSamples,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::NoSamples => CalibrationErrorCodes::NO_SAMPLES,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::NoSamples => {
                "No calibration samples recorded. Make the sound a few times first.".to_string()
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
