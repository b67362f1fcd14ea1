// Audio capture error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes a host maps onto its own
/// permission prompts and device pickers.
///
/// Error code range: 1001-1007
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Microphone permission denied
    pub const PERMISSION_DENIED: i32 = 1001;

    /// No usable input device was found
    pub const DEVICE_UNAVAILABLE: i32 = 1002;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1003;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1004;

    /// Microphone already owned by another session
    pub const DEVICE_BUSY: i32 = 1005;

    /// Audio stream disconnected or channel closed unexpectedly
    pub const STREAM_FAILURE: i32 = 1006;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1007;
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=Capture, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio capture errors
///
/// These errors cover microphone acquisition, stream management and
/// exclusive device ownership.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Microphone permission denied
    PermissionDenied,

    /// No usable input device was found
    DeviceUnavailable { reason: String },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Microphone is held by another session
    DeviceBusy { owner: String },

    /// Stream channel disconnected unexpectedly
    StreamFailure { reason: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::PermissionDenied => AudioErrorCodes::PERMISSION_DENIED,
            AudioError::DeviceUnavailable { .. } => AudioErrorCodes::DEVICE_UNAVAILABLE,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::DeviceBusy { .. } => AudioErrorCodes::DEVICE_BUSY,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::PermissionDenied => {
                "Microphone permission denied. Grant access and start again.".to_string()
            }
            AudioError::DeviceUnavailable { reason } => {
                format!("No input device available: {}", reason)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::DeviceBusy { owner } => {
                format!("Microphone is busy (owned by {} session)", owner)
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for AudioError {}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::StreamOpenFailed {
            reason: err.to_string(),
        }
    }
}
