//! Session layer driving the analysis pipeline from a capture device.
//!
//! `DetectionSession` and `CalibrationSession` each own a `CaptureDevice`
//! and advance one frame per tick. A shared `MicrophoneArbiter` keeps them
//! from holding the microphone at the same time.

pub mod calibration;
pub mod detection;
pub mod microphone;
pub mod ticker;

pub use calibration::{CalibrationSession, CalibrationStatus};
pub use detection::{DetectionOptions, DetectionSession, DetectionSummary, DetectorStatus};
pub use microphone::{MicrophoneArbiter, MicrophoneLease};
pub use ticker::{FixedStepTicker, IntervalTicker, StopHandle, TickSource};
