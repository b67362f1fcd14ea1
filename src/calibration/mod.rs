// Calibration module - records the target sound and distills it into a profile
//
// This module provides three components:
// 1. CalibrationRecorder: state machine that finds and records sound events
// 2. segment: summarizes one recording into a SoundSample
// 3. SoundProfile: averages samples into the template used for detection
//
// The calibration workflow:
// 1. start() the recorder and keep quiet while the baseline settles
// 2. Make the target sound a few times, each event becomes a SoundSample
// 3. Build a SoundProfile from the collected samples

pub mod profile;
pub mod recorder;
pub mod segment;

pub use profile::{SoundProfile, SoundSample};
pub use recorder::{CalibrationRecorder, RecorderState};
