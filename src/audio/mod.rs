// Audio module - microphone capture and the frequency-analysis tap
//
// - capture: CaptureDevice trait shared by every backend
// - cpal_capture: live microphone via cpal (desktop targets)
// - stubs: scripted and WAV-backed devices for tests and replay
// - buffer_pool: lock-free PCM hand-off from the device callback

pub mod buffer_pool;
pub mod capture;
#[cfg(not(target_os = "android"))]
pub mod cpal_capture;
pub mod stubs;

pub use buffer_pool::{AudioBuffer, BufferPool, DEFAULT_BUFFER_COUNT, DEFAULT_BUFFER_SIZE};
pub use capture::CaptureDevice;
#[cfg(not(target_os = "android"))]
pub use cpal_capture::CpalCapture;
pub use stubs::{ScriptedCapture, WavCapture};
