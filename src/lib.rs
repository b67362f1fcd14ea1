// Sound Trigger Core - acoustic knock/clap trigger
// Frame-driven detection against a calibrated sound profile

// Module declarations
pub mod analysis;
pub mod audio;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;

// Re-exports for convenience
pub use analysis::{Frame, TriggerDecision, TriggerEngine};
pub use calibration::{SoundProfile, SoundSample};
pub use config::AppConfig;
pub use engine::{
    CalibrationSession, CalibrationStatus, DetectionOptions, DetectionSession, DetectorStatus,
    MicrophoneArbiter, StopHandle,
};
pub use error::{AudioError, CalibrationError, ErrorCode};

/// Initialize tracing output for binaries
///
/// `RUST_LOG` overrides `default_filter`. Library `log` records are routed
/// through the subscriber as well. Calling it twice is harmless.
pub fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
