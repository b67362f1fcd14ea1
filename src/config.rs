//! Configuration management for detection and calibration tuning
//!
//! Runtime configuration is loaded from a JSON file so that sensitivity,
//! cooldown and the analysis tap can be adjusted without recompiling.
//! Missing or malformed files fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Detection session parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Whether detection starts enabled
    pub enabled: bool,
    /// Fallback sensitivity (0-1) used while no trained profile is loaded
    pub threshold: f32,
    /// Minimum time between two trigger firings
    pub cooldown_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.3,
            cooldown_ms: 1000,
        }
    }
}

/// Calibration workflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Number of recorded samples the CLI waits for before building a profile
    pub target_samples: usize,
    /// Upper bound on a calibration run before giving up
    pub timeout_secs: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            target_samples: 5,
            timeout_secs: 60,
        }
    }
}

/// Frequency-analysis tap and tick configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Transform size in samples; snapshots carry `fft_size / 2` bins
    pub fft_size: usize,
    /// Exponential smoothing between consecutive snapshots (0 = none)
    pub smoothing_time_constant: f32,
    /// Magnitude in dB mapped to byte value 0
    pub min_decibels: f32,
    /// Magnitude in dB mapped to byte value 255
    pub max_decibels: f32,
    /// Frame rate of the periodic tick source
    pub tick_hz: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing_time_constant: 0.3,
            min_decibels: -100.0,
            max_decibels: -30.0,
            tick_hz: 60,
        }
    }
}

impl CaptureConfig {
    /// Number of magnitude bins per snapshot
    pub fn bin_count(&self) -> usize {
        (self.fft_size / 2).max(1)
    }

    /// Nominal tick period in milliseconds
    pub fn tick_interval_ms(&self) -> f64 {
        1000.0 / f64::from(self.tick_hz.max(1))
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Returns
    /// Loaded configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.detection.threshold, 0.3);
        assert_eq!(config.detection.cooldown_ms, 1000);
        assert_eq!(config.capture.fft_size, 256);
        assert_eq!(config.capture.bin_count(), 128);
        assert_eq!(config.calibration.target_samples, 5);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.detection.threshold, config.detection.threshold);
        assert_eq!(parsed.capture.tick_hz, config.capture.tick_hz);
    }

    #[test]
    fn test_partial_file_keeps_other_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"detection": {{"enabled": false, "threshold": 0.6, "cooldown_ms": 250}}}}"#)
            .unwrap();

        let config = AppConfig::load_from_file(file.path());
        assert!(!config.detection.enabled);
        assert_eq!(config.detection.cooldown_ms, 250);
        assert_eq!(config.capture.fft_size, 256);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/sound_trigger.json");
        assert_eq!(config.detection.threshold, 0.3);
    }
}
