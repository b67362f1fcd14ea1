// SoundProfile - aggregated acoustic template built from calibration samples
//
// Thresholds are derived from the averaged peak level with a 40% margin
// (min_trigger_level = 0.6 * peak) so quieter repetitions of the same sound
// still qualify. The frequency signature is normalized to a maximum of 1.

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Fraction of the averaged peak level used as the detection floor
pub const MIN_TRIGGER_RATIO: f32 = 0.6;

/// One recorded instance of the target sound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundSample {
    pub peak_level: f32,
    pub avg_level: f32,
    /// Per-bin mean magnitudes, not normalized
    pub frequency_data: Vec<f32>,
    pub attack_time_ms: f32,
    pub duration_ms: f32,
}

/// Calibrated profile consumed by the trigger engine
///
/// `sample_count == 0` marks an untrained profile: detection falls back to a
/// plain level threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundProfile {
    pub peak_level: f32,
    pub avg_level: f32,
    /// Energy floor below which detection is impossible
    pub min_trigger_level: f32,
    /// Normalized per-bin weights (max element 1); empty ignores spectral shape
    #[serde(default)]
    pub frequency_signature: Vec<f32>,
    /// Informative timing descriptors, not enforced by detection
    pub attack_time_ms: f32,
    pub duration_ms: f32,
    pub sample_count: usize,
}

impl SoundProfile {
    /// Fallback profile gating on level alone
    pub fn untrained(threshold: f32) -> Self {
        Self {
            peak_level: threshold,
            avg_level: threshold,
            min_trigger_level: threshold,
            frequency_signature: Vec::new(),
            attack_time_ms: 0.0,
            duration_ms: 0.0,
            sample_count: 0,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.sample_count > 0
    }

    /// Build a profile from recorded samples
    ///
    /// # Returns
    /// * `Ok(SoundProfile)` - Averaged profile with normalized signature
    /// * `Err(CalibrationError::NoSamples)` - Empty sample collection
    pub fn from_samples(samples: &[SoundSample]) -> Result<Self, CalibrationError> {
        let first = samples.first().ok_or(CalibrationError::NoSamples)?;
        let count = samples.len() as f32;

        let peak_level = mean_of(samples, |s| s.peak_level);
        let avg_level = mean_of(samples, |s| s.avg_level);
        let attack_time_ms = mean_of(samples, |s| s.attack_time_ms);
        let duration_ms = mean_of(samples, |s| s.duration_ms);

        // Bin count follows the first sample, missing bins count as zero
        let bins = first.frequency_data.len();
        let mut frequency_signature = vec![0.0_f32; bins];
        for sample in samples {
            for (acc, value) in frequency_signature.iter_mut().zip(&sample.frequency_data) {
                *acc += value;
            }
        }
        frequency_signature.iter_mut().for_each(|v| *v /= count);
        normalize_to_peak(&mut frequency_signature);

        Ok(Self {
            peak_level,
            avg_level,
            min_trigger_level: MIN_TRIGGER_RATIO * peak_level,
            frequency_signature,
            attack_time_ms,
            duration_ms,
            sample_count: samples.len(),
        })
    }
}

fn mean_of(samples: &[SoundSample], field: impl Fn(&SoundSample) -> f32) -> f32 {
    samples.iter().map(field).sum::<f32>() / samples.len() as f32
}

/// Divide every element by the maximum; all-zero input is left untouched
fn normalize_to_peak(values: &mut [f32]) {
    let max = values.iter().copied().fold(0.0_f32, f32::max);
    if max > 0.0 {
        values.iter_mut().for_each(|v| *v /= max);
    }
}
