// SpectrumAnalyser - frequency-analysis tap producing byte magnitude snapshots
//
// Mirrors the behaviour of a browser analyser node so calibrated profiles
// stay comparable across capture backends:
//
// 1. Apply a Hann window to the latest `fft_size` samples
// 2. Forward FFT, magnitude |X[k]| / N for k < fft_size / 2
// 3. Smooth over time: s[k] = τ·s_prev[k] + (1 − τ)·mag[k]
// 4. Convert to dB and map [min_db, max_db] linearly onto 0..=255

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::config::CaptureConfig;

/// Analysis tap with fixed transform size and smoothing factor
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    /// Hann window for FFT (pre-computed)
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyser {
    /// Create a new analyser from capture configuration
    pub fn new(config: &CaptureConfig) -> Self {
        let fft_size = config.fft_size.max(2);

        // Pre-compute Hann window to reduce spectral leakage
        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - ((2.0 * std::f32::consts::PI * i as f32) / (fft_size as f32 - 1.0)).cos())
            })
            .collect();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft,
            fft_size,
            smoothing: config.smoothing_time_constant.clamp(0.0, 1.0),
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            window,
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    /// Number of bins in each snapshot
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Analyse the most recent samples and write a byte snapshot
    ///
    /// # Arguments
    /// * `samples` - Time-domain window; the last `fft_size` samples are used,
    ///   shorter input is zero-padded at the front
    /// * `out` - Destination, at most `bin_count()` entries are written
    pub fn analyse(&mut self, samples: &[f32], out: &mut [u8]) {
        let start = samples.len().saturating_sub(self.fft_size);
        let recent = &samples[start..];
        let pad = self.fft_size - recent.len();

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { recent[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let range = (self.max_decibels - self.min_decibels).max(f32::EPSILON);

        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() * scale;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
        }

        for (byte, &smoothed) in out.iter_mut().zip(self.smoothed.iter()) {
            *byte = if smoothed <= 0.0 {
                0
            } else {
                let db = 20.0 * smoothed.log10();
                let scaled = 255.0 * (db - self.min_decibels) / range;
                scaled.clamp(0.0, 255.0) as u8
            };
        }
    }

    /// Clear smoothing history
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
    }
}
