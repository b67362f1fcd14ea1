//! Capture devices that run without microphone hardware
//!
//! `ScriptedCapture` replays pre-computed magnitude snapshots and can refuse
//! permission, which lets session tests drive every code path
//! deterministically. `WavCapture` feeds a recorded file through the same
//! spectrum analyser the live device uses, advancing one tick's worth of
//! samples per read.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;
use std::path::Path;

use super::capture::CaptureDevice;
use crate::analysis::SpectrumAnalyser;
use crate::config::CaptureConfig;
use crate::error::AudioError;

/// Capture stand-in fed from a queue of byte snapshots
///
/// Once the queue is exhausted every read yields silence.
#[derive(Debug, Clone)]
pub struct ScriptedCapture {
    bin_count: usize,
    snapshots: VecDeque<Vec<u8>>,
    deny_permission: bool,
    acquired: bool,
    acquire_count: usize,
    release_count: usize,
}

impl ScriptedCapture {
    pub fn new(bin_count: usize) -> Self {
        Self {
            bin_count: bin_count.max(1),
            snapshots: VecDeque::new(),
            deny_permission: false,
            acquired: false,
            acquire_count: 0,
            release_count: 0,
        }
    }

    pub fn with_snapshots(bin_count: usize, snapshots: Vec<Vec<u8>>) -> Self {
        let mut capture = Self::new(bin_count);
        capture.snapshots.extend(snapshots);
        capture
    }

    /// Flat snapshots whose mean level matches each entry of `levels`
    pub fn from_levels(bin_count: usize, levels: &[f32]) -> Self {
        let snapshots = levels
            .iter()
            .map(|&level| vec![level_to_byte(level); bin_count.max(1)])
            .collect();
        Self::with_snapshots(bin_count, snapshots)
    }

    /// Random low-level snapshots, reproducible for a given seed
    pub fn ambient_noise(bin_count: usize, frames: usize, max_byte: u8, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let snapshots = (0..frames)
            .map(|_| {
                (0..bin_count.max(1))
                    .map(|_| rng.gen_range(0..=max_byte))
                    .collect()
            })
            .collect();
        Self::with_snapshots(bin_count, snapshots)
    }

    /// Make every acquisition fail with `PermissionDenied`
    pub fn deny_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    pub fn push_snapshot(&mut self, snapshot: Vec<u8>) {
        self.snapshots.push_back(snapshot);
    }

    pub fn push_levels(&mut self, levels: &[f32]) {
        for &level in levels {
            self.snapshots
                .push_back(vec![level_to_byte(level); self.bin_count]);
        }
    }

    /// Snapshots not yet read
    pub fn remaining(&self) -> usize {
        self.snapshots.len()
    }

    pub fn acquire_count(&self) -> usize {
        self.acquire_count
    }

    pub fn release_count(&self) -> usize {
        self.release_count
    }
}

fn level_to_byte(level: f32) -> u8 {
    (level.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl CaptureDevice for ScriptedCapture {
    fn acquire(&mut self) -> Result<(), AudioError> {
        if self.deny_permission {
            return Err(AudioError::PermissionDenied);
        }
        if !self.acquired {
            self.acquired = true;
            self.acquire_count += 1;
        }
        Ok(())
    }

    fn read_frequency_data(&mut self, out: &mut [u8]) -> Result<(), AudioError> {
        if !self.acquired {
            return Err(AudioError::StreamFailure {
                reason: "scripted capture read before acquire".to_string(),
            });
        }
        out.fill(0);
        if let Some(snapshot) = self.snapshots.pop_front() {
            for (dst, src) in out.iter_mut().zip(snapshot) {
                *dst = src;
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.acquired {
            self.acquired = false;
            self.release_count += 1;
        }
    }

    fn bin_count(&self) -> usize {
        self.bin_count
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }
}

/// Replays a WAV file through the spectrum analyser
pub struct WavCapture {
    samples: Vec<f32>,
    sample_rate: u32,
    /// Samples consumed per read
    hop: usize,
    cursor: usize,
    analyser: SpectrumAnalyser,
    acquired: bool,
}

impl WavCapture {
    /// Load the first channel of a WAV file
    ///
    /// Each read advances `sample_rate / tick_hz` samples.
    pub fn open<P: AsRef<Path>>(path: P, config: &CaptureConfig) -> Result<Self, AudioError> {
        let (samples, sample_rate) = read_wav(path.as_ref())?;
        let hop = (sample_rate / config.tick_hz.max(1)).max(1) as usize;

        log::info!(
            "[Capture] Loaded {} samples at {} Hz from {:?}",
            samples.len(),
            sample_rate,
            path.as_ref()
        );

        Ok(Self {
            samples,
            sample_rate,
            hop,
            cursor: 0,
            analyser: SpectrumAnalyser::new(config),
            acquired: false,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Audio time covered by one read
    pub fn read_interval_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.hop as f64 * 1000.0 / f64::from(self.sample_rate)
    }

    /// Number of reads needed to consume the whole file
    pub fn tick_count(&self) -> usize {
        self.samples.len().div_ceil(self.hop)
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.samples.len()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / u64::from(self.sample_rate)
    }
}

impl CaptureDevice for WavCapture {
    fn acquire(&mut self) -> Result<(), AudioError> {
        if !self.acquired {
            self.acquired = true;
            self.cursor = 0;
            self.analyser.reset();
        }
        Ok(())
    }

    fn read_frequency_data(&mut self, out: &mut [u8]) -> Result<(), AudioError> {
        if !self.acquired {
            return Err(AudioError::StreamFailure {
                reason: "wav capture read before acquire".to_string(),
            });
        }
        self.cursor = (self.cursor + self.hop).min(self.samples.len());
        self.analyser.analyse(&self.samples[..self.cursor], out);
        Ok(())
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }
}

fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| AudioError::StreamOpenFailed {
        reason: format!("failed to open {}: {err}", path.display()),
    })?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels);
    if channels == 0 {
        return Err(AudioError::StreamOpenFailed {
            reason: format!("{} has zero channels", path.display()),
        });
    }

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!(
                        "unsupported bits_per_sample={} for {}",
                        spec.bits_per_sample,
                        path.display()
                    ),
                });
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|v| v as f32 / scale))
                .collect::<Result<Vec<f32>, _>>()?
        }
    };

    let samples = interleaved.into_iter().step_by(channels).collect();
    Ok((samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Frame;

    #[test]
    fn test_scripted_replays_then_silence() {
        let mut capture = ScriptedCapture::from_levels(4, &[1.0, 0.5]);
        capture.acquire().unwrap();

        let mut out = [0u8; 4];
        capture.read_frequency_data(&mut out).unwrap();
        assert_eq!(out, [255; 4]);
        capture.read_frequency_data(&mut out).unwrap();
        assert_eq!(out, [128; 4]);
        capture.read_frequency_data(&mut out).unwrap();
        assert_eq!(out, [0; 4]);
        assert_eq!(capture.remaining(), 0);
    }

    #[test]
    fn test_scripted_denied_permission() {
        let mut capture = ScriptedCapture::new(4).deny_permission();
        assert_eq!(capture.acquire(), Err(AudioError::PermissionDenied));
        assert!(!capture.is_acquired());
        assert_eq!(capture.acquire_count(), 0);
    }

    #[test]
    fn test_scripted_release_idempotent() {
        let mut capture = ScriptedCapture::new(4);
        capture.release();
        assert_eq!(capture.release_count(), 0);

        capture.acquire().unwrap();
        capture.acquire().unwrap();
        assert_eq!(capture.acquire_count(), 1);

        capture.release();
        capture.release();
        assert_eq!(capture.release_count(), 1);
    }

    #[test]
    fn test_scripted_read_requires_acquire() {
        let mut capture = ScriptedCapture::from_levels(4, &[1.0]);
        let mut out = [0u8; 4];
        assert!(capture.read_frequency_data(&mut out).is_err());
    }

    #[test]
    fn test_ambient_noise_reproducible() {
        let a = ScriptedCapture::ambient_noise(8, 10, 20, 7);
        let b = ScriptedCapture::ambient_noise(8, 10, 20, 7);
        assert_eq!(a.snapshots, b.snapshots);
        assert!(a.snapshots.iter().flatten().all(|&v| v <= 20));
    }

    fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in samples {
            writer
                .write_sample((sample * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_wav_capture_silence_then_noise() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burst.wav");
        let sample_rate = 16_000;
        let mut rng = StdRng::seed_from_u64(3);
        let mut samples = vec![0.0_f32; sample_rate as usize / 2];
        samples.extend((0..sample_rate as usize / 2).map(|_| rng.gen_range(-0.5..0.5)));
        write_wav(&path, &samples, sample_rate);

        let config = CaptureConfig::default();
        let mut capture = WavCapture::open(&path, &config).unwrap();
        assert_eq!(capture.sample_rate(), 16_000);
        assert_eq!(capture.duration_ms(), 1000);
        // 266 samples per read
        assert_eq!(capture.tick_count(), 61);
        assert!((capture.read_interval_ms() - 16.625).abs() < 1e-9);

        capture.acquire().unwrap();
        let mut out = vec![0u8; capture.bin_count()];
        let mut levels = Vec::new();
        while !capture.is_finished() {
            capture.read_frequency_data(&mut out).unwrap();
            levels.push(Frame::from_bytes(&out, 0).unwrap().level);
        }

        assert_eq!(levels.len(), 61);
        assert_eq!(levels[10], 0.0);
        assert!(levels[50] > 0.5, "noise level {}", levels[50]);
    }

    #[test]
    fn test_wav_capture_missing_file() {
        let result = WavCapture::open("/nonexistent/file.wav", &CaptureConfig::default());
        assert!(matches!(result, Err(AudioError::StreamOpenFailed { .. })));
    }
}
