// CalibrationRecorder - records instances of the target sound
//
// State machine:
//
//   Idle ──start──▶ Listening ──level > threshold──▶ Recording
//                      ▲                                │
//                      └────── Processing ◀── decayed / capped
//
// Listening first averages BASELINE_FRAMES frames of ambient level to set a
// dynamic threshold. Recording buffers frames until the event decays or the
// buffer hits its cap, then the buffer is segmented into a SoundSample.
// Processing is entered and left inside the same step.

use serde::{Deserialize, Serialize};

use crate::analysis::Frame;
use crate::calibration::profile::SoundSample;
use crate::calibration::segment;

/// Ambient frames averaged before detection is armed
pub const BASELINE_FRAMES: usize = 30;

/// Lowest dynamic threshold regardless of how quiet the room is
pub const MIN_THRESHOLD: f32 = 0.15;

/// Dynamic threshold as a multiple of the ambient baseline
pub const BASELINE_MULTIPLIER: f32 = 2.0;

/// Recording stops once the buffer holds more than this many frames (~1s at 60Hz)
pub const MAX_RECORDING_FRAMES: usize = 60;

/// Number of trailing frames averaged for the decay check
pub const DECAY_WINDOW: usize = 5;

/// Fraction of the threshold the trailing mean must drop below to end a recording
pub const DECAY_RATIO: f32 = 0.5;

/// Observable recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Listening,
    Recording,
    Processing,
}

impl RecorderState {
    pub fn display_name(&self) -> &'static str {
        match self {
            RecorderState::Idle => "idle",
            RecorderState::Listening => "listening",
            RecorderState::Recording => "recording",
            RecorderState::Processing => "processing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationRecorder {
    state: RecorderState,
    baseline_sum: f32,
    baseline_frames: usize,
    threshold: f32,
    buffer: Vec<Frame>,
    samples: Vec<SoundSample>,
}

impl Default for CalibrationRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationRecorder {
    pub fn new() -> Self {
        Self {
            state: RecorderState::Idle,
            baseline_sum: 0.0,
            baseline_frames: 0,
            threshold: MIN_THRESHOLD,
            buffer: Vec::with_capacity(MAX_RECORDING_FRAMES + 1),
            samples: Vec::new(),
        }
    }

    /// Begin a fresh calibration run
    ///
    /// Clears recorded samples, the baseline accumulator and the buffer.
    pub fn start(&mut self) {
        self.samples.clear();
        self.reset_baseline();
        self.buffer.clear();
        self.transition(RecorderState::Listening);
    }

    /// Stop listening; recorded samples are kept, a partial recording is dropped
    pub fn stop(&mut self) {
        self.buffer.clear();
        self.transition(RecorderState::Idle);
    }

    /// Feed one frame
    ///
    /// # Returns
    /// The sample completed by this frame, if any
    pub fn process(&mut self, frame: Frame) -> Option<SoundSample> {
        match self.state {
            RecorderState::Idle | RecorderState::Processing => None,
            RecorderState::Listening => {
                if self.baseline_frames < BASELINE_FRAMES {
                    self.accumulate_baseline(frame.level);
                    return None;
                }

                if frame.level > self.threshold {
                    self.buffer.clear();
                    self.buffer.push(frame);
                    self.transition(RecorderState::Recording);
                }
                None
            }
            RecorderState::Recording => {
                self.buffer.push(frame);
                if self.buffer.len() > MAX_RECORDING_FRAMES || self.has_decayed() {
                    self.finish_recording()
                } else {
                    None
                }
            }
        }
    }

    fn accumulate_baseline(&mut self, level: f32) {
        self.baseline_sum += level;
        self.baseline_frames += 1;
        let baseline = self.baseline_sum / self.baseline_frames as f32;
        self.threshold = (BASELINE_MULTIPLIER * baseline).max(MIN_THRESHOLD);

        if self.baseline_frames == BASELINE_FRAMES {
            log::info!(
                "[Calibration] Baseline {:.4} established, threshold {:.4}",
                baseline,
                self.threshold
            );
        }
    }

    fn has_decayed(&self) -> bool {
        let start = self.buffer.len().saturating_sub(DECAY_WINDOW);
        let recent = &self.buffer[start..];
        let mean = recent.iter().map(|f| f.level).sum::<f32>() / recent.len() as f32;
        mean < self.threshold * DECAY_RATIO
    }

    fn finish_recording(&mut self) -> Option<SoundSample> {
        self.transition(RecorderState::Processing);

        let sample = segment::segment(&self.buffer);
        match &sample {
            Some(sample) => {
                log::info!(
                    "[Calibration] Sample {} recorded: peak={:.3}, avg={:.3}, frames={}",
                    self.samples.len() + 1,
                    sample.peak_level,
                    sample.avg_level,
                    self.buffer.len()
                );
                self.samples.push(sample.clone());
            }
            None => {
                log::debug!(
                    "[Calibration] Discarded recording of {} frames",
                    self.buffer.len()
                );
            }
        }
        self.buffer.clear();

        self.transition(RecorderState::Listening);
        sample
    }

    fn transition(&mut self, next: RecorderState) {
        if self.state != next {
            log::debug!(
                "[Calibration] {} -> {}",
                self.state.display_name(),
                next.display_name()
            );
            self.state = next;
        }
    }

    fn reset_baseline(&mut self) {
        self.baseline_sum = 0.0;
        self.baseline_frames = 0;
        self.threshold = MIN_THRESHOLD;
    }

    /// Drop all recorded samples without changing state
    pub fn clear_samples(&mut self) {
        self.samples.clear();
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn samples(&self) -> &[SoundSample] {
        &self.samples
    }

    /// Current dynamic threshold
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Whether the ambient baseline window has been filled
    pub fn is_baseline_ready(&self) -> bool {
        self.baseline_frames >= BASELINE_FRAMES
    }

    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }
}
