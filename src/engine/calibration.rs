//! CalibrationSession: records repetitions of the target sound from a capture
//! device and builds a profile from them.

use serde::Serialize;
use tokio::sync::watch;

use crate::analysis::Frame;
use crate::audio::CaptureDevice;
use crate::calibration::{CalibrationRecorder, RecorderState, SoundProfile, SoundSample};
use crate::engine::microphone::{MicrophoneArbiter, MicrophoneLease};
use crate::engine::ticker::{StopHandle, TickSource};
use crate::error::{log_audio_error, AudioError, CalibrationError};

const OWNER: &str = "calibration";

/// Observable calibration state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationStatus {
    pub state: RecorderState,
    pub samples: Vec<SoundSample>,
    pub current_level: f32,
}

impl Default for CalibrationStatus {
    fn default() -> Self {
        Self {
            state: RecorderState::Idle,
            samples: Vec::new(),
            current_level: 0.0,
        }
    }
}

pub struct CalibrationSession<C: CaptureDevice> {
    capture: C,
    recorder: CalibrationRecorder,
    snapshot: Vec<u8>,
    current_level: f32,
    status_tx: watch::Sender<CalibrationStatus>,
    arbiter: Option<MicrophoneArbiter>,
    lease: Option<MicrophoneLease>,
    stop_handle: StopHandle,
}

impl<C: CaptureDevice> CalibrationSession<C> {
    pub fn new(capture: C) -> Self {
        let (status_tx, _) = watch::channel(CalibrationStatus::default());
        let bins = capture.bin_count();
        Self {
            capture,
            recorder: CalibrationRecorder::new(),
            snapshot: vec![0; bins],
            current_level: 0.0,
            status_tx,
            arbiter: None,
            lease: None,
            stop_handle: StopHandle::new(),
        }
    }

    pub fn with_arbiter(mut self, arbiter: MicrophoneArbiter) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    /// Acquire the device and start a fresh run
    ///
    /// Previously recorded samples are discarded. No-op while active.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.is_active() {
            return Ok(());
        }

        let lease = match &self.arbiter {
            Some(arbiter) => Some(arbiter.try_acquire(OWNER)?),
            None => None,
        };

        if let Err(err) = self.capture.acquire() {
            log_audio_error(&err, "CalibrationSession::start");
            return Err(err);
        }

        self.lease = lease;
        if self.stop_handle.is_stop_requested() {
            log::info!("[Calibration] Stop requested while acquiring, releasing device");
            self.stop();
            return Ok(());
        }

        self.snapshot.resize(self.capture.bin_count(), 0);
        self.recorder.start();
        self.current_level = 0.0;
        self.publish();
        log::info!("[Calibration] Started, keep quiet while the baseline settles");
        Ok(())
    }

    /// Release the device; recorded samples are kept. Idempotent.
    ///
    /// Consumes any pending stop request.
    pub fn stop(&mut self) {
        if !self.is_active() && self.lease.is_none() && !self.capture.is_acquired() {
            return;
        }

        self.capture.release();
        self.lease = None;
        self.stop_handle.clear();
        self.recorder.stop();
        self.current_level = 0.0;
        self.publish();
        log::info!(
            "[Calibration] Stopped with {} samples",
            self.recorder.samples().len()
        );
    }

    /// Process one tick
    ///
    /// # Returns
    /// The sample completed on this tick, if any
    pub fn tick(&mut self, now_ms: u64) -> Option<SoundSample> {
        if !self.is_active() {
            return None;
        }
        if self.stop_handle.is_stop_requested() {
            self.stop();
            return None;
        }

        if let Err(err) = self.capture.read_frequency_data(&mut self.snapshot) {
            tracing::warn!(error = %err, "[Calibration] Snapshot read failed");
            return None;
        }
        let frame = Frame::from_bytes(&self.snapshot, now_ms)?;
        self.current_level = frame.level;

        let sample = self.recorder.process(frame);
        self.publish();

        if let Some(sample) = &sample {
            tracing::debug!(
                timestamp_ms = now_ms,
                peak = sample.peak_level,
                duration_ms = sample.duration_ms,
                "[Calibration] Sample captured"
            );
        }
        sample
    }

    /// Record until `target_samples` samples exist, the tick source ends or a
    /// stop is requested
    ///
    /// # Returns
    /// Number of samples recorded
    pub fn run<T: TickSource>(
        &mut self,
        ticker: &mut T,
        target_samples: usize,
    ) -> Result<usize, AudioError> {
        self.start()?;

        while self.is_active() && self.recorder.samples().len() < target_samples {
            let Some(now_ms) = ticker.next_tick() else {
                break;
            };
            self.tick(now_ms);
        }

        self.stop();
        Ok(self.recorder.samples().len())
    }

    /// Average the recorded samples into a profile
    ///
    /// # Returns
    /// `None` when nothing has been recorded
    pub fn build_profile(&self) -> Option<SoundProfile> {
        self.try_build_profile().ok()
    }

    /// Like `build_profile`, reporting why no profile could be built
    pub fn try_build_profile(&self) -> Result<SoundProfile, CalibrationError> {
        let profile = SoundProfile::from_samples(self.recorder.samples())?;
        log::info!(
            "[Calibration] Profile built from {} samples, min trigger level {:.3}",
            profile.sample_count,
            profile.min_trigger_level
        );
        Ok(profile)
    }

    /// Drop recorded samples without changing state
    pub fn clear_samples(&mut self) {
        self.recorder.clear_samples();
        self.publish();
    }

    pub fn samples(&self) -> &[SoundSample] {
        self.recorder.samples()
    }

    pub fn state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn is_active(&self) -> bool {
        self.recorder.state() != RecorderState::Idle
    }

    pub fn status(&self) -> CalibrationStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CalibrationStatus> {
        self.status_tx.subscribe()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    fn publish(&self) {
        let state = self.recorder.state();
        let level = self.current_level;
        let samples = self.recorder.samples();
        self.status_tx.send_if_modified(|status| {
            let mut changed = false;
            if status.state != state {
                status.state = state;
                changed = true;
            }
            if status.current_level != level {
                status.current_level = level;
                changed = true;
            }
            // Samples only change on capture, start and clear
            if status.samples.as_slice() != samples {
                status.samples = samples.to_vec();
                changed = true;
            }
            changed
        });
    }
}

impl<C: CaptureDevice> Drop for CalibrationSession<C> {
    fn drop(&mut self) {
        self.stop();
    }
}
