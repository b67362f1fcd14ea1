//! DetectionSession: listens to a capture device and fires a callback when the
//! target sound occurs.
//!
//! The session owns the capture device for as long as it is listening. Each
//! tick pulls one snapshot, turns it into a frame and runs it through the
//! trigger engine. Every exit path (explicit `stop`, disabling through
//! options, an observed stop request, drop) releases the device and zeroes
//! the observable level and similarity.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::analysis::{DetectionParams, Frame, TriggerDecision, TriggerEngine};
use crate::audio::CaptureDevice;
use crate::calibration::SoundProfile;
use crate::config::DetectionConfig;
use crate::engine::microphone::{MicrophoneArbiter, MicrophoneLease};
use crate::engine::ticker::{StopHandle, TickSource};
use crate::error::{log_audio_error, AudioError};

const OWNER: &str = "detection";

/// Recognised detection options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOptions {
    pub enabled: bool,
    /// Fallback sensitivity (0-1), used while no trained profile is set
    pub threshold: f32,
    pub cooldown_ms: u64,
    #[serde(default)]
    pub sound_profile: Option<SoundProfile>,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

impl DetectionOptions {
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            enabled: config.enabled,
            threshold: config.threshold.clamp(0.0, 1.0),
            cooldown_ms: config.cooldown_ms,
            sound_profile: None,
        }
    }

    pub fn with_profile(mut self, profile: SoundProfile) -> Self {
        self.sound_profile = Some(profile);
        self
    }
}

/// Observable detector state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DetectorStatus {
    pub is_listening: bool,
    /// `None` until acquisition has been attempted
    pub has_permission: Option<bool>,
    pub audio_level: f32,
    pub similarity: f32,
}

/// Result of a completed `run`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub frames: u64,
    /// Tick timestamps at which the trigger fired
    pub trigger_times_ms: Vec<u64>,
}

pub struct DetectionSession<C: CaptureDevice> {
    capture: C,
    options: DetectionOptions,
    engine: TriggerEngine,
    on_trigger: Option<Box<dyn FnMut()>>,
    snapshot: Vec<u8>,
    status_tx: watch::Sender<DetectorStatus>,
    arbiter: Option<MicrophoneArbiter>,
    lease: Option<MicrophoneLease>,
    stop_handle: StopHandle,
}

impl<C: CaptureDevice> DetectionSession<C> {
    pub fn new(capture: C, options: DetectionOptions) -> Self {
        let (status_tx, _) = watch::channel(DetectorStatus::default());
        let bins = capture.bin_count();
        Self {
            capture,
            options,
            engine: TriggerEngine::new(),
            on_trigger: None,
            snapshot: vec![0; bins],
            status_tx,
            arbiter: None,
            lease: None,
            stop_handle: StopHandle::new(),
        }
    }

    /// Share microphone ownership with other sessions
    pub fn with_arbiter(mut self, arbiter: MicrophoneArbiter) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    /// Zero-argument callback run on every firing
    pub fn on_trigger<F: FnMut() + 'static>(mut self, callback: F) -> Self {
        self.on_trigger = Some(Box::new(callback));
        self
    }

    pub fn set_on_trigger<F: FnMut() + 'static>(&mut self, callback: F) {
        self.on_trigger = Some(Box::new(callback));
    }

    /// Acquire the device and begin listening
    ///
    /// No-op while already listening or while disabled. A denied permission
    /// is reported through `has_permission` and is not retried.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.is_listening() {
            return Ok(());
        }
        if !self.options.enabled {
            log::debug!("[Detection] Start ignored, detection disabled");
            return Ok(());
        }

        let lease = match &self.arbiter {
            Some(arbiter) => Some(arbiter.try_acquire(OWNER)?),
            None => None,
        };

        if let Err(err) = self.capture.acquire() {
            log_audio_error(&err, "DetectionSession::start");
            if err == AudioError::PermissionDenied {
                self.status_tx.send_modify(|status| {
                    status.has_permission = Some(false);
                    status.is_listening = false;
                });
            }
            return Err(err);
        }

        self.lease = lease;
        if self.stop_handle.is_stop_requested() {
            log::info!("[Detection] Stop requested while acquiring, releasing device");
            self.stop();
            return Ok(());
        }

        self.engine.reset();
        self.snapshot.resize(self.capture.bin_count(), 0);
        self.status_tx.send_modify(|status| {
            status.has_permission = Some(true);
            status.is_listening = true;
        });

        log::info!(
            "[Detection] Listening ({}, cooldown {}ms)",
            if self.has_trained_profile() {
                "trained profile"
            } else {
                "level threshold"
            },
            self.options.cooldown_ms
        );
        Ok(())
    }

    /// Release the device and zero transient state. Idempotent.
    ///
    /// A pending stop request is consumed here, so a request made while idle
    /// still cancels the next `start`.
    pub fn stop(&mut self) {
        if !self.is_listening() && self.lease.is_none() && !self.capture.is_acquired() {
            return;
        }

        self.capture.release();
        self.lease = None;
        self.stop_handle.clear();
        self.engine.reset();
        self.status_tx.send_modify(|status| {
            status.is_listening = false;
            status.audio_level = 0.0;
            status.similarity = 0.0;
        });
        log::info!("[Detection] Stopped");
    }

    /// Process one tick
    ///
    /// # Returns
    /// The decision for this tick, or `None` when not listening or when the
    /// device produced no usable snapshot
    pub fn tick(&mut self, now_ms: u64) -> Option<TriggerDecision> {
        if !self.is_listening() {
            return None;
        }
        if self.stop_handle.is_stop_requested() {
            self.stop();
            return None;
        }

        if let Err(err) = self.capture.read_frequency_data(&mut self.snapshot) {
            tracing::warn!(error = %err, "[Detection] Snapshot read failed");
            return None;
        }
        let frame = Frame::from_bytes(&self.snapshot, now_ms)?;

        let params = DetectionParams {
            profile: self.options.sound_profile.as_ref(),
            threshold: self.options.threshold,
            cooldown_ms: self.options.cooldown_ms,
        };
        let decision = self.engine.process(&frame, &params);

        self.status_tx.send_modify(|status| {
            status.audio_level = decision.level;
            status.similarity = decision.similarity;
        });

        if decision.fired {
            tracing::debug!(
                timestamp_ms = now_ms,
                level = decision.level,
                similarity = decision.similarity,
                "[Detection] Trigger fired"
            );
            // A stop requested while this frame was processed suppresses the callback
            if !self.stop_handle.is_stop_requested() {
                if let Some(callback) = self.on_trigger.as_mut() {
                    callback();
                }
            }
        }

        Some(decision)
    }

    /// Listen until the tick source ends or a stop is requested
    pub fn run<T: TickSource>(&mut self, ticker: &mut T) -> Result<DetectionSummary, AudioError> {
        self.start()?;
        let mut summary = DetectionSummary::default();

        while self.is_listening() {
            let Some(now_ms) = ticker.next_tick() else {
                break;
            };
            if let Some(decision) = self.tick(now_ms) {
                summary.frames += 1;
                if decision.fired {
                    summary.trigger_times_ms.push(now_ms);
                }
            }
        }

        self.stop();
        tracing::info!(
            frames = summary.frames,
            triggers = summary.trigger_times_ms.len(),
            "[Detection] Run finished"
        );
        Ok(summary)
    }

    /// Replace options; disabling stops the session
    pub fn set_options(&mut self, options: DetectionOptions) {
        let enabled = options.enabled;
        self.options = DetectionOptions {
            threshold: options.threshold.clamp(0.0, 1.0),
            ..options
        };
        if !enabled {
            self.stop();
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.options.enabled = enabled;
        if !enabled {
            self.stop();
        }
    }

    pub fn set_sound_profile(&mut self, profile: Option<SoundProfile>) {
        self.options.sound_profile = profile;
    }

    pub fn options(&self) -> &DetectionOptions {
        &self.options
    }

    pub fn status(&self) -> DetectorStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetectorStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.status_tx.borrow().is_listening
    }

    /// Handle for requesting a stop from another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    pub fn last_trigger_ms(&self) -> Option<u64> {
        self.engine.last_trigger_ms()
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut C {
        &mut self.capture
    }

    fn has_trained_profile(&self) -> bool {
        self.options
            .sound_profile
            .as_ref()
            .is_some_and(SoundProfile::is_trained)
    }
}

impl<C: CaptureDevice> Drop for DetectionSession<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ScriptedCapture;
    use crate::engine::ticker::FixedStepTicker;
    use std::cell::Cell;
    use std::rc::Rc;

    fn untrained_options(threshold: f32, cooldown_ms: u64) -> DetectionOptions {
        DetectionOptions {
            enabled: true,
            threshold,
            cooldown_ms,
            sound_profile: None,
        }
    }

    fn counting_session(
        capture: ScriptedCapture,
        options: DetectionOptions,
    ) -> (DetectionSession<ScriptedCapture>, Rc<Cell<u32>>) {
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let session = DetectionSession::new(capture, options)
            .on_trigger(move || counter.set(counter.get() + 1));
        (session, fired)
    }

    #[test]
    fn test_start_reports_permission() {
        let mut session = DetectionSession::new(ScriptedCapture::new(8), DetectionOptions::default());
        assert_eq!(session.status().has_permission, None);

        session.start().unwrap();
        let status = session.status();
        assert!(status.is_listening);
        assert_eq!(status.has_permission, Some(true));
    }

    #[test]
    fn test_denied_permission_is_terminal() {
        let capture = ScriptedCapture::new(8).deny_permission();
        let mut session = DetectionSession::new(capture, DetectionOptions::default());

        assert_eq!(session.start(), Err(AudioError::PermissionDenied));
        let status = session.status();
        assert!(!status.is_listening);
        assert_eq!(status.has_permission, Some(false));
        assert!(session.tick(0).is_none());
    }

    #[test]
    fn test_start_twice_acquires_once() {
        let mut session = DetectionSession::new(ScriptedCapture::new(8), DetectionOptions::default());
        session.start().unwrap();
        session.start().unwrap();
        assert_eq!(session.capture().acquire_count(), 1);
    }

    #[test]
    fn test_stop_idempotent_and_zeroes_state() {
        let capture = ScriptedCapture::from_levels(8, &[0.0, 0.6]);
        let mut session = DetectionSession::new(capture, untrained_options(0.3, 1000));
        session.start().unwrap();
        session.tick(0);
        session.tick(16);
        assert!(session.status().audio_level > 0.5);

        session.stop();
        session.stop();
        let status = session.status();
        assert!(!status.is_listening);
        assert_eq!(status.audio_level, 0.0);
        assert_eq!(status.similarity, 0.0);
        assert_eq!(session.capture().release_count(), 1);
    }

    #[test]
    fn test_disabled_session_does_not_start() {
        let options = DetectionOptions {
            enabled: false,
            ..DetectionOptions::default()
        };
        let mut session = DetectionSession::new(ScriptedCapture::new(8), options);
        session.start().unwrap();
        assert!(!session.is_listening());
        assert_eq!(session.capture().acquire_count(), 0);
    }

    #[test]
    fn test_disabling_stops_listening() {
        let mut session = DetectionSession::new(ScriptedCapture::new(8), DetectionOptions::default());
        session.start().unwrap();
        session.set_enabled(false);
        assert!(!session.is_listening());
        assert_eq!(session.capture().release_count(), 1);
    }

    #[test]
    fn test_untrained_fires_callback() {
        let capture = ScriptedCapture::from_levels(8, &[0.1, 0.1, 0.6, 0.6, 0.1]);
        let (mut session, fired) = counting_session(capture, untrained_options(0.3, 1000));

        let mut ticker = FixedStepTicker::new(16.0).with_limit(5);
        let summary = session.run(&mut ticker).unwrap();

        assert_eq!(fired.get(), 1);
        assert_eq!(summary.frames, 5);
        assert_eq!(summary.trigger_times_ms, vec![32]);
        assert!(!session.is_listening());
    }

    #[test]
    fn test_stop_request_suppresses_callbacks() {
        let capture = ScriptedCapture::from_levels(8, &[0.1, 0.6]);
        let (mut session, fired) = counting_session(capture, untrained_options(0.3, 0));
        session.start().unwrap();
        session.tick(0);

        session.stop_handle().request_stop();
        assert!(session.tick(16).is_none());
        assert_eq!(fired.get(), 0);
        assert!(!session.is_listening());
        assert_eq!(session.capture().release_count(), 1);
    }

    #[test]
    fn test_watch_subscription_sees_updates() {
        let capture = ScriptedCapture::from_levels(8, &[0.5]);
        let mut session = DetectionSession::new(capture, untrained_options(0.3, 1000));
        let mut rx = session.subscribe();

        session.start().unwrap();
        session.tick(0);
        assert!(rx.has_changed().unwrap());
        let status = *rx.borrow_and_update();
        assert!(status.is_listening);
        assert!((status.audio_level - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_arbiter_blocks_second_session() {
        let arbiter = MicrophoneArbiter::new();
        let mut first = DetectionSession::new(ScriptedCapture::new(8), DetectionOptions::default())
            .with_arbiter(arbiter.clone());
        let mut second = DetectionSession::new(ScriptedCapture::new(8), DetectionOptions::default())
            .with_arbiter(arbiter.clone());

        first.start().unwrap();
        assert!(matches!(second.start(), Err(AudioError::DeviceBusy { .. })));
        assert_eq!(second.capture().acquire_count(), 0);

        first.stop();
        assert!(second.start().is_ok());
    }

    #[test]
    fn test_drop_releases_microphone() {
        let arbiter = MicrophoneArbiter::new();
        {
            let mut session =
                DetectionSession::new(ScriptedCapture::new(8), DetectionOptions::default())
                    .with_arbiter(arbiter.clone());
            session.start().unwrap();
            assert!(!arbiter.is_free());
        }
        assert!(arbiter.is_free());
    }
}
