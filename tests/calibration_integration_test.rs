//! Integration tests for the calibration workflow
//!
//! These tests drive a CalibrationSession from scripted snapshots, build a
//! profile and hand it to a DetectionSession sharing the same microphone
//! arbiter:
//! - Baseline settling and sample capture
//! - Profile shape and persistence
//! - Trained detection accepting the calibrated sound and rejecting others

use std::cell::Cell;
use std::rc::Rc;

use sound_trigger::audio::ScriptedCapture;
use sound_trigger::calibration::recorder::BASELINE_FRAMES;
use sound_trigger::calibration::RecorderState;
use sound_trigger::engine::{FixedStepTicker, MicrophoneArbiter};
use sound_trigger::{
    CalibrationSession, DetectionOptions, DetectionSession, SoundProfile,
};

const BINS: usize = 8;

/// Low-frequency heavy snapshot
const KNOCK: [u8; BINS] = [255, 230, 180, 120, 60, 30, 10, 0];

/// High-frequency heavy snapshot
const CLAP: [u8; BINS] = [0, 0, 0, 0, 30, 120, 255, 255];

fn scaled(shape: &[u8; BINS], scale: f32) -> Vec<u8> {
    shape
        .iter()
        .map(|&b| (f32::from(b) * scale).round() as u8)
        .collect()
}

fn push_event(capture: &mut ScriptedCapture, shape: &[u8; BINS], scales: &[f32]) {
    for &scale in scales {
        capture.push_snapshot(scaled(shape, scale));
    }
}

fn push_silence(capture: &mut ScriptedCapture, frames: usize) {
    for _ in 0..frames {
        capture.push_snapshot(vec![0; BINS]);
    }
}

/// Quiet room followed by `knocks` well separated knocks
fn calibration_script(knocks: usize) -> ScriptedCapture {
    let mut capture = ScriptedCapture::ambient_noise(BINS, BASELINE_FRAMES, 10, 42);
    for _ in 0..knocks {
        push_event(&mut capture, &KNOCK, &[0.7, 1.0, 0.8, 0.4]);
        push_silence(&mut capture, 6);
    }
    capture
}

fn calibrate(knocks: usize) -> SoundProfile {
    let mut session = CalibrationSession::new(calibration_script(knocks));
    let mut ticker = FixedStepTicker::new(16.0).with_limit(2000);
    let recorded = session.run(&mut ticker, knocks).unwrap();
    assert_eq!(recorded, knocks);
    session.build_profile().expect("profile from recorded knocks")
}

#[test]
fn test_calibration_builds_knock_profile() {
    let profile = calibrate(5);

    assert_eq!(profile.sample_count, 5);
    let full_level = KNOCK.iter().map(|&b| f32::from(b)).sum::<f32>() / (BINS as f32 * 255.0);
    assert!(
        (profile.peak_level - full_level).abs() < 0.01,
        "peak {} vs {}",
        profile.peak_level,
        full_level
    );
    assert!((profile.min_trigger_level - 0.6 * profile.peak_level).abs() < 1e-6);

    // Signature keeps the knock's shape, loudest in the first bin
    assert_eq!(profile.frequency_signature.len(), BINS);
    assert!((profile.frequency_signature[0] - 1.0).abs() < 1e-6);
    assert!(profile.frequency_signature[7] < 0.01);
    assert!(profile.attack_time_ms > 0.0);
}

#[test]
fn test_calibration_status_progression() {
    let mut session = CalibrationSession::new(calibration_script(1));
    let status_rx = session.subscribe();

    session.start().unwrap();
    assert_eq!(status_rx.borrow().state, RecorderState::Listening);

    let mut now = 0;
    let mut saw_recording = false;
    while session.samples().is_empty() && now < 2000 {
        session.tick(now);
        saw_recording |= session.state() == RecorderState::Recording;
        now += 16;
    }

    assert!(saw_recording);
    assert_eq!(status_rx.borrow().samples.len(), 1);
    assert_eq!(status_rx.borrow().state, RecorderState::Listening);

    session.stop();
    assert_eq!(status_rx.borrow().state, RecorderState::Idle);
    assert_eq!(status_rx.borrow().current_level, 0.0);
}

#[test]
fn test_profile_survives_json() {
    let profile = calibrate(3);
    let json = serde_json::to_string(&profile).unwrap();
    let restored: SoundProfile = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, profile);
    assert!(restored.is_trained());
}

#[test]
fn test_calibrated_profile_drives_detection() {
    let arbiter = MicrophoneArbiter::new();

    let mut calibration =
        CalibrationSession::new(calibration_script(3)).with_arbiter(arbiter.clone());
    let mut ticker = FixedStepTicker::new(16.0).with_limit(2000);
    calibration.run(&mut ticker, 3).unwrap();
    let profile = calibration.build_profile().unwrap();
    assert!(arbiter.is_free());

    let mut capture = ScriptedCapture::ambient_noise(BINS, 10, 10, 7);
    push_event(&mut capture, &KNOCK, &[0.5, 0.7, 0.5, 0.2]);
    push_silence(&mut capture, 10);
    push_event(&mut capture, &CLAP, &[0.7, 1.0, 0.7, 0.3]);
    push_silence(&mut capture, 10);
    let frames = capture.remaining() as u64;

    let fired = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&fired);
    let options = DetectionOptions {
        cooldown_ms: 200,
        ..DetectionOptions::default()
    }
    .with_profile(profile);

    let mut detection = DetectionSession::new(capture, options)
        .with_arbiter(arbiter.clone())
        .on_trigger(move || counter.set(counter.get() + 1));

    let mut ticker = FixedStepTicker::new(16.0).with_limit(frames);
    let summary = detection.run(&mut ticker).unwrap();

    // Only the knock fires: 10 quiet frames, then the 0.7 frame
    assert_eq!(summary.trigger_times_ms, vec![11 * 16]);
    assert_eq!(fired.get(), 1);
    assert!(arbiter.is_free());
}

#[test]
fn test_calibration_stops_on_request() {
    let mut session = CalibrationSession::new(calibration_script(5));
    let handle = session.stop_handle();

    session.start().unwrap();
    for now in 0..10u64 {
        session.tick(now * 16);
    }
    handle.request_stop();
    assert!(session.tick(160).is_none());
    assert_eq!(session.state(), RecorderState::Idle);
    assert_eq!(session.capture().release_count(), 1);
}
