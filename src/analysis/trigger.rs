// TriggerEngine - per-frame trigger decision with cooldown gating
//
// Combines the similarity score, the transient gate and a cooldown window.
// The engine moves implicitly between three states:
//
//   quiet ──rise──▶ armed-rising ──fire──▶ fired-cooling-down ──▶ quiet
//
// Firing clears the tracked onset so the next event has to rise again.
// The engine only reports the decision; invoking the host callback is the
// caller's job.

use crate::analysis::frame::Frame;
use crate::analysis::similarity;
use crate::analysis::transient::TransientDetector;
use crate::calibration::SoundProfile;

/// Similarity a trained profile must exceed to fire
pub const TRAINED_SIMILARITY_MIN: f32 = 0.5;

/// Level rise required to fire in untrained mode
pub const UNTRAINED_DELTA_MIN: f32 = 0.02;

/// Inputs that can change between frames
#[derive(Debug, Clone, Copy)]
pub struct DetectionParams<'a> {
    /// Calibrated profile; `None` or an untrained profile selects fallback mode
    pub profile: Option<&'a SoundProfile>,
    /// Fallback sensitivity, used only when untrained
    pub threshold: f32,
    /// Minimum time between two firings
    pub cooldown_ms: u64,
}

impl<'a> DetectionParams<'a> {
    fn trained_profile(&self) -> Option<&'a SoundProfile> {
        self.profile.filter(|p| p.is_trained())
    }
}

/// Outcome of processing one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerDecision {
    /// Frame level
    pub level: f32,
    /// Similarity reported for this frame (0 when at or under the floor)
    pub similarity: f32,
    /// Whether the frame sat inside an attack window
    pub is_transient: bool,
    /// Whether the trigger fired on this frame
    pub fired: bool,
}

#[derive(Debug, Default, Clone)]
pub struct TriggerEngine {
    transient: TransientDetector,
    last_trigger_ms: Option<u64>,
}

impl TriggerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one frame and decide whether to fire
    pub fn process(&mut self, frame: &Frame, params: &DetectionParams<'_>) -> TriggerDecision {
        let trained = params.trained_profile();
        let effective_threshold = trained
            .map(|p| p.min_trigger_level)
            .unwrap_or(params.threshold);
        let level = frame.level;
        let now = frame.timestamp_ms;

        if level <= effective_threshold {
            // Still stepped so an onset can decay while quiet
            let step = self.transient.step(level, now, effective_threshold);
            return TriggerDecision {
                level,
                similarity: 0.0,
                is_transient: step.is_transient,
                fired: false,
            };
        }

        let similarity = match trained {
            Some(profile) => similarity::score(level, &frame.frequency_vector, profile),
            None => similarity::score(
                level,
                &frame.frequency_vector,
                &SoundProfile::untrained(params.threshold),
            ),
        };
        let step = self.transient.step(level, now, effective_threshold);

        let should_trigger = if trained.is_some() {
            similarity > TRAINED_SIMILARITY_MIN && step.is_transient
        } else {
            level > params.threshold && step.delta > UNTRAINED_DELTA_MIN
        };

        let fired = should_trigger && self.cooldown_elapsed(now, params.cooldown_ms);
        if fired {
            self.last_trigger_ms = Some(now);
            self.transient.clear_onset();
        }

        TriggerDecision {
            level,
            similarity,
            is_transient: step.is_transient,
            fired,
        }
    }

    fn cooldown_elapsed(&self, now_ms: u64, cooldown_ms: u64) -> bool {
        self.last_trigger_ms
            .map(|last| now_ms.saturating_sub(last) > cooldown_ms)
            .unwrap_or(true)
    }

    pub fn last_trigger_ms(&self) -> Option<u64> {
        self.last_trigger_ms
    }

    /// Zero onset and cooldown state
    pub fn reset(&mut self) {
        self.transient.reset();
        self.last_trigger_ms = None;
    }
}
