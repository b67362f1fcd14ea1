// TransientDetector - attack window gate
//
// Tracks the previous level and the timestamp of the last rapid rise. A frame
// only counts as transient while it sits within ATTACK_WINDOW_MS of a rise,
// so sustained loud noise cannot keep qualifying.

/// Minimum level rise between consecutive frames that marks an onset
pub const ONSET_DELTA: f32 = 0.05;

/// How long after an onset a frame still counts as transient
pub const ATTACK_WINDOW_MS: u64 = 200;

/// Fraction of the effective threshold below which a tracked onset decays
pub const ONSET_DECAY_RATIO: f32 = 0.5;

/// Result of one transient step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransientStep {
    /// Level change relative to the previous frame
    pub delta: f32,
    /// Whether the frame lies inside an attack window
    pub is_transient: bool,
}

#[derive(Debug, Default, Clone)]
pub struct TransientDetector {
    previous_level: f32,
    onset_ms: Option<u64>,
}

impl TransientDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the detector by one frame
    ///
    /// # Arguments
    /// * `level` - Current frame level
    /// * `now_ms` - Current frame timestamp
    /// * `effective_threshold` - Detection floor in use for this frame
    pub fn step(&mut self, level: f32, now_ms: u64, effective_threshold: f32) -> TransientStep {
        let delta = level - self.previous_level;

        if delta > ONSET_DELTA && self.onset_ms.is_none() {
            self.onset_ms = Some(now_ms);
        }

        let is_transient = self
            .onset_ms
            .map(|onset| now_ms.saturating_sub(onset) < ATTACK_WINDOW_MS)
            .unwrap_or(false);

        if level < effective_threshold * ONSET_DECAY_RATIO {
            self.onset_ms = None;
        }

        self.previous_level = level;

        TransientStep {
            delta,
            is_transient,
        }
    }

    /// Forget the tracked onset so the next rise has to re-arm the gate
    pub fn clear_onset(&mut self) {
        self.onset_ms = None;
    }

    /// Reset internal state (e.g. when a session stops)
    pub fn reset(&mut self) {
        self.previous_level = 0.0;
        self.onset_ms = None;
    }

    pub fn onset_ms(&self) -> Option<u64> {
        self.onset_ms
    }

    pub fn previous_level(&self) -> f32 {
        self.previous_level
    }
}
