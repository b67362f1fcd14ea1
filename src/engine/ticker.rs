//! Tick sources and cooperative cancellation for session loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::CaptureConfig;

/// Source of periodic ticks carrying a monotonic timestamp in milliseconds.
///
/// `None` ends the loop that drives it.
pub trait TickSource {
    fn next_tick(&mut self) -> Option<u64>;
}

/// Real-time ticker that sleeps between ticks
///
/// Timestamps are milliseconds since the ticker was created. A late tick
/// does not cause a burst of catch-up ticks.
#[derive(Debug)]
pub struct IntervalTicker {
    started: Instant,
    interval: Duration,
    next_deadline: Instant,
    timeout: Option<Duration>,
}

impl IntervalTicker {
    pub fn new(interval: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            interval,
            next_deadline: started,
            timeout: None,
        }
    }

    /// Ticker running at the configured frame rate
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(Duration::from_secs_f64(config.tick_interval_ms() / 1000.0))
    }

    /// Stop ticking once `timeout` has elapsed
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl TickSource for IntervalTicker {
    fn next_tick(&mut self) -> Option<u64> {
        let now = Instant::now();
        if let Some(timeout) = self.timeout {
            if now.duration_since(self.started) >= timeout {
                return None;
            }
        }

        if self.next_deadline > now {
            std::thread::sleep(self.next_deadline - now);
        }
        self.next_deadline = (self.next_deadline + self.interval).max(Instant::now());

        Some(self.started.elapsed().as_millis() as u64)
    }
}

/// Deterministic ticker that never sleeps
///
/// Tick `i` carries timestamp `start_ms + round(i * interval_ms)`.
#[derive(Debug, Clone)]
pub struct FixedStepTicker {
    interval_ms: f64,
    start_ms: u64,
    index: u64,
    limit: Option<u64>,
}

impl FixedStepTicker {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms: interval_ms.max(0.0),
            start_ms: 0,
            index: 0,
            limit: None,
        }
    }

    pub fn starting_at(mut self, start_ms: u64) -> Self {
        self.start_ms = start_ms;
        self
    }

    /// End after `ticks` ticks
    pub fn with_limit(mut self, ticks: u64) -> Self {
        self.limit = Some(ticks);
        self
    }

    pub fn ticks_emitted(&self) -> u64 {
        self.index
    }
}

impl TickSource for FixedStepTicker {
    fn next_tick(&mut self) -> Option<u64> {
        if self.limit.is_some_and(|limit| self.index >= limit) {
            return None;
        }
        let offset = (self.index as f64 * self.interval_ms).round() as u64;
        self.index += 1;
        Some(self.start_ms + offset)
    }
}

/// Cloneable cancellation flag shared with other threads
///
/// Once a session observes the request it releases the device and no
/// further trigger callbacks run.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}
