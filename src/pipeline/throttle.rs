//! Frame admission gate
//!
//! Limits pipeline runs to one in flight, started no more often than
//! `min_interval`. Frames arriving while the gate is closed are dropped.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Default spacing between admitted frames
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(333);

#[derive(Debug, Default)]
struct GateState {
    busy: bool,
    last_admitted: Option<Instant>,
}

/// Time-based debounce plus an in-flight guard
#[derive(Debug)]
pub struct FrameThrottler {
    min_interval: Duration,
    state: Mutex<GateState>,
}

impl Default for FrameThrottler {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl FrameThrottler {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(GateState::default()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Admit a frame captured at `now`.
    ///
    /// On success the gate is busy until [`release`](Self::release).
    pub fn admit(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        if state.busy {
            return false;
        }
        let interval_ok = state
            .last_admitted
            .map_or(true, |last| now.saturating_duration_since(last) >= self.min_interval);
        if !interval_ok {
            return false;
        }
        state.busy = true;
        state.last_admitted = Some(now);
        true
    }

    /// Mark the in-flight run as finished
    pub fn release(&self) {
        self.state.lock().busy = false;
    }
}
