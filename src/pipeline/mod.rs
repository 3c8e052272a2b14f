//! Frame Pipeline
//!
//! Wires the throttle gate, the orientation scanner and the result sink into
//! a per-frame pipeline:
//!
//! ```text
//! frame -> FrameThrottler -> OrientationRetryScanner -> ResultSink
//!            (admit/drop)     (OCR x4, address, unit)
//! ```
//!
//! At most one run is in flight. Runs are never cancelled; a run that hangs
//! past `run_timeout` is abandoned and the gate reopened.

pub mod scanner;
pub mod throttle;

#[cfg(test)]
pub(crate) mod testing;

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::capture::frame::CapturedFrame;
use crate::vision::Orientation;

pub use scanner::{OrientationRetryScanner, ScanHit, ScanStrategy};
pub use throttle::FrameThrottler;

/// Default bound on one complete pipeline run
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Final result of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitMatch {
    pub address: String,
    pub unit: String,
    pub orientation: Orientation,
}

impl From<ScanHit> for UnitMatch {
    fn from(hit: ScanHit) -> Self {
        Self {
            address: hit.address,
            unit: hit.unit,
            orientation: hit.orientation,
        }
    }
}

/// Receives at most one result per completed run
pub trait ResultSink: Send + Sync {
    fn emit(&self, result: &UnitMatch);
}

/// Forwards results over a channel to the presentation side
pub struct ChannelSink {
    sender: Sender<UnitMatch>,
}

impl ChannelSink {
    pub fn new(sender: Sender<UnitMatch>) -> Self {
        Self { sender }
    }
}

impl ResultSink for ChannelSink {
    fn emit(&self, result: &UnitMatch) {
        if self.sender.send(result.clone()).is_err() {
            debug!("Result receiver gone, dropping {:?}", result);
        }
    }
}

/// Where the pipeline currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Gate open, waiting for a frame
    #[default]
    Idle,
    /// A frame was accepted
    Admitted,
    /// Iterating orientation candidates
    Scanning,
    /// Address and unit found, result emitted
    Matched,
    /// Every orientation failed
    Exhausted,
}

/// Outcome of offering one frame to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Gate closed; frame not processed
    Dropped,
    Matched(UnitMatch),
    Exhausted,
    TimedOut,
}

/// Counters for frames and runs
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub frames_seen: u64,
    pub frames_dropped: u64,
    pub frames_admitted: u64,
    pub runs_matched: u64,
    pub runs_exhausted: u64,
    pub runs_timed_out: u64,
    pub last_match: Option<UnitMatch>,
}

#[derive(Debug, Default)]
struct Status {
    state: PipelineState,
    stats: PipelineStats,
}

struct Inner {
    throttler: FrameThrottler,
    scanner: OrientationRetryScanner,
    sink: Arc<dyn ResultSink>,
    run_timeout: Duration,
    status: RwLock<Status>,
}

/// Per-frame pipeline driver
#[derive(Clone)]
pub struct PipelineCoordinator {
    inner: Arc<Inner>,
}

impl PipelineCoordinator {
    /// Coordinator whose runs are abandoned after `run_timeout`
    pub fn new(
        throttler: FrameThrottler,
        scanner: OrientationRetryScanner,
        sink: Arc<dyn ResultSink>,
        run_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                throttler,
                scanner,
                sink,
                run_timeout,
                status: RwLock::new(Status::default()),
            }),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.inner.status.read().state
    }

    pub fn stats(&self) -> PipelineStats {
        self.inner.status.read().stats.clone()
    }

    /// Camera callback: admit or drop `frame`, running admitted frames on `runtime`.
    ///
    /// Returns quickly either way; the result arrives through the sink.
    pub fn on_frame(&self, frame: CapturedFrame, runtime: &Handle) -> bool {
        if !self.inner.admit(&frame) {
            return false;
        }

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            inner.run_admitted(frame).await;
        });
        true
    }

    /// Offer `frame` and wait for its run to finish
    pub async fn process(&self, frame: CapturedFrame) -> RunOutcome {
        if !self.inner.admit(&frame) {
            return RunOutcome::Dropped;
        }
        self.inner.run_admitted(frame).await
    }
}

impl Inner {
    fn admit(&self, frame: &CapturedFrame) -> bool {
        let admitted = self.throttler.admit(frame.timestamp);

        let mut status = self.status.write();
        status.stats.frames_seen += 1;
        if admitted {
            status.stats.frames_admitted += 1;
            status.state = PipelineState::Admitted;
        } else {
            status.stats.frames_dropped += 1;
        }
        drop(status);

        if !admitted {
            debug!("Frame dropped by throttle");
        }
        admitted
    }

    async fn run_admitted(&self, frame: CapturedFrame) -> RunOutcome {
        self.set_state(PipelineState::Scanning);

        let outcome = match tokio::time::timeout(self.run_timeout, self.scanner.scan(&frame)).await {
            Ok(Some(hit)) => {
                debug!("Matched reading at {}: {:?}", hit.orientation, hit.text);
                let result = UnitMatch::from(hit);
                info!(
                    "Unit {} at {} (orientation {})",
                    result.unit, result.address, result.orientation
                );
                self.sink.emit(&result);

                let mut status = self.status.write();
                status.state = PipelineState::Matched;
                status.stats.runs_matched += 1;
                status.stats.last_match = Some(result.clone());
                RunOutcome::Matched(result)
            }
            Ok(None) => {
                let mut status = self.status.write();
                status.state = PipelineState::Exhausted;
                status.stats.runs_exhausted += 1;
                RunOutcome::Exhausted
            }
            Err(_) => {
                warn!("Pipeline run exceeded {:?}, releasing gate", self.run_timeout);
                let mut status = self.status.write();
                status.state = PipelineState::Exhausted;
                status.stats.runs_timed_out += 1;
                RunOutcome::TimedOut
            }
        };

        self.throttler.release();
        self.set_state(PipelineState::Idle);
        outcome
    }

    fn set_state(&self, state: PipelineState) {
        self.status.write().state = state;
    }
}
