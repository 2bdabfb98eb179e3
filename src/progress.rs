//! Progress event types and callback interface.
//!
//! Defines the events emitted by the probe engine while a cycle runs and
//! the callback trait for receiving them. Events are advisory: nothing in
//! the stored results depends on them.

use crate::measurements::BandwidthDirection;
use tokio::sync::mpsc::UnboundedSender;

/// Phases of a probe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Cycle accepted, nothing measured yet
    Initializing,
    /// Timing round trips
    Latency,
    /// Running download trials
    Download,
    /// Running upload trials
    Upload,
    /// Computing estimates and scores
    Scoring,
    /// Result stored
    Complete,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Initializing => "Initializing",
            Phase::Latency => "Latency",
            Phase::Download => "Download",
            Phase::Upload => "Upload",
            Phase::Scoring => "Scoring",
            Phase::Complete => "Complete",
        }
    }
}

/// Percent-complete reported at each step of a cycle.
pub mod percent {
    pub const INITIALIZING: u8 = 0;
    pub const LATENCY_START: u8 = 10;
    pub const LATENCY_STEP: u8 = 2;
    pub const DOWNLOAD_START: u8 = 30;
    pub const DOWNLOAD_STEP: u8 = 15;
    pub const UPLOAD_START: u8 = 70;
    pub const UPLOAD_STEP: u8 = 10;
    pub const COMPLETE: u8 = 100;

    /// Percent for step `index` (0-based) of a phase, never past 99
    /// until the cycle is complete.
    pub fn at(start: u8, step: u8, index: usize) -> u8 {
        let value = start as usize + step as usize * index;
        value.min(COMPLETE as usize - 1) as u8
    }
}

/// Events emitted during a probe cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Coarse progress for a progress bar
    Progress {
        phase: Phase,
        /// 0-100
        percent: u8,
        message: String,
    },
    /// One latency sample taken
    LatencySample {
        /// Round trip in milliseconds
        value_ms: f64,
        /// Current sample number (1-indexed)
        current: usize,
        /// Total number of samples
        total: usize,
        /// Whether the value was substituted after a failure
        fallback: bool,
    },
    /// One throughput trial finished
    ThroughputTrial {
        direction: BandwidthDirection,
        /// Trial speed in Mbps
        speed_mbps: f64,
        /// Current trial number (1-indexed)
        current: usize,
        /// Total number of trials
        total: usize,
        /// Whether the value was substituted after a failure
        fallback: bool,
    },
    /// Something went wrong that did not stop the cycle
    Warning(String),
}

/// Callback interface for progress updates.
///
/// Implementations must not block: they are called inline between
/// timed requests.
pub trait ProgressCallback: Send + Sync {
    /// Called when a progress event occurs.
    fn on_progress(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// Forwards events to a channel so a consumer can treat them as a stream.
///
/// A closed receiver is ignored.
impl ProgressCallback for UnboundedSender<ProgressEvent> {
    fn on_progress(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

impl<P: ProgressCallback + ?Sized> ProgressCallback for &P {
    fn on_progress(&self, event: ProgressEvent) {
        (**self).on_progress(event)
    }
}
