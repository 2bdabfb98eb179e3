//! Point estimates derived from raw probe timings.
//!
//! Latency samples come in as wall-clock round-trip times; throughput
//! trials come in as already-capped Mbps values. The functions here turn
//! both into the headline numbers of a probe cycle.

use crate::stats::{max, mean, mean_abs_delta};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Round trips slower than this are counted as lost.
pub const DEFAULT_LOST_THRESHOLD_MS: f64 = 1000.0;

/// Ceiling applied to a single download trial.
pub const DOWNLOAD_CAP_MBPS: f64 = 1000.0;

/// Ceiling applied to a single upload trial.
pub const UPLOAD_CAP_MBPS: f64 = 200.0;

/// One timed network round trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSample {
    /// Elapsed wall-clock time in milliseconds
    pub elapsed_ms: f64,
    /// Whether the value was substituted after a failed request
    pub fallback: bool,
}

impl ProbeSample {
    pub fn measured(elapsed: Duration) -> Self {
        Self { elapsed_ms: elapsed.as_secs_f64() * 1000.0, fallback: false }
    }

    pub fn substituted(elapsed_ms: f64) -> Self {
        Self { elapsed_ms, fallback: true }
    }
}

/// Direction of a throughput trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandwidthDirection {
    Download,
    Upload,
}

impl BandwidthDirection {
    /// Plausibility ceiling for a single trial in this direction.
    pub fn cap_mbps(&self) -> f64 {
        match self {
            BandwidthDirection::Download => DOWNLOAD_CAP_MBPS,
            BandwidthDirection::Upload => UPLOAD_CAP_MBPS,
        }
    }
}

/// Mean round-trip time, rounded to whole milliseconds.
pub fn ping_ms(samples: &[ProbeSample]) -> f64 {
    mean(&elapsed(samples)).map(f64::round).unwrap_or(0.0)
}

/// Mean absolute difference between consecutive round trips, rounded.
///
/// A single sample has no variation, so it yields 0.
pub fn jitter_ms(samples: &[ProbeSample]) -> f64 {
    mean_abs_delta(&elapsed(samples)).map(f64::round).unwrap_or(0.0)
}

/// Percentage of samples slower than `threshold_ms`.
pub fn packet_loss_percent(samples: &[ProbeSample], threshold_ms: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let lost = samples.iter().filter(|s| s.elapsed_ms > threshold_ms).count();

    lost as f64 / samples.len() as f64 * 100.0
}

/// Throughput of `bytes` moved in `elapsed`, in Mbps, capped at `cap_mbps`.
///
/// A zero elapsed time means the transfer finished faster than the clock
/// could resolve, which is treated as hitting the cap.
pub fn throughput_mbps(bytes: u64, elapsed: Duration, cap_mbps: f64) -> f64 {
    if bytes == 0 {
        return 0.0;
    }

    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return cap_mbps;
    }

    let bits = bytes as f64 * 8.0;

    (bits / (seconds * 1_000_000.0)).min(cap_mbps)
}

/// Headline throughput of a set of trials: the best one.
///
/// Small web requests understate bandwidth far more often than they
/// overstate it, so the maximum is reported rather than the mean.
pub fn best_throughput(trials: &[f64]) -> f64 {
    max(trials).unwrap_or(0.0).max(0.0)
}

/// Point estimates for one probe cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimates {
    /// Mean round trip in ms
    pub ping_ms: f64,
    /// Jitter in ms
    pub jitter_ms: f64,
    /// Lost samples as a percentage
    pub packet_loss_percent: f64,
    /// Best download trial in Mbps
    pub download_mbps: f64,
    /// Best upload trial in Mbps
    pub upload_mbps: f64,
}

/// Reduce the raw samples of a cycle to its point estimates.
pub fn estimate(
    ping_samples: &[ProbeSample],
    download_trials: &[f64],
    upload_trials: &[f64],
    lost_threshold_ms: f64,
) -> Estimates {
    Estimates {
        ping_ms: ping_ms(ping_samples),
        jitter_ms: jitter_ms(ping_samples),
        packet_loss_percent: packet_loss_percent(
            ping_samples,
            lost_threshold_ms,
        ),
        download_mbps: best_throughput(download_trials),
        upload_mbps: best_throughput(upload_trials),
    }
}

fn elapsed(samples: &[ProbeSample]) -> Vec<f64> {
    samples.iter().map(|sample| sample.elapsed_ms).collect()
}
