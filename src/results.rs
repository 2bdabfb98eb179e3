//! The result of one completed probe cycle.
//!
//! A `ProbeResult` is built once, when a cycle finishes scoring, and is
//! never mutated afterwards. Its serialized form is the persisted history
//! layout, so field names are stable camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::measurements::Estimates;
use crate::scoring::ScoreCard;

/// Complete results from a probe cycle.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use speed_lens::measurements::Estimates;
/// use speed_lens::results::ProbeResult;
/// use speed_lens::scoring::ScoreCard;
///
/// let estimates = Estimates {
///     ping_ms: 18.0,
///     jitter_ms: 3.0,
///     packet_loss_percent: 0.0,
///     download_mbps: 94.2,
///     upload_mbps: 11.8,
/// };
/// let scores = ScoreCard { signal_quality: 100.0, consistency: 100.0 };
/// let result = ProbeResult::new(Utc::now(), &estimates, &scores);
///
/// let json = serde_json::to_string(&result).unwrap();
/// assert!(json.contains("\"downloadSpeed\":94.2"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredResult")]
pub struct ProbeResult {
    timestamp: DateTime<Utc>,
    ping: f64,
    jitter: f64,
    packet_loss: f64,
    download_speed: f64,
    upload_speed: f64,
    signal_quality: f64,
    consistency: f64,
}

/// Persisted layout, taken as-is before the invariants are applied.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredResult {
    timestamp: DateTime<Utc>,
    ping: f64,
    jitter: f64,
    packet_loss: f64,
    download_speed: f64,
    upload_speed: f64,
    signal_quality: f64,
    #[serde(default = "full_score")]
    consistency: f64,
}

impl From<StoredResult> for ProbeResult {
    fn from(stored: StoredResult) -> Self {
        let estimates = Estimates {
            ping_ms: stored.ping,
            jitter_ms: stored.jitter,
            packet_loss_percent: stored.packet_loss,
            download_mbps: stored.download_speed,
            upload_mbps: stored.upload_speed,
        };
        let scores = ScoreCard {
            signal_quality: stored.signal_quality,
            consistency: stored.consistency,
        };

        ProbeResult::new(stored.timestamp, &estimates, &scores)
    }
}

impl ProbeResult {
    /// Assemble a result from a cycle's estimates and scores.
    ///
    /// Negative or non-finite inputs are stored as 0, and both scores are
    /// clamped to [0, 100].
    pub fn new(
        timestamp: DateTime<Utc>,
        estimates: &Estimates,
        scores: &ScoreCard,
    ) -> Self {
        Self {
            timestamp,
            ping: non_negative(estimates.ping_ms),
            jitter: non_negative(estimates.jitter_ms),
            packet_loss: non_negative(estimates.packet_loss_percent),
            download_speed: non_negative(estimates.download_mbps),
            upload_speed: non_negative(estimates.upload_mbps),
            signal_quality: percentage(scores.signal_quality),
            consistency: percentage(scores.consistency),
        }
    }

    /// When the cycle completed.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Mean round trip in ms.
    pub fn ping(&self) -> f64 {
        self.ping
    }

    /// Jitter in ms.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Lost ping samples as a percentage.
    pub fn packet_loss(&self) -> f64 {
        self.packet_loss
    }

    /// Best download trial in Mbps.
    pub fn download_speed(&self) -> f64 {
        self.download_speed
    }

    /// Best upload trial in Mbps.
    pub fn upload_speed(&self) -> f64 {
        self.upload_speed
    }

    /// Signal quality, 0-100.
    pub fn signal_quality(&self) -> f64 {
        self.signal_quality
    }

    /// Consistency, 0-100.
    pub fn consistency(&self) -> f64 {
        self.consistency
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn percentage(value: f64) -> f64 {
    non_negative(value).min(100.0)
}

fn full_score() -> f64 {
    100.0
}
