//! Quality scoring for completed probe cycles.
//!
//! Three independent scores are derived from the point estimates:
//!
//! - signal quality: starts at 100 and loses fixed penalties for high
//!   ping, jitter and packet loss
//! - consistency: how stable the download speed has been across the most
//!   recent results
//! - health: a coarse bucketed composite of all four headline metrics,
//!   used for diagnostics
//!
//! The bucket boundaries are part of the result format. Changing any of
//! them changes what previously stored results would have scored.

use crate::measurements::Estimates;
use crate::results::ProbeResult;
use crate::stats::coefficient_of_variation;
use serde::Serialize;

/// Number of prior results considered for the consistency score.
pub const CONSISTENCY_WINDOW: usize = 5;

/// Coarse rating used when presenting a single metric.
///
/// Variants are ordered from worst to best for correct derived Ord behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Likely to cause noticeable problems
    Poor,
    /// Usable with occasional issues
    Fair,
    /// Suitable for most uses
    Good,
    /// Optimal
    Excellent,
}

impl Rating {
    /// Returns a human-readable description of the rating.
    pub fn description(&self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::Good => "Good",
            Rating::Fair => "Fair",
            Rating::Poor => "Poor",
        }
    }

    /// Returns true if this rating is better than or equal to the other.
    pub fn is_at_least(&self, other: Rating) -> bool {
        *self >= other
    }
}

/// Penalties subtracted from a perfect signal quality of 100.
///
/// Within each metric the bands are exclusive: only the first matching
/// band applies.
mod signal_penalties {
    pub const PING_SEVERE_MS: f64 = 100.0;
    pub const PING_SEVERE: f64 = 30.0;
    pub const PING_MODERATE_MS: f64 = 50.0;
    pub const PING_MODERATE: f64 = 15.0;

    pub const JITTER_SEVERE_MS: f64 = 50.0;
    pub const JITTER_SEVERE: f64 = 20.0;
    pub const JITTER_MODERATE_MS: f64 = 20.0;
    pub const JITTER_MODERATE: f64 = 10.0;

    pub const LOSS_SEVERE_PERCENT: f64 = 5.0;
    pub const LOSS_SEVERE: f64 = 25.0;
    pub const LOSS_MODERATE_PERCENT: f64 = 1.0;
    pub const LOSS_MODERATE: f64 = 10.0;
}

/// Bucket tables for the composite health score, as
/// `(threshold, points)` pairs checked in order.
mod health_buckets {
    /// Download Mbps at or above threshold (40 points max).
    pub const DOWNLOAD: [(f64, u32); 4] =
        [(50.0, 40), (25.0, 30), (10.0, 20), (5.0, 10)];
    /// Upload Mbps at or above threshold (20 points max).
    pub const UPLOAD: [(f64, u32); 4] =
        [(10.0, 20), (5.0, 15), (2.0, 10), (1.0, 5)];
    /// Ping ms at or below threshold (25 points max).
    pub const PING: [(f64, u32); 4] =
        [(20.0, 25), (50.0, 20), (100.0, 15), (200.0, 10)];
    /// Points for a ping slower than every bucket.
    pub const PING_FLOOR: u32 = 5;
    /// Jitter ms at or below threshold (15 points max).
    pub const JITTER: [(f64, u32); 4] =
        [(5.0, 15), (10.0, 12), (20.0, 8), (50.0, 5)];
}

/// Signal quality (0-100) from ping, jitter and packet loss.
///
/// # Example
/// ```
/// use speed_lens::scoring::signal_quality;
///
/// assert_eq!(signal_quality(10.0, 2.0, 0.0), 100.0);
/// assert_eq!(signal_quality(150.0, 60.0, 10.0), 25.0);
/// ```
pub fn signal_quality(ping_ms: f64, jitter_ms: f64, packet_loss: f64) -> f64 {
    use signal_penalties::*;

    let mut quality = 100.0;

    if ping_ms > PING_SEVERE_MS {
        quality -= PING_SEVERE;
    } else if ping_ms > PING_MODERATE_MS {
        quality -= PING_MODERATE;
    }

    if jitter_ms > JITTER_SEVERE_MS {
        quality -= JITTER_SEVERE;
    } else if jitter_ms > JITTER_MODERATE_MS {
        quality -= JITTER_MODERATE;
    }

    if packet_loss > LOSS_SEVERE_PERCENT {
        quality -= LOSS_SEVERE;
    } else if packet_loss > LOSS_MODERATE_PERCENT {
        quality -= LOSS_MODERATE;
    }

    clamp_score(quality)
}

/// Consistency (0-100) of the given download speeds.
///
/// Fewer than two speeds is not enough data to judge, which is not
/// penalised: the score is 100. A zero mean leaves the coefficient of
/// variation undefined and is treated the same way.
pub fn consistency(recent_downloads: &[f64]) -> f64 {
    if recent_downloads.len() < 2 {
        return 100.0;
    }

    match coefficient_of_variation(recent_downloads) {
        Some(cv) => clamp_score(100.0 - cv * 100.0),
        None => 100.0,
    }
}

/// Composite health score (0-100) built from fixed buckets.
pub fn health_score(
    download_mbps: f64,
    upload_mbps: f64,
    ping_ms: f64,
    jitter_ms: f64,
) -> u32 {
    use health_buckets::*;

    let at_least = |value: f64, table: &[(f64, u32)]| {
        table
            .iter()
            .find(|(threshold, _)| value >= *threshold)
            .map(|(_, points)| *points)
            .unwrap_or(0)
    };

    let at_most = |value: f64, table: &[(f64, u32)]| {
        table
            .iter()
            .find(|(threshold, _)| value <= *threshold)
            .map(|(_, points)| *points)
    };

    let score = at_least(download_mbps, &DOWNLOAD)
        + at_least(upload_mbps, &UPLOAD)
        + at_most(ping_ms, &PING).unwrap_or(PING_FLOOR)
        + at_most(jitter_ms, &JITTER).unwrap_or(0);

    score.min(100)
}

/// Health score of a stored result.
pub fn result_health(result: &ProbeResult) -> u32 {
    health_score(
        result.download_speed(),
        result.upload_speed(),
        result.ping(),
        result.jitter(),
    )
}

/// The derived scores stored alongside a result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreCard {
    /// Penalty-based signal quality, 0-100
    pub signal_quality: f64,
    /// Download stability across recent results, 0-100
    pub consistency: f64,
}

/// Score a fresh set of estimates against the results that preceded it.
///
/// `history` is newest-first; only the first [`CONSISTENCY_WINDOW`]
/// entries are considered.
pub fn score(estimates: &Estimates, history: &[ProbeResult]) -> ScoreCard {
    let recent: Vec<f64> = history
        .iter()
        .take(CONSISTENCY_WINDOW)
        .map(ProbeResult::download_speed)
        .collect();

    ScoreCard {
        signal_quality: signal_quality(
            estimates.ping_ms,
            estimates.jitter_ms,
            estimates.packet_loss_percent,
        ),
        consistency: consistency(&recent),
    }
}

/// Rate a download speed (Mbps).
pub fn rate_download(mbps: f64) -> Rating {
    rate_descending(mbps, 100.0, 50.0, 25.0)
}

/// Rate an upload speed (Mbps).
pub fn rate_upload(mbps: f64) -> Rating {
    rate_descending(mbps, 50.0, 25.0, 10.0)
}

/// Rate a ping (ms).
pub fn rate_ping(ms: f64) -> Rating {
    rate_ascending(ms, 20.0, 50.0, 100.0)
}

/// Rate a jitter (ms).
pub fn rate_jitter(ms: f64) -> Rating {
    rate_ascending(ms, 5.0, 15.0, 30.0)
}

/// Rate a 0-100 signal quality or consistency score.
pub fn rate_score(score: f64) -> Rating {
    rate_descending(score, 90.0, 70.0, 50.0)
}

/// Rate a 0-100 health score.
pub fn rate_health(score: u32) -> Rating {
    rate_descending(score as f64, 80.0, 60.0, 40.0)
}

// Higher is better.
fn rate_descending(value: f64, excellent: f64, good: f64, fair: f64) -> Rating {
    if value >= excellent {
        Rating::Excellent
    } else if value >= good {
        Rating::Good
    } else if value >= fair {
        Rating::Fair
    } else {
        Rating::Poor
    }
}

// Lower is better.
fn rate_ascending(value: f64, excellent: f64, good: f64, fair: f64) -> Rating {
    if value <= excellent {
        Rating::Excellent
    } else if value <= good {
        Rating::Good
    } else if value <= fair {
        Rating::Fair
    } else {
        Rating::Poor
    }
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn result_with_download(download: f64) -> ProbeResult {
        let estimates = Estimates {
            ping_ms: 20.0,
            jitter_ms: 2.0,
            packet_loss_percent: 0.0,
            download_mbps: download,
            upload_mbps: 10.0,
        };
        let card = ScoreCard { signal_quality: 100.0, consistency: 100.0 };
        ProbeResult::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
            &estimates,
            &card,
        )
    }

    // ========================================================================
    // Signal quality
    // ========================================================================

    #[test]
    fn test_signal_quality_perfect() {
        assert_eq!(signal_quality(10.0, 2.0, 0.0), 100.0);
    }

    #[test]
    fn test_signal_quality_all_severe() {
        assert_eq!(signal_quality(150.0, 60.0, 10.0), 25.0);
    }

    #[test]
    fn test_signal_quality_bands_are_exclusive() {
        // ping over 100 only takes the severe penalty, not both
        assert_eq!(signal_quality(101.0, 0.0, 0.0), 70.0);
        assert_eq!(signal_quality(51.0, 0.0, 0.0), 85.0);
        assert_eq!(signal_quality(0.0, 51.0, 0.0), 80.0);
        assert_eq!(signal_quality(0.0, 21.0, 0.0), 90.0);
        assert_eq!(signal_quality(0.0, 0.0, 5.5), 75.0);
        assert_eq!(signal_quality(0.0, 0.0, 1.5), 90.0);
    }

    #[test]
    fn test_signal_quality_boundaries_are_not_penalised() {
        assert_eq!(signal_quality(50.0, 20.0, 1.0), 100.0);
        assert_eq!(signal_quality(100.0, 50.0, 5.0), 100.0 - 15.0 - 10.0 - 10.0);
    }

    // ========================================================================
    // Consistency
    // ========================================================================

    #[test]
    fn test_consistency_defaults_without_history() {
        assert_eq!(consistency(&[]), 100.0);
        assert_eq!(consistency(&[3.0]), 100.0);
    }

    #[test]
    fn test_consistency_identical_speeds() {
        assert_eq!(consistency(&[42.0, 42.0, 42.0]), 100.0);
    }

    #[test]
    fn test_consistency_from_cv() {
        // cv = 25 / 75
        let value = consistency(&[50.0, 100.0]);
        assert!((value - (100.0 - 100.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_consistency_floors_at_zero() {
        assert_eq!(consistency(&[0.1, 0.1, 0.1, 0.1, 500.0]), 0.0);
    }

    #[test]
    fn test_consistency_zero_mean() {
        assert_eq!(consistency(&[0.0, 0.0]), 100.0);
    }

    #[test]
    fn test_score_uses_five_most_recent() {
        let mut history: Vec<ProbeResult> =
            (0..5).map(|_| result_with_download(40.0)).collect();
        // older than the window, must be ignored
        history.push(result_with_download(1.0));

        let estimates = Estimates {
            ping_ms: 150.0,
            jitter_ms: 60.0,
            packet_loss_percent: 10.0,
            download_mbps: 5.0,
            upload_mbps: 1.0,
        };

        let card = score(&estimates, &history);
        assert_eq!(card.signal_quality, 25.0);
        assert_eq!(card.consistency, 100.0);
    }

    #[test]
    fn test_score_with_single_prior_result_defaults() {
        let history = vec![result_with_download(1.0)];
        let estimates = Estimates {
            ping_ms: 10.0,
            jitter_ms: 1.0,
            packet_loss_percent: 0.0,
            download_mbps: 900.0,
            upload_mbps: 100.0,
        };
        assert_eq!(score(&estimates, &history).consistency, 100.0);
    }

    // ========================================================================
    // Health score
    // ========================================================================

    #[test]
    fn test_health_score_maximum() {
        assert_eq!(health_score(50.0, 10.0, 20.0, 5.0), 100);
    }

    #[test]
    fn test_health_score_minimum() {
        assert_eq!(health_score(0.0, 0.0, 500.0, 80.0), 5);
    }

    #[test]
    fn test_health_score_bucket_edges() {
        assert_eq!(health_score(25.0, 5.0, 50.0, 10.0), 30 + 15 + 20 + 12);
        assert_eq!(health_score(10.0, 2.0, 100.0, 20.0), 20 + 10 + 15 + 8);
        assert_eq!(health_score(5.0, 1.0, 200.0, 50.0), 10 + 5 + 10 + 5);
        assert_eq!(health_score(4.99, 0.99, 200.1, 50.1), 5);
    }

    #[test]
    fn test_result_health() {
        let result = result_with_download(60.0);
        assert_eq!(result_health(&result), 40 + 20 + 25 + 15);
    }

    // ========================================================================
    // Ratings
    // ========================================================================

    #[test]
    fn test_rating_ordering() {
        assert!(Rating::Excellent > Rating::Good);
        assert!(Rating::Good > Rating::Fair);
        assert!(Rating::Fair > Rating::Poor);
        assert!(Rating::Good.is_at_least(Rating::Fair));
        assert!(!Rating::Poor.is_at_least(Rating::Fair));
    }

    #[test]
    fn test_rating_description() {
        assert_eq!(Rating::Excellent.description(), "Excellent");
        assert_eq!(Rating::Fair.description(), "Fair");
    }

    #[test]
    fn test_rate_metrics() {
        assert_eq!(rate_download(100.0), Rating::Excellent);
        assert_eq!(rate_download(30.0), Rating::Fair);
        assert_eq!(rate_upload(25.0), Rating::Good);
        assert_eq!(rate_upload(9.9), Rating::Poor);
        assert_eq!(rate_ping(20.0), Rating::Excellent);
        assert_eq!(rate_ping(101.0), Rating::Poor);
        assert_eq!(rate_jitter(15.0), Rating::Good);
        assert_eq!(rate_jitter(30.0), Rating::Fair);
        assert_eq!(rate_score(90.0), Rating::Excellent);
        assert_eq!(rate_score(49.0), Rating::Poor);
        assert_eq!(rate_health(60), Rating::Good);
        assert_eq!(rate_health(39), Rating::Poor);
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Signal quality always lands in [0, 100].
        #[test]
        fn signal_quality_is_clamped(
            ping in 0.0f64..5000.0,
            jitter in 0.0f64..5000.0,
            loss in 0.0f64..100.0,
        ) {
            let quality = signal_quality(ping, jitter, loss);
            prop_assert!((0.0..=100.0).contains(&quality));
        }

        /// Consistency always lands in [0, 100].
        #[test]
        fn consistency_is_clamped(
            speeds in proptest::collection::vec(0.0f64..1000.0, 0..10),
        ) {
            let value = consistency(&speeds);
            prop_assert!((0.0..=100.0).contains(&value));
        }

        /// Lower ping never lowers signal quality.
        #[test]
        fn lower_ping_never_decreases_signal_quality(
            ping in 0.0f64..500.0,
            reduction in 0.0f64..500.0,
            jitter in 0.0f64..100.0,
            loss in 0.0f64..20.0,
        ) {
            let improved = (ping - reduction).max(0.0);
            prop_assert!(
                signal_quality(improved, jitter, loss) >= signal_quality(ping, jitter, loss)
            );
        }

        /// Health never exceeds 100 and better download never lowers it.
        #[test]
        fn better_download_never_decreases_health(
            download in 0.0f64..200.0,
            improvement in 0.0f64..200.0,
            upload in 0.0f64..50.0,
            ping in 0.0f64..400.0,
            jitter in 0.0f64..100.0,
        ) {
            let base = health_score(download, upload, ping, jitter);
            let better = health_score(download + improvement, upload, ping, jitter);
            prop_assert!(base <= 100);
            prop_assert!(better >= base);
        }
    }
}
