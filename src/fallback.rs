//! Fallback substitution for failed probe requests.
//!
//! A failed request never fails the cycle. Its measurement is replaced by
//! a synthetic value from a [`FallbackSampler`], and the failure is
//! logged. There are no retries.

use log::{debug, warn};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::ops::Range;

/// Synthetic latency range in milliseconds.
pub const LATENCY_RANGE_MS: Range<f64> = 20.0..120.0;

/// Synthetic download range in Mbps.
pub const DOWNLOAD_RANGE_MBPS: Range<f64> = 10.0..90.0;

/// Synthetic upload range in Mbps.
pub const UPLOAD_RANGE_MBPS: Range<f64> = 5.0..45.0;

/// Source of substitute values for failed measurements.
pub trait FallbackSampler: Send + Sync {
    fn latency_ms(&self) -> f64;
    fn download_mbps(&self) -> f64;
    fn upload_mbps(&self) -> f64;
}

/// Uniform random values from the bounded fallback ranges.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomFallback;

impl FallbackSampler for RandomFallback {
    fn latency_ms(&self) -> f64 {
        rand::rng().random_range(LATENCY_RANGE_MS)
    }

    fn download_mbps(&self) -> f64 {
        rand::rng().random_range(DOWNLOAD_RANGE_MBPS)
    }

    fn upload_mbps(&self) -> f64 {
        rand::rng().random_range(UPLOAD_RANGE_MBPS)
    }
}

/// Constant values, for deterministic runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedFallback {
    pub latency_ms: f64,
    pub download_mbps: f64,
    pub upload_mbps: f64,
}

impl FixedFallback {
    pub const fn new(latency_ms: f64, download_mbps: f64, upload_mbps: f64) -> Self {
        Self { latency_ms, download_mbps, upload_mbps }
    }
}

impl Default for FixedFallback {
    /// Midpoints of the random ranges.
    fn default() -> Self {
        Self::new(70.0, 50.0, 25.0)
    }
}

impl FallbackSampler for FixedFallback {
    fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    fn download_mbps(&self) -> f64 {
        self.download_mbps
    }

    fn upload_mbps(&self) -> f64 {
        self.upload_mbps
    }
}

impl<F: FallbackSampler + ?Sized> FallbackSampler for &F {
    fn latency_ms(&self) -> f64 {
        (**self).latency_ms()
    }

    fn download_mbps(&self) -> f64 {
        (**self).download_mbps()
    }

    fn upload_mbps(&self) -> f64 {
        (**self).upload_mbps()
    }
}

/// A measurement, or the value substituted for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome<T> {
    /// The operation succeeded.
    Measured(T),
    /// The operation failed and a fallback value was used.
    Substituted(T),
}

impl<T> Outcome<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Substituted(_))
    }

    pub fn value(self) -> T {
        match self {
            Outcome::Measured(v) | Outcome::Substituted(v) => v,
        }
    }
}

/// Await `operation`; on error log it and use `fallback()` instead.
///
/// # Example
/// ```
/// use speed_lens::fallback::{measure_or_fallback, Outcome};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let outcome = measure_or_fallback(
///         "ping 1/10",
///         async { Err::<f64, _>("connection refused") },
///         || 70.0,
///     )
///     .await;
///     assert_eq!(outcome, Outcome::Substituted(70.0));
/// }
/// ```
pub async fn measure_or_fallback<T, E, Fut, F>(
    operation_name: &str,
    operation: Fut,
    fallback: F,
) -> Outcome<T>
where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
    F: FnOnce() -> T,
{
    match operation.await {
        Ok(value) => {
            debug!("{}: measured", operation_name);
            Outcome::Measured(value)
        }
        Err(e) => {
            warn!("{}: failed, using fallback value: {}", operation_name, e);
            Outcome::Substituted(fallback())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_fixed_fallback_values() {
        let fallback = FixedFallback::new(33.0, 44.0, 11.0);
        assert_eq!(fallback.latency_ms(), 33.0);
        assert_eq!(fallback.download_mbps(), 44.0);
        assert_eq!(fallback.upload_mbps(), 11.0);
    }

    #[test]
    fn test_outcome_accessors() {
        assert!(!Outcome::Measured(1).is_fallback());
        assert!(Outcome::Substituted(1).is_fallback());
        assert_eq!(Outcome::Substituted(7).value(), 7);
    }

    #[tokio::test]
    async fn test_success_is_measured() {
        let outcome = measure_or_fallback(
            "op",
            async { Ok::<_, std::io::Error>(12.5) },
            || 99.0,
        )
        .await;

        assert_eq!(outcome, Outcome::Measured(12.5));
    }

    #[tokio::test]
    async fn test_failure_is_substituted_once() {
        let calls = AtomicU32::new(0);
        let outcome = measure_or_fallback(
            "op",
            async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<f64, _>(std::io::Error::other("connection refused"))
            },
            || 99.0,
        )
        .await;

        assert_eq!(outcome, Outcome::Substituted(99.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Random fallbacks stay inside their ranges.
        #[test]
        fn random_fallback_is_bounded(_seed in 0u32..1000) {
            let fallback = RandomFallback;
            prop_assert!(LATENCY_RANGE_MS.contains(&fallback.latency_ms()));
            prop_assert!(DOWNLOAD_RANGE_MBPS.contains(&fallback.download_mbps()));
            prop_assert!(UPLOAD_RANGE_MBPS.contains(&fallback.upload_mbps()));
        }
    }
}
