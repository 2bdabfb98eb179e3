//! Timed sampling of latency and throughput.
//!
//! No sampling function fails. A request that errors, times out or (for
//! throughput) comes back with a non-success status is replaced by a
//! value from the fallback sampler, and the cycle carries on.

use crate::errors::SpeedLensError;
use crate::fallback::{measure_or_fallback, FallbackSampler, Outcome};
use crate::measurements::{throughput_mbps, BandwidthDirection, ProbeSample};
use crate::probe::client::Transport;
use crate::probe::requests::{
    DownloadRequest, PingRequest, Request, UploadRequest,
};
use crate::progress::{percent, Phase, ProgressCallback, ProgressEvent};
use futures::future::join_all;
use log::debug;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use url::Url;

/// One download trial: `requests` concurrent GETs, joined before the
/// trial is timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadTrial {
    /// Nominal trial size in kB
    pub kilobytes: u64,
    /// Concurrent requests issued for the trial
    pub requests: usize,
}

impl DownloadTrial {
    /// A trial of `kilobytes`, split into requests of `chunk_kb` each.
    pub const fn split(kilobytes: u64, chunk_kb: u64) -> Self {
        let requests = if chunk_kb == 0 { 1 } else { kilobytes / chunk_kb };
        let requests = if requests == 0 { 1 } else { requests };
        Self { kilobytes, requests: requests as usize }
    }
}

/// One upload trial of a zero-filled payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTrial {
    pub bytes: usize,
}

impl UploadTrial {
    pub const fn new(bytes: usize) -> Self {
        Self { bytes }
    }
}

pub struct Sampler<T, F> {
    transport: T,
    fallback: F,
    ping_pause: Duration,
}

impl<T: Transport, F: FallbackSampler> Sampler<T, F> {
    /// `ping_pause` is slept between consecutive latency samples.
    pub fn new(transport: T, fallback: F, ping_pause: Duration) -> Self {
        Self { transport, fallback, ping_pause }
    }

    /// Take exactly `count` latency samples, rotating through
    /// `endpoints`.
    ///
    /// Any HTTP response counts as a round trip, whatever its status.
    pub async fn sample_latency<P: ProgressCallback + ?Sized>(
        &self,
        endpoints: &[Url],
        count: usize,
        progress: &P,
    ) -> Vec<ProbeSample> {
        let mut samples = Vec::with_capacity(count);

        for i in 0..count {
            let operation_name = format!("ping {}/{}", i + 1, count);
            let outcome = measure_or_fallback(
                &operation_name,
                self.round_trip(endpoints, i),
                || self.fallback.latency_ms(),
            )
            .await;

            let sample = match outcome {
                Outcome::Measured(ms) => ProbeSample { elapsed_ms: ms, fallback: false },
                Outcome::Substituted(ms) => ProbeSample::substituted(ms),
            };
            debug!("Latency {}/{}: {:.2} ms", i + 1, count, sample.elapsed_ms);

            progress.on_progress(ProgressEvent::LatencySample {
                value_ms: sample.elapsed_ms,
                current: i + 1,
                total: count,
                fallback: sample.fallback,
            });
            progress.on_progress(ProgressEvent::Progress {
                phase: Phase::Latency,
                percent: percent::at(percent::LATENCY_START, percent::LATENCY_STEP, i),
                message: format!("Testing ping... {}/{}", i + 1, count),
            });

            samples.push(sample);

            if i + 1 < count && !self.ping_pause.is_zero() {
                sleep(self.ping_pause).await;
            }
        }

        samples
    }

    /// Run one download trial and return its capped speed in Mbps.
    pub async fn download_trial(
        &self,
        endpoints: &[Url],
        trial: DownloadTrial,
    ) -> Outcome<f64> {
        let operation_name = format!("download {} kB", trial.kilobytes);
        measure_or_fallback(
            &operation_name,
            self.timed_download(endpoints, trial),
            || self.fallback.download_mbps(),
        )
        .await
    }

    /// Run one upload trial and return its capped speed in Mbps.
    pub async fn upload_trial(
        &self,
        endpoint: &Url,
        index: usize,
        trial: UploadTrial,
    ) -> Outcome<f64> {
        let operation_name = format!("upload {} B", trial.bytes);
        measure_or_fallback(
            &operation_name,
            self.timed_upload(endpoint, index, trial),
            || self.fallback.upload_mbps(),
        )
        .await
    }

    async fn round_trip(
        &self,
        endpoints: &[Url],
        index: usize,
    ) -> Result<f64, SpeedLensError> {
        let endpoint = rotate(endpoints, index)?;
        let request = PingRequest::new(endpoint, index);

        let start = Instant::now();
        self.transport.send(&request).await?;

        Ok(ProbeSample::measured(start.elapsed()).elapsed_ms)
    }

    async fn timed_download(
        &self,
        endpoints: &[Url],
        trial: DownloadTrial,
    ) -> Result<f64, SpeedLensError> {
        let requests = (0..trial.requests)
            .map(|j| rotate(endpoints, j).map(|endpoint| DownloadRequest::new(endpoint, j)))
            .collect::<Result<Vec<_>, _>>()?;

        let start = Instant::now();
        let transfers =
            join_all(requests.iter().map(|request| self.transport.send(request))).await;
        let elapsed = start.elapsed();

        let mut bytes = 0;
        for (request, transfer) in requests.iter().zip(transfers) {
            let transfer = transfer?;
            if !transfer.is_success() {
                return Err(SpeedLensError::http(
                    transfer.status,
                    request.url().as_str(),
                ));
            }
            bytes += transfer.bytes;
        }

        debug!(
            "Download {} kB: {} bytes in {:?} over {} requests",
            trial.kilobytes, bytes, elapsed, trial.requests
        );

        Ok(throughput_mbps(
            bytes,
            elapsed,
            BandwidthDirection::Download.cap_mbps(),
        ))
    }

    async fn timed_upload(
        &self,
        endpoint: &Url,
        index: usize,
        trial: UploadTrial,
    ) -> Result<f64, SpeedLensError> {
        let request = UploadRequest::new(endpoint, index, trial.bytes);

        let start = Instant::now();
        let transfer = self.transport.send(&request).await?;
        let elapsed = start.elapsed();

        if !transfer.is_success() {
            return Err(SpeedLensError::http(
                transfer.status,
                request.url().as_str(),
            ));
        }

        debug!("Upload {} B in {:?}", trial.bytes, elapsed);

        Ok(throughput_mbps(
            trial.bytes as u64,
            elapsed,
            BandwidthDirection::Upload.cap_mbps(),
        ))
    }
}

fn rotate(endpoints: &[Url], index: usize) -> Result<&Url, SpeedLensError> {
    if endpoints.is_empty() {
        return Err(SpeedLensError::config("no endpoints configured"));
    }

    Ok(&endpoints[index % endpoints.len()])
}
