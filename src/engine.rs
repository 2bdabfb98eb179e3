//! Probe cycle orchestration.
//!
//! A [`ProbeEngine`] owns the sampler, the history and the settings. The
//! caller constructs it with the transport, storage and fallback it wants
//! and drives cycles with [`ProbeEngine::run_cycle`]. Only one cycle runs
//! at a time; a second call while one is in flight does nothing.

use crate::analytics::{summarize, AnalyticsSummary, TimeWindow};
use crate::errors::SpeedLensError;
use crate::fallback::{FallbackSampler, Outcome};
use crate::history::{HistoryStore, Storage, DEFAULT_CAPACITY};
use crate::measurements::{estimate, BandwidthDirection, Estimates, DEFAULT_LOST_THRESHOLD_MS};
use crate::probe::{DownloadTrial, Sampler, Transport, UploadTrial};
use crate::progress::{percent, Phase, ProgressCallback, ProgressEvent};
use crate::results::ProbeResult;
use crate::scoring::{score, CONSISTENCY_WINDOW};
use crate::settings::Settings;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

/// Configuration for the probe engine.
///
/// Endpoints are kept as strings and validated when the engine is built.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Endpoints answering HEAD requests, used in rotation.
    pub ping_endpoints: Vec<String>,

    /// Number of latency samples per cycle.
    /// Default: 10
    pub ping_samples: usize,

    /// Pause between latency samples.
    /// Default: 100ms
    pub ping_pause: Duration,

    /// Round trips slower than this count as lost.
    /// Default: 1000ms
    pub lost_threshold_ms: f64,

    /// Endpoints serving download chunks, used in rotation.
    pub download_endpoints: Vec<String>,

    /// Download trials, run in order.
    /// Default: 500kB, 1000kB, 2000kB, 5000kB in 100kB requests
    pub download_trials: Vec<DownloadTrial>,

    /// Endpoint accepting upload POSTs.
    pub upload_endpoint: String,

    /// Upload trials, run in order.
    /// Default: 3 x 200KiB
    pub upload_trials: Vec<UploadTrial>,

    /// Pause between throughput trials.
    /// Default: 1000ms
    pub trial_pause: Duration,

    /// Give up on a single request after this long.
    /// Default: 10s
    pub request_timeout: Duration,

    /// Maximum number of stored results.
    /// Default: 50
    pub history_capacity: usize,
}

/// Size of each concurrent download request.
pub const DOWNLOAD_CHUNK_KB: u64 = 100;

/// Payload of each upload trial.
pub const UPLOAD_TRIAL_BYTES: usize = 200 * 1024;

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ping_endpoints: vec![
                "https://www.google.com/favicon.ico".to_string(),
                "https://www.cloudflare.com/favicon.ico".to_string(),
                "https://www.microsoft.com/favicon.ico".to_string(),
            ],
            ping_samples: 10,
            ping_pause: Duration::from_millis(100),
            lost_threshold_ms: DEFAULT_LOST_THRESHOLD_MS,
            download_endpoints: vec![
                "https://speed.cloudflare.com/__down?bytes=100000".to_string(),
                "https://cdnjs.cloudflare.com/ajax/libs/jquery/3.6.0/jquery.min.js"
                    .to_string(),
            ],
            download_trials: [500, 1000, 2000, 5000]
                .into_iter()
                .map(|kb| DownloadTrial::split(kb, DOWNLOAD_CHUNK_KB))
                .collect(),
            upload_endpoint: "https://speed.cloudflare.com/__up".to_string(),
            upload_trials: vec![UploadTrial::new(UPLOAD_TRIAL_BYTES); 3],
            trial_pause: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(10),
            history_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ProbeConfig {
    /// Drop every pause. Used by `--no-pause` and in tests.
    pub fn without_pauses(mut self) -> Self {
        self.ping_pause = Duration::ZERO;
        self.trial_pause = Duration::ZERO;
        self
    }
}

#[derive(Debug, Clone)]
struct Endpoints {
    ping: Vec<Url>,
    download: Vec<Url>,
    upload: Url,
}

impl Endpoints {
    fn parse(config: &ProbeConfig) -> Result<Self, SpeedLensError> {
        let parse_all = |kind: &str, raw: &[String]| -> Result<Vec<Url>, SpeedLensError> {
            if raw.is_empty() {
                return Err(SpeedLensError::config(format!("no {} endpoints configured", kind))
                    .with_suggestion("Configure at least one endpoint."));
            }
            raw.iter().map(|url| Ok(Url::parse(url)?)).collect()
        };

        Ok(Self {
            ping: parse_all("ping", &config.ping_endpoints)?,
            download: parse_all("download", &config.download_endpoints)?,
            upload: Url::parse(&config.upload_endpoint)?,
        })
    }
}

/// Clears the running flag when dropped, including when the cycle future
/// is dropped mid-flight.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ProbeEngine<T, S: Storage, F> {
    config: ProbeConfig,
    endpoints: Endpoints,
    sampler: Sampler<T, F>,
    history: Mutex<HistoryStore<S>>,
    settings: Mutex<Settings>,
    running: AtomicBool,
}

impl<T: Transport, S: Storage, F: FallbackSampler> ProbeEngine<T, S, F> {
    /// Build an engine, loading any persisted history and settings from
    /// `storage`.
    ///
    /// Fails with a configuration error when an endpoint list is empty or
    /// an endpoint is not a valid URL.
    pub fn new(
        config: ProbeConfig,
        transport: T,
        storage: S,
        fallback: F,
    ) -> Result<Self, SpeedLensError> {
        let endpoints = Endpoints::parse(&config)?;
        let history = HistoryStore::open(storage, config.history_capacity);
        let settings = Settings::load(history.storage());
        debug!("Loaded {} stored result(s)", history.len());

        Ok(Self {
            sampler: Sampler::new(transport, fallback, config.ping_pause),
            config,
            endpoints,
            history: Mutex::new(history),
            settings: Mutex::new(settings),
            running: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one full probe cycle and store its result.
    ///
    /// Returns `Ok(None)` without doing anything when a cycle is already
    /// running. A failure to persist the new result is reported through
    /// `progress` as a warning; the result is still returned and kept in
    /// memory. Dropping the returned future abandons the cycle and leaves
    /// the engine idle.
    pub async fn run_cycle<P: ProgressCallback + ?Sized>(
        &self,
        progress: &P,
    ) -> Result<Option<ProbeResult>, SpeedLensError> {
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            info!("A probe cycle is already running, ignoring request");
            return Ok(None);
        };

        info!("Starting probe cycle");
        report(progress, Phase::Initializing, percent::INITIALIZING, "Initializing test...");

        report(progress, Phase::Latency, percent::LATENCY_START, "Testing ping and latency...");
        let pings = self
            .sampler
            .sample_latency(&self.endpoints.ping, self.config.ping_samples, progress)
            .await;

        report(progress, Phase::Download, percent::DOWNLOAD_START, "Testing download speed...");
        let downloads = self.run_download_trials(progress).await;

        report(progress, Phase::Upload, percent::UPLOAD_START, "Testing upload speed...");
        let uploads = self.run_upload_trials(progress).await;

        report(progress, Phase::Scoring, percent::COMPLETE - 1, "Calculating results...");
        let estimates =
            estimate(&pings, &downloads, &uploads, self.config.lost_threshold_ms);
        check_estimates(&estimates)?;
        info!(
            "Estimates: ping={} ms, jitter={} ms, loss={:.1}%, download={:.2} Mbps, upload={:.2} Mbps",
            estimates.ping_ms,
            estimates.jitter_ms,
            estimates.packet_loss_percent,
            estimates.download_mbps,
            estimates.upload_mbps
        );

        let result = {
            let mut history = self.lock_history();
            let scores = score(&estimates, history.recent(CONSISTENCY_WINDOW));
            let result = ProbeResult::new(Utc::now(), &estimates, &scores);

            if let Err(e) = history.append(result.clone()) {
                warn!("Result kept in memory only: {}", e);
                progress.on_progress(ProgressEvent::Warning(format!(
                    "Could not save result: {}",
                    e
                )));
            }

            result
        };

        report(progress, Phase::Complete, percent::COMPLETE, "Test complete");
        info!("Probe cycle complete");

        Ok(Some(result))
    }

    async fn run_download_trials<P: ProgressCallback + ?Sized>(&self, progress: &P) -> Vec<f64> {
        let trials = &self.config.download_trials;
        let mut speeds = Vec::with_capacity(trials.len());

        for (i, trial) in trials.iter().enumerate() {
            let outcome =
                self.sampler.download_trial(&self.endpoints.download, *trial).await;
            self.trial_done(progress, BandwidthDirection::Download, outcome, i, trials.len());
            speeds.push(outcome.value());

            if i + 1 < trials.len() {
                self.pause_between_trials().await;
            }
        }

        speeds
    }

    async fn run_upload_trials<P: ProgressCallback + ?Sized>(&self, progress: &P) -> Vec<f64> {
        let trials = &self.config.upload_trials;
        let mut speeds = Vec::with_capacity(trials.len());

        for (i, trial) in trials.iter().enumerate() {
            let outcome =
                self.sampler.upload_trial(&self.endpoints.upload, i, *trial).await;
            self.trial_done(progress, BandwidthDirection::Upload, outcome, i, trials.len());
            speeds.push(outcome.value());

            if i + 1 < trials.len() {
                self.pause_between_trials().await;
            }
        }

        speeds
    }

    fn trial_done<P: ProgressCallback + ?Sized>(
        &self,
        progress: &P,
        direction: BandwidthDirection,
        outcome: Outcome<f64>,
        index: usize,
        total: usize,
    ) {
        let speed_mbps = outcome.value();
        let (phase, label, start, step) = match direction {
            BandwidthDirection::Download => (
                Phase::Download,
                "download",
                percent::DOWNLOAD_START,
                percent::DOWNLOAD_STEP,
            ),
            BandwidthDirection::Upload => {
                (Phase::Upload, "upload", percent::UPLOAD_START, percent::UPLOAD_STEP)
            }
        };
        info!("{} trial {}/{}: {:.2} Mbps", label, index + 1, total, speed_mbps);

        progress.on_progress(ProgressEvent::ThroughputTrial {
            direction,
            speed_mbps,
            current: index + 1,
            total,
            fallback: outcome.is_fallback(),
        });

        let done = (index + 1) * 100 / total.max(1);
        report(
            progress,
            phase,
            percent::at(start, step, index),
            &format!("Testing {}... {}%", label, done),
        );
    }

    async fn pause_between_trials(&self) {
        if !self.config.trial_pause.is_zero() {
            sleep(self.config.trial_pause).await;
        }
    }

    /// Summary of the stored results inside `window`, as seen from `now`.
    pub fn summary<Tz: TimeZone>(
        &self,
        window: TimeWindow,
        now: &DateTime<Tz>,
    ) -> AnalyticsSummary {
        summarize(self.lock_history().all(), window, now)
    }

    /// Snapshot of the stored results, newest first.
    pub fn history(&self) -> Vec<ProbeResult> {
        self.lock_history().all().to_vec()
    }

    /// Remove every stored result.
    ///
    /// The in-memory history is cleared even when persisting fails.
    pub fn clear_history(&self) -> Result<(), SpeedLensError> {
        info!("Clearing history");
        self.lock_history().clear()
    }

    pub fn settings(&self) -> Settings {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace and persist the settings.
    pub fn update_settings(&self, settings: Settings) -> Result<(), SpeedLensError> {
        settings.validate()?;

        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();

        settings.save(self.lock_history().storage())
    }

    fn lock_history(&self) -> MutexGuard<'_, HistoryStore<S>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn report<P: ProgressCallback + ?Sized>(progress: &P, phase: Phase, percent: u8, message: &str) {
    progress.on_progress(ProgressEvent::Progress {
        phase,
        percent,
        message: message.to_string(),
    });
}

fn check_estimates(estimates: &Estimates) -> Result<(), SpeedLensError> {
    let values = [
        estimates.ping_ms,
        estimates.jitter_ms,
        estimates.packet_loss_percent,
        estimates.download_mbps,
        estimates.upload_mbps,
    ];

    if values.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(SpeedLensError::cycle(format!(
            "probe cycle produced unusable estimates: {:?}",
            estimates
        )))
    }
}
