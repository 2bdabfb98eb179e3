//! Connection probing over plain HTTP with a scored, persisted history.
//!
//! A probe cycle measures latency, download and upload throughput, turns
//! them into point estimates, scores them against recent results and
//! stores the outcome. See [`engine::ProbeEngine`] for the entry point.

pub mod analytics;
pub mod diagnostics;
pub mod display;
pub mod engine;
pub mod errors;
pub mod export;
pub mod fallback;
pub mod history;
pub mod measurements;
pub mod probe;
pub mod progress;
pub mod results;
pub mod scoring;
pub mod settings;
pub mod stats;
