//! Terminal presentation of results, summaries and progress.
//!
//! Everything here renders to `String` so the CLI decides where it goes.

use crate::analytics::{AnalyticsSummary, TimeWindow};
use crate::diagnostics::{Diagnosis, Severity};
use crate::measurements::BandwidthDirection;
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::results::ProbeResult;
use crate::scoring::{rate_download, rate_jitter, rate_ping, rate_score, rate_upload, Rating};
use crate::settings::SpeedUnit;
use colored::{Color, Colorize};
use std::fmt::Write;

/// How the CLI presents its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Colored text with live progress on stderr
    Text,
    /// No progress, final results only
    Silent,
    /// Structured output only
    Json,
}

impl DisplayMode {
    /// `Json` when asked for, otherwise `Text` on a terminal and `Silent`
    /// when piped.
    pub fn detect(json_flag: bool, is_tty: bool) -> Self {
        if json_flag {
            DisplayMode::Json
        } else if is_tty {
            DisplayMode::Text
        } else {
            DisplayMode::Silent
        }
    }

    pub fn shows_progress(&self) -> bool {
        *self == DisplayMode::Text
    }
}

/// Green at 100 Mbps and above, yellow from 25, red below.
pub fn speed_color(speed_mbps: f64) -> Color {
    if speed_mbps >= 100.0 {
        Color::Green
    } else if speed_mbps >= 25.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

pub fn rating_color(rating: Rating) -> Color {
    match rating {
        Rating::Excellent => Color::Green,
        Rating::Good => Color::Cyan,
        Rating::Fair => Color::Yellow,
        Rating::Poor => Color::Red,
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Success => Color::Green,
        Severity::Info => Color::Blue,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
    }
}

/// Format a speed held in Mbps in the chosen unit, two decimals.
pub fn format_speed(speed_mbps: f64, unit: SpeedUnit) -> String {
    format!("{:.2} {}", unit.convert(speed_mbps), unit.label())
}

pub fn format_latency(latency_ms: f64) -> String {
    format!("{:.2} ms", latency_ms)
}

/// Signed whole-percent trend.
///
/// With `lower_is_better` the sign is flipped so that a positive number
/// always reads as an improvement.
pub fn format_trend(percent: f64, lower_is_better: bool) -> String {
    let shown = if lower_is_better { -percent } else { percent };
    let shown = if shown == 0.0 { 0.0 } else { shown };
    format!("{:+}%", shown.round() as i64)
}

fn trend_colored(percent: f64, lower_is_better: bool) -> String {
    let text = format_trend(percent, lower_is_better);
    let improving = if lower_is_better { percent < 0.0 } else { percent > 0.0 };
    let color = if percent == 0.0 {
        Color::White
    } else if improving {
        Color::Green
    } else {
        Color::Red
    };
    text.color(color).to_string()
}

fn rated(text: String, rating: Rating) -> String {
    format!(
        "{} {}",
        text.color(rating_color(rating)).bold(),
        format!("({})", rating.description()).dimmed()
    )
}

/// Headline numbers of a single result.
pub fn render_result(result: &ProbeResult, unit: SpeedUnit) -> String {
    let rows = [
        (
            "Download:",
            rated(format_speed(result.download_speed(), unit), rate_download(result.download_speed())),
        ),
        (
            "Upload:",
            rated(format_speed(result.upload_speed(), unit), rate_upload(result.upload_speed())),
        ),
        ("Ping:", rated(format_latency(result.ping()), rate_ping(result.ping()))),
        ("Jitter:", rated(format_latency(result.jitter()), rate_jitter(result.jitter()))),
        ("Packet Loss:", format!("{:.1}%", result.packet_loss())),
        (
            "Signal Quality:",
            rated(format!("{:.0}%", result.signal_quality()), rate_score(result.signal_quality())),
        ),
        (
            "Consistency:",
            rated(format!("{:.0}%", result.consistency()), rate_score(result.consistency())),
        ),
    ];

    let mut out = String::new();
    for (label, value) in rows {
        let _ = writeln!(out, "{:<16} {}", label.bold().white(), value);
    }
    out
}

/// Health score, findings and activity readiness.
pub fn render_diagnosis(diagnosis: &Diagnosis) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{:<16} {}",
        "Health:".bold().white(),
        rated(format!("{}/100", diagnosis.health_score), diagnosis.health)
    );

    if !diagnosis.issues.is_empty() {
        let _ = writeln!(out, "\n{}", "Issues".bold().underline());
        for issue in &diagnosis.issues {
            let _ = writeln!(out, "  {} {}", "!".color(severity_color(issue.severity)), issue.message);
        }
    }

    if !diagnosis.recommendations.is_empty() {
        let _ = writeln!(out, "\n{}", "Recommendations".bold().underline());
        for recommendation in &diagnosis.recommendations {
            let _ = writeln!(
                out,
                "  {} {}",
                recommendation.title.color(severity_color(recommendation.severity)).bold(),
                recommendation.description
            );
        }
    }

    let _ = writeln!(out, "\n{}", "Ready for".bold().underline());
    for (activity, rating) in &diagnosis.activities {
        let _ = writeln!(
            out,
            "  {:<20} {}",
            activity.label(),
            rating.description().color(rating_color(*rating))
        );
    }

    out
}

/// Summary block for one time window.
pub fn render_summary(summary: &AnalyticsSummary, window: TimeWindow, unit: SpeedUnit) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", format!("Summary ({})", window).bold().underline());

    if !summary.has_data() {
        let _ = writeln!(out, "No tests in this period.");
        return out;
    }

    let trends = &summary.trend_percent;
    let peak = summary
        .peak_hour
        .map(|hour| format!("{}:00 - {}:00", hour, hour + 1))
        .unwrap_or_else(|| "N/A".to_string());

    let rows = [
        ("Tests:", summary.total_tests.to_string()),
        (
            "Avg Download:",
            format!("{}  {}", format_speed(summary.avg_download, unit), trend_colored(trends.download, false)),
        ),
        (
            "Avg Upload:",
            format!("{}  {}", format_speed(summary.avg_upload, unit), trend_colored(trends.upload, false)),
        ),
        (
            "Avg Ping:",
            format!("{}  {}", format_latency(summary.avg_ping), trend_colored(trends.ping, true)),
        ),
        ("Max Download:", format_speed(summary.max_download, unit)),
        ("Max Upload:", format_speed(summary.max_upload, unit)),
        ("Min Ping:", format_latency(summary.min_ping)),
        ("Tests Per Day:", format!("{:.1}", summary.test_frequency)),
        ("Peak Hour:", peak),
    ];

    for (label, value) in rows {
        let _ = writeln!(out, "{:<16} {}", label.bold().white(), value);
    }
    out
}

/// One line per stored result, newest first.
pub fn render_history(history: &[ProbeResult], unit: SpeedUnit) -> String {
    if history.is_empty() {
        return "No stored results.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        format!(
            "{:<20} {:>14} {:>14} {:>10} {:>10} {:>8}",
            "Date", "Download", "Upload", "Ping", "Jitter", "Quality"
        )
        .bold()
    );

    for result in history {
        let download = format!("{:>14}", format_speed(result.download_speed(), unit));
        let _ = writeln!(
            out,
            "{:<20} {} {:>14} {:>10} {:>10} {:>7.0}%",
            result.timestamp().format("%Y-%m-%d %H:%M"),
            download.color(speed_color(result.download_speed())),
            format_speed(result.upload_speed(), unit),
            format_latency(result.ping()),
            format_latency(result.jitter()),
            result.signal_quality(),
        );
    }
    out
}

/// Prints progress to stderr as plain lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextProgress;

impl ProgressCallback for TextProgress {
    fn on_progress(&self, event: ProgressEvent) {
        if let Some(line) = progress_line(&event) {
            eprintln!("{}", line);
        }
    }
}

/// The line shown for a progress event, if any.
pub fn progress_line(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::Progress { percent, message, .. } => {
            Some(format!("{} {}", format!("[{:>3}%]", percent).dimmed(), message))
        }
        ProgressEvent::LatencySample { .. } => None,
        ProgressEvent::ThroughputTrial { direction, speed_mbps, current, total, fallback } => {
            let label = match direction {
                BandwidthDirection::Download => "download",
                BandwidthDirection::Upload => "upload",
            };
            let mut line = format!(
                "       {} trial {}/{}: {:.2} Mbps",
                label, current, total, speed_mbps
            );
            if *fallback {
                line.push_str(&" (estimated)".yellow().to_string());
            }
            Some(line)
        }
        ProgressEvent::Warning(message) => {
            Some(format!("{} {}", "warning:".yellow().bold(), message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{summarize, Trends};
    use crate::diagnostics::diagnose;
    use crate::history::tests::result_at;
    use crate::progress::Phase;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_detect_mode() {
        assert_eq!(DisplayMode::detect(true, true), DisplayMode::Json);
        assert_eq!(DisplayMode::detect(true, false), DisplayMode::Json);
        assert_eq!(DisplayMode::detect(false, true), DisplayMode::Text);
        assert_eq!(DisplayMode::detect(false, false), DisplayMode::Silent);
        assert!(DisplayMode::Text.shows_progress());
        assert!(!DisplayMode::Silent.shows_progress());
    }

    #[test]
    fn test_speed_color_thresholds() {
        assert_eq!(speed_color(100.0), Color::Green);
        assert_eq!(speed_color(99.9), Color::Yellow);
        assert_eq!(speed_color(25.0), Color::Yellow);
        assert_eq!(speed_color(24.9), Color::Red);
    }

    #[test]
    fn test_format_speed_units() {
        assert_eq!(format_speed(80.0, SpeedUnit::Mbps), "80.00 Mbps");
        assert_eq!(format_speed(80.0, SpeedUnit::MBps), "10.00 MB/s");
        assert_eq!(format_speed(1.5, SpeedUnit::Kbps), "1500.00 Kbps");
        assert_eq!(format_speed(1250.0, SpeedUnit::Gbps), "1.25 Gbps");
    }

    #[test]
    fn test_format_trend() {
        assert_eq!(format_trend(12.0, false), "+12%");
        assert_eq!(format_trend(-8.0, false), "-8%");
        // ping going down is an improvement
        assert_eq!(format_trend(-8.0, true), "+8%");
        assert_eq!(format_trend(0.0, true), "+0%");
    }

    #[test]
    fn test_render_result() {
        plain();
        let text = render_result(&result_at(0, 120.0), SpeedUnit::Mbps);

        assert!(text.contains("120.00 Mbps (Excellent)"));
        assert!(text.contains("30.00 Mbps (Good)"));
        assert!(text.contains("Consistency:"));
        assert_eq!(text.lines().count(), 7);
    }

    #[test]
    fn test_render_diagnosis() {
        plain();
        let text = render_diagnosis(&diagnose(&result_at(0, 4.0)));

        assert!(text.contains("Very slow download speed detected"));
        assert!(text.contains("Slow Download Speed"));
        assert!(text.contains("Video calls"));
    }

    #[test]
    fn test_render_summary() {
        plain();
        let history = [result_at(10, 60.0), result_at(0, 40.0)];
        let now = Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).unwrap();
        let summary = summarize(&history, TimeWindow::All, &now);

        let text = render_summary(&summary, TimeWindow::All, SpeedUnit::Mbps);
        assert!(text.contains("Tests:"));
        assert!(text.contains("50.00 Mbps"));
        assert!(text.contains("+50%"));
        assert!(text.contains("0:00 - 1:00"));

        let empty = render_summary(&AnalyticsSummary::default(), TimeWindow::Day, SpeedUnit::Mbps);
        assert!(empty.contains("No tests in this period."));
    }

    #[test]
    fn test_render_summary_flips_ping_trend() {
        plain();
        let summary = AnalyticsSummary {
            total_tests: 4,
            trend_percent: Trends { download: 0.0, upload: 0.0, ping: -25.0 },
            ..AnalyticsSummary::default()
        };

        let text = render_summary(&summary, TimeWindow::Week, SpeedUnit::Mbps);
        let ping_line = text.lines().find(|line| line.contains("Avg Ping")).unwrap();
        assert!(ping_line.ends_with("+25%"));
    }

    #[test]
    fn test_render_history() {
        plain();
        assert_eq!(render_history(&[], SpeedUnit::Mbps), "No stored results.\n");

        let text = render_history(&[result_at(1, 10.0), result_at(0, 20.0)], SpeedUnit::Kbps);
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("2026-05-01 00:01"));
        assert!(text.contains("10000.00 Kbps"));
    }

    #[test]
    fn test_progress_lines() {
        plain();
        let progress = ProgressEvent::Progress {
            phase: Phase::Download,
            percent: 45,
            message: "Testing download... 50%".to_string(),
        };
        assert_eq!(progress_line(&progress).unwrap(), "[ 45%] Testing download... 50%");

        let sample = ProgressEvent::LatencySample { value_ms: 1.0, current: 1, total: 10, fallback: false };
        assert!(progress_line(&sample).is_none());

        let trial = ProgressEvent::ThroughputTrial {
            direction: BandwidthDirection::Upload,
            speed_mbps: 11.0,
            current: 2,
            total: 3,
            fallback: true,
        };
        assert!(progress_line(&trial).unwrap().ends_with("upload trial 2/3: 11.00 Mbps (estimated)"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn display_mode_selection_property(json_flag in any::<bool>(), is_tty in any::<bool>()) {
            let mode = DisplayMode::detect(json_flag, is_tty);

            if json_flag {
                prop_assert_eq!(mode, DisplayMode::Json);
            } else if is_tty {
                prop_assert_eq!(mode, DisplayMode::Text);
            } else {
                prop_assert_eq!(mode, DisplayMode::Silent);
            }
        }

        #[test]
        fn trend_flip_is_symmetric(percent in -500.0f64..500.0) {
            let up = format_trend(percent, false);
            let flipped = format_trend(-percent, true);
            prop_assert_eq!(up, flipped);
        }
    }
}
