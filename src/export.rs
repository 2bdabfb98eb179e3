//! CSV and JSON renderings of the history.

use crate::analytics::AnalyticsSummary;
use crate::errors::SpeedLensError;
use crate::results::ProbeResult;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt::Write;
use std::str::FromStr;

pub const CSV_HEADER: &str = "Date,Download (Mbps),Upload (Mbps),Ping (ms),Jitter (ms),Signal Quality (%),Consistency (%),Packet Loss (%)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format '{}', expected csv or json", other)),
        }
    }
}

/// One row per result in history order, followed by an analytics block
/// when `summary` is given.
pub fn to_csv(history: &[ProbeResult], summary: Option<&AnalyticsSummary>) -> String {
    let mut csv = String::new();
    csv.push_str(CSV_HEADER);
    csv.push('\n');

    for result in history {
        // writing to a String cannot fail
        let _ = writeln!(
            csv,
            "{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2}",
            result.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true),
            result.download_speed(),
            result.upload_speed(),
            result.ping(),
            result.jitter(),
            result.signal_quality(),
            result.consistency(),
            result.packet_loss(),
        );
    }

    if let Some(summary) = summary {
        csv.push_str("\nAnalytics Summary\n");
        let peak = summary
            .peak_hour
            .map(|hour| format!("{}:00 - {}:00", hour, hour + 1))
            .unwrap_or_else(|| "N/A".to_string());

        let rows = [
            ("Total Tests", summary.total_tests.to_string()),
            ("Average Download", format!("{:.2} Mbps", summary.avg_download)),
            ("Average Upload", format!("{:.2} Mbps", summary.avg_upload)),
            ("Average Ping", format!("{:.2} ms", summary.avg_ping)),
            ("Max Download", format!("{:.2} Mbps", summary.max_download)),
            ("Max Upload", format!("{:.2} Mbps", summary.max_upload)),
            ("Min Ping", format!("{:.2} ms", summary.min_ping)),
            ("Tests Per Day", format!("{:.1}", summary.test_frequency)),
            ("Peak Hour", peak),
        ];
        for (key, value) in rows {
            let _ = writeln!(csv, "{},{}", key, value);
        }
    }

    csv
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    export_date: DateTime<Utc>,
    test_results: &'a [ProbeResult],
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a AnalyticsSummary>,
}

/// Pretty-printed `{ exportDate, testResults, summary? }` document.
pub fn to_json(
    history: &[ProbeResult],
    summary: Option<&AnalyticsSummary>,
    export_date: DateTime<Utc>,
) -> Result<String, SpeedLensError> {
    let export = JsonExport { export_date, test_results: history, summary };
    Ok(serde_json::to_string_pretty(&export)?)
}
