//! On-demand summaries over a time-filtered view of the history.
//!
//! Nothing here is persisted. A summary is recomputed from the history
//! every time it is requested.

use crate::results::ProbeResult;
use crate::stats::{max, mean, min, round_to};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How far back a summary looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    /// Last 24 hours
    Day,
    /// Last 7 days
    Week,
    /// Last 30 days
    #[default]
    Month,
    /// Last 365 days
    Year,
    /// Entire history
    All,
}

impl TimeWindow {
    /// Earliest timestamp included in this window, or `None` for `All`.
    pub fn cutoff<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
        let now = now.with_timezone(&Utc);
        let span = match self {
            TimeWindow::Day => Duration::hours(24),
            TimeWindow::Week => Duration::days(7),
            TimeWindow::Month => Duration::days(30),
            TimeWindow::Year => Duration::days(365),
            TimeWindow::All => return None,
        };

        Some(now - span)
    }

    /// Whether a result falls inside the window ending at `now`.
    pub fn contains<Tz: TimeZone>(
        &self,
        result: &ProbeResult,
        now: &DateTime<Tz>,
    ) -> bool {
        match self.cutoff(now) {
            Some(cutoff) => result.timestamp() >= cutoff,
            None => true,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeWindow::Day => "24h",
            TimeWindow::Week => "7d",
            TimeWindow::Month => "30d",
            TimeWindow::Year => "1y",
            TimeWindow::All => "all",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "24h" | "day" => Ok(TimeWindow::Day),
            "7d" | "week" => Ok(TimeWindow::Week),
            "30d" | "month" => Ok(TimeWindow::Month),
            "1y" | "year" => Ok(TimeWindow::Year),
            "all" => Ok(TimeWindow::All),
            other => Err(format!(
                "unknown time window '{}', expected one of 24h, 7d, 30d, 1y, all",
                other
            )),
        }
    }
}

/// Trend of each headline metric, in whole percent.
///
/// Positive means the metric went up. For ping that is a regression; the
/// sign is left as-is here and flipped where it is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Trends {
    pub download: f64,
    pub upload: f64,
    pub ping: f64,
}

/// Summary statistics over a window of the history.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_tests: usize,
    pub avg_download: f64,
    pub avg_upload: f64,
    pub avg_ping: f64,
    pub max_download: f64,
    pub max_upload: f64,
    pub min_ping: f64,
    pub trend_percent: Trends,
    /// Tests per day so far this calendar month
    pub test_frequency: f64,
    /// Hour of day (0-23) with the most tests
    pub peak_hour: Option<u32>,
}

impl AnalyticsSummary {
    pub fn has_data(&self) -> bool {
        self.total_tests > 0
    }
}

/// Summarize the results of `history` (newest-first) that fall inside
/// `window`, as seen from `now`.
///
/// An empty window yields zero averages, extremes and trends rather than
/// NaN. Test frequency and the peak hour describe the whole history and
/// are filled in either way.
pub fn summarize<Tz: TimeZone>(
    history: &[ProbeResult],
    window: TimeWindow,
    now: &DateTime<Tz>,
) -> AnalyticsSummary {
    let filtered: Vec<&ProbeResult> =
        history.iter().filter(|result| window.contains(result, now)).collect();

    let column = |field: fn(&ProbeResult) -> f64| -> Vec<f64> {
        filtered.iter().map(|result| field(*result)).collect()
    };

    let downloads = column(ProbeResult::download_speed);
    let uploads = column(ProbeResult::upload_speed);
    let pings = column(ProbeResult::ping);

    // history is newest-first, trends read oldest-first
    let chronological = |values: &[f64]| -> Vec<f64> {
        values.iter().rev().copied().collect()
    };

    AnalyticsSummary {
        total_tests: filtered.len(),
        avg_download: mean(&downloads).unwrap_or(0.0),
        avg_upload: mean(&uploads).unwrap_or(0.0),
        avg_ping: mean(&pings).unwrap_or(0.0),
        max_download: max(&downloads).unwrap_or(0.0),
        max_upload: max(&uploads).unwrap_or(0.0),
        min_ping: min(&pings).unwrap_or(0.0),
        trend_percent: Trends {
            download: trend_percent(&chronological(&downloads)),
            upload: trend_percent(&chronological(&uploads)),
            ping: trend_percent(&chronological(&pings)),
        },
        test_frequency: test_frequency(history, now),
        peak_hour: peak_hour(history, &now.timezone()),
    }
}

/// Percentage change from the first half of `series` to the second.
///
/// `series` must be oldest-first. An odd middle element belongs to the
/// second half. Fewer than two points, or a first half averaging zero,
/// yields 0.
///
/// # Example
/// ```
/// use speed_lens::analytics::trend_percent;
///
/// assert_eq!(trend_percent(&[10.0, 10.0, 20.0, 20.0]), 100.0);
/// assert_eq!(trend_percent(&[40.0]), 0.0);
/// ```
pub fn trend_percent(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }

    let (first, second) = series.split_at(series.len() / 2);
    let (Some(first_avg), Some(second_avg)) = (mean(first), mean(second)) else {
        return 0.0;
    };

    if first_avg == 0.0 {
        return 0.0;
    }

    ((second_avg - first_avg) / first_avg * 100.0).round()
}

/// Average tests per day in the calendar month containing `now`.
///
/// Divides by the days elapsed so far (`now`'s day of month), rounded to
/// one decimal.
pub fn test_frequency<Tz: TimeZone>(
    history: &[ProbeResult],
    now: &DateTime<Tz>,
) -> f64 {
    let tz = now.timezone();
    let this_month = history
        .iter()
        .map(|result| result.timestamp().with_timezone(&tz))
        .filter(|local| local.year() == now.year() && local.month() == now.month())
        .count();

    if this_month == 0 {
        return 0.0;
    }

    round_to(this_month as f64 / now.day() as f64, 1)
}

/// Hour of day, in `tz`, with the most tests. Ties go to the earliest
/// hour.
pub fn peak_hour<Tz: TimeZone>(history: &[ProbeResult], tz: &Tz) -> Option<u32> {
    let mut counts = [0usize; 24];
    for result in history {
        let hour = result.timestamp().with_timezone(tz).hour() as usize;
        counts[hour] += 1;
    }

    let (hour, count) = counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (hour, &count)| {
            if count > best.1 {
                (hour, count)
            } else {
                best
            }
        });

    (count > 0).then_some(hour as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurements::Estimates;
    use crate::scoring::ScoreCard;
    use chrono::FixedOffset;
    use proptest::prelude::*;

    fn result(at: DateTime<Utc>, download: f64, upload: f64, ping: f64) -> ProbeResult {
        let estimates = Estimates {
            ping_ms: ping,
            jitter_ms: 2.0,
            packet_loss_percent: 0.0,
            download_mbps: download,
            upload_mbps: upload,
        };
        let scores = ScoreCard { signal_quality: 100.0, consistency: 100.0 };
        ProbeResult::new(at, &estimates, &scores)
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, day, hour, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_time_window() {
        assert_eq!("24h".parse::<TimeWindow>(), Ok(TimeWindow::Day));
        assert_eq!("7d".parse::<TimeWindow>(), Ok(TimeWindow::Week));
        assert_eq!("30d".parse::<TimeWindow>(), Ok(TimeWindow::Month));
        assert_eq!("1Y".parse::<TimeWindow>(), Ok(TimeWindow::Year));
        assert_eq!("all".parse::<TimeWindow>(), Ok(TimeWindow::All));
        assert!("fortnight".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn test_cutoff() {
        assert_eq!(
            TimeWindow::Day.cutoff(&now()),
            Some(Utc.with_ymd_and_hms(2026, 6, 9, 12, 0, 0).unwrap())
        );
        assert_eq!(
            TimeWindow::Week.cutoff(&now()),
            Some(Utc.with_ymd_and_hms(2026, 6, 3, 12, 0, 0).unwrap())
        );
        assert_eq!(TimeWindow::All.cutoff(&now()), None);
    }

    #[test]
    fn test_trend_percent_doubling() {
        assert_eq!(trend_percent(&[10.0, 10.0, 20.0, 20.0]), 100.0);
    }

    #[test]
    fn test_trend_percent_degenerate_series() {
        assert_eq!(trend_percent(&[]), 0.0);
        assert_eq!(trend_percent(&[50.0]), 0.0);
        assert_eq!(trend_percent(&[0.0, 0.0, 10.0]), 0.0);
    }

    #[test]
    fn test_trend_percent_odd_length() {
        // first half [40], second half [20, 30]
        assert_eq!(trend_percent(&[40.0, 20.0, 30.0]), -38.0);
    }

    #[test]
    fn test_summarize_empty_history() {
        let summary = summarize(&[], TimeWindow::All, &now());

        assert_eq!(summary, AnalyticsSummary::default());
        assert!(!summary.has_data());
        assert!(!summary.avg_download.is_nan());
    }

    #[test]
    fn test_summarize_empty_window_keeps_whole_history_fields() {
        let history = vec![result(at(1, 8), 50.0, 10.0, 20.0)];
        let summary = summarize(&history, TimeWindow::Day, &now());

        assert_eq!(summary.total_tests, 0);
        assert_eq!(summary.avg_download, 0.0);
        assert_eq!(summary.min_ping, 0.0);
        assert_eq!(summary.trend_percent, Trends::default());
        assert_eq!(summary.peak_hour, Some(8));
        assert_eq!(summary.test_frequency, 0.1);
    }

    #[test]
    fn test_summarize_reductions_and_trend_order() {
        // newest first: the series improves over time
        let history = vec![
            result(at(10, 9), 20.0, 8.0, 10.0),
            result(at(9, 9), 20.0, 8.0, 10.0),
            result(at(8, 9), 10.0, 4.0, 20.0),
            result(at(7, 9), 10.0, 4.0, 20.0),
        ];
        let summary = summarize(&history, TimeWindow::All, &now());

        assert_eq!(summary.total_tests, 4);
        assert_eq!(summary.avg_download, 15.0);
        assert_eq!(summary.avg_upload, 6.0);
        assert_eq!(summary.avg_ping, 15.0);
        assert_eq!(summary.max_download, 20.0);
        assert_eq!(summary.max_upload, 8.0);
        assert_eq!(summary.min_ping, 10.0);
        assert_eq!(summary.trend_percent.download, 100.0);
        assert_eq!(summary.trend_percent.upload, 100.0);
        assert_eq!(summary.trend_percent.ping, -50.0);
    }

    #[test]
    fn test_summarize_filters_by_window() {
        let history = vec![
            result(at(10, 6), 90.0, 9.0, 10.0),
            result(at(5, 6), 30.0, 3.0, 30.0),
            result(Utc.with_ymd_and_hms(2026, 1, 5, 6, 0, 0).unwrap(), 1.0, 1.0, 300.0),
        ];

        let week = summarize(&history, TimeWindow::Week, &now());
        assert_eq!(week.total_tests, 2);
        assert_eq!(week.avg_download, 60.0);

        let year = summarize(&history, TimeWindow::Year, &now());
        assert_eq!(year.total_tests, 3);
        assert_eq!(year.max_download, 90.0);
        assert_eq!(year.min_ping, 10.0);
    }

    #[test]
    fn test_test_frequency_counts_this_month_only() {
        let history = vec![
            result(at(10, 1), 1.0, 1.0, 1.0),
            result(at(9, 1), 1.0, 1.0, 1.0),
            result(at(2, 1), 1.0, 1.0, 1.0),
            result(Utc.with_ymd_and_hms(2026, 5, 31, 1, 0, 0).unwrap(), 1.0, 1.0, 1.0),
            result(Utc.with_ymd_and_hms(2025, 6, 3, 1, 0, 0).unwrap(), 1.0, 1.0, 1.0),
        ];

        // 3 tests over 10 days
        assert_eq!(test_frequency(&history, &now()), 0.3);
        assert_eq!(test_frequency(&[], &now()), 0.0);
    }

    #[test]
    fn test_peak_hour_ties_go_to_earliest() {
        let history = vec![
            result(at(1, 21), 1.0, 1.0, 1.0),
            result(at(2, 21), 1.0, 1.0, 1.0),
            result(at(3, 7), 1.0, 1.0, 1.0),
            result(at(4, 7), 1.0, 1.0, 1.0),
            result(at(5, 13), 1.0, 1.0, 1.0),
        ];

        assert_eq!(peak_hour(&history, &Utc), Some(7));
        assert_eq!(peak_hour(&[], &Utc), None);
    }

    #[test]
    fn test_peak_hour_uses_local_time() {
        let history = vec![result(at(1, 23), 1.0, 1.0, 1.0)];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        assert_eq!(peak_hour(&history, &plus_two), Some(1));
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let history = vec![result(at(10, 9), 20.0, 8.0, 10.0)];
        let json = serde_json::to_string(&summarize(&history, TimeWindow::All, &now()))
            .unwrap();

        assert!(json.contains("\"totalTests\":1"));
        assert!(json.contains("\"trendPercent\":{"));
        assert!(json.contains("\"peakHour\":9"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// No summary field is ever NaN, whatever the window.
        #[test]
        fn summary_is_never_nan(
            values in proptest::collection::vec((0.0f64..1000.0, 0.0f64..200.0, 0.0f64..500.0, 0i64..2000), 0..50),
        ) {
            let history: Vec<ProbeResult> = values
                .iter()
                .map(|(d, u, p, hours)| result(now() - Duration::hours(*hours), *d, *u, *p))
                .collect();

            for window in [TimeWindow::Day, TimeWindow::Week, TimeWindow::Month, TimeWindow::Year, TimeWindow::All] {
                let summary = summarize(&history, window, &now());
                for value in [
                    summary.avg_download, summary.avg_upload, summary.avg_ping,
                    summary.max_download, summary.max_upload, summary.min_ping,
                    summary.trend_percent.download, summary.trend_percent.upload,
                    summary.trend_percent.ping, summary.test_frequency,
                ] {
                    prop_assert!(value.is_finite());
                }
                prop_assert!(summary.total_tests <= history.len());
            }
        }
    }
}
