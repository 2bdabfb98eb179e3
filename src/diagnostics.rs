//! Human-facing findings about a single result: advice, detected issues
//! and how well common activities would run on the measured connection.

use crate::results::ProbeResult;
use crate::scoring::{rate_health, result_health, Rating};
use serde::Serialize;

/// How a finding should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub severity: Severity,
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: &'static str,
}

/// Advice for a result, most pressing first.
pub fn recommendations(result: &ProbeResult) -> Vec<Recommendation> {
    let mut found = Vec::new();

    if result.download_speed() < 25.0 {
        found.push(Recommendation {
            severity: Severity::Warning,
            title: "Slow Download Speed",
            description: "Your download speed is below 25 Mbps. Consider upgrading your plan or checking for network issues.",
        });
    }

    if result.upload_speed() < 10.0 {
        found.push(Recommendation {
            severity: Severity::Info,
            title: "Low Upload Speed",
            description: "Upload speed is below 10 Mbps. This may affect video calls and file uploads.",
        });
    }

    if result.ping() > 100.0 {
        found.push(Recommendation {
            severity: Severity::Error,
            title: "High Latency",
            description: "Your ping is over 100 ms. This may cause issues with online gaming and video calls.",
        });
    }

    if result.jitter() > 30.0 {
        found.push(Recommendation {
            severity: Severity::Warning,
            title: "High Jitter",
            description: "Network jitter is high. This can cause unstable connections for real-time applications.",
        });
    }

    if result.signal_quality() > 90.0 && result.download_speed() > 50.0 {
        found.push(Recommendation {
            severity: Severity::Success,
            title: "Excellent Connection",
            description: "Your connection is performing excellently. Suitable for streaming, gaming and video calls.",
        });
    }

    found
}

/// Problems detected in a result. Empty when nothing is wrong.
pub fn issues(result: &ProbeResult) -> Vec<Issue> {
    let mut found = Vec::new();

    if result.download_speed() < 5.0 {
        found.push(Issue {
            severity: Severity::Error,
            message: "Very slow download speed detected",
        });
    }

    if result.upload_speed() < 1.0 {
        found.push(Issue {
            severity: Severity::Warning,
            message: "Upload speed is below recommended levels",
        });
    }

    if result.ping() > 100.0 {
        found.push(Issue {
            severity: Severity::Warning,
            message: "High latency detected, real-time applications may suffer",
        });
    }

    if result.jitter() > 30.0 {
        found.push(Issue {
            severity: Severity::Warning,
            message: "High jitter detected, connection may be unstable",
        });
    }

    found
}

/// Everyday activities and the download speed (Mbps) each needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Activity {
    HdStreaming,
    Gaming,
    VideoCall,
    LargeDownloads,
}

impl Activity {
    pub const ALL: [Activity; 4] = [
        Activity::HdStreaming,
        Activity::Gaming,
        Activity::VideoCall,
        Activity::LargeDownloads,
    ];

    pub fn required_mbps(&self) -> f64 {
        match self {
            Activity::HdStreaming => 5.0,
            Activity::Gaming => 3.0,
            Activity::VideoCall => 1.5,
            Activity::LargeDownloads => 10.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Activity::HdStreaming => "HD video streaming",
            Activity::Gaming => "Online gaming",
            Activity::VideoCall => "Video calls",
            Activity::LargeDownloads => "Large downloads",
        }
    }

    /// Rate `download_mbps` against this activity's requirement.
    pub fn rate(&self, download_mbps: f64) -> Rating {
        let required = self.required_mbps();

        if download_mbps >= required * 1.5 {
            Rating::Excellent
        } else if download_mbps >= required {
            Rating::Good
        } else if download_mbps >= required * 0.7 {
            Rating::Fair
        } else {
            Rating::Poor
        }
    }
}

/// Rating of every [`Activity`] at the given download speed.
pub fn activity_readiness(download_mbps: f64) -> Vec<(Activity, Rating)> {
    Activity::ALL
        .iter()
        .map(|activity| (*activity, activity.rate(download_mbps)))
        .collect()
}

/// Everything diagnosable about one result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub health_score: u32,
    pub health: Rating,
    pub recommendations: Vec<Recommendation>,
    pub issues: Vec<Issue>,
    pub activities: Vec<(Activity, Rating)>,
}

pub fn diagnose(result: &ProbeResult) -> Diagnosis {
    let health_score = result_health(result);

    Diagnosis {
        health_score,
        health: rate_health(health_score),
        recommendations: recommendations(result),
        issues: issues(result),
        activities: activity_readiness(result.download_speed()),
    }
}
