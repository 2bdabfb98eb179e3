//! User preferences, persisted next to the history.

use crate::errors::SpeedLensError;
use crate::history::{Storage, SETTINGS_KEY};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit used when printing speeds. Stored results are always Mbps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpeedUnit {
    #[default]
    Mbps,
    Kbps,
    Gbps,
    #[serde(rename = "MBps")]
    MBps,
}

impl SpeedUnit {
    /// Convert a speed in Mbps to this unit.
    pub fn convert(&self, mbps: f64) -> f64 {
        match self {
            SpeedUnit::Mbps => mbps,
            SpeedUnit::Kbps => mbps * 1000.0,
            SpeedUnit::Gbps => mbps / 1000.0,
            SpeedUnit::MBps => mbps / 8.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SpeedUnit::Mbps => "Mbps",
            SpeedUnit::Kbps => "Kbps",
            SpeedUnit::Gbps => "Gbps",
            SpeedUnit::MBps => "MB/s",
        }
    }
}

impl fmt::Display for SpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for SpeedUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // case matters: Mbps and MBps differ by a factor of 8
        match s.trim() {
            "Mbps" | "mbps" => Ok(SpeedUnit::Mbps),
            "Kbps" | "kbps" => Ok(SpeedUnit::Kbps),
            "Gbps" | "gbps" => Ok(SpeedUnit::Gbps),
            "MBps" | "MB/s" => Ok(SpeedUnit::MBps),
            other => Err(format!(
                "unknown speed unit '{}', expected Mbps, Kbps, Gbps or MBps",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub speed_unit: SpeedUnit,
    pub notifications: bool,
    /// Watch instead of running once when no command is given
    pub auto_test: bool,
    pub auto_test_interval_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            speed_unit: SpeedUnit::Mbps,
            notifications: true,
            auto_test: false,
            auto_test_interval_minutes: 30,
        }
    }
}

impl Settings {
    /// Load settings from `storage`, falling back to defaults when none are
    /// stored or the stored value is unreadable.
    pub fn load<S: Storage>(storage: &S) -> Self {
        let stored = match storage.load(SETTINGS_KEY) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Could not read settings, using defaults: {}", e);
                return Self::default();
            }
        };

        match stored.map(|json| serde_json::from_str::<Settings>(&json)) {
            Some(Ok(settings)) => settings,
            Some(Err(e)) => {
                warn!("Discarding unreadable settings: {}", e);
                Self::default()
            }
            None => Self::default(),
        }
    }

    pub fn save<S: Storage>(&self, storage: &S) -> Result<(), SpeedLensError> {
        let json = serde_json::to_string(self)?;
        storage.save(SETTINGS_KEY, &json)
    }

    /// Reject values that cannot be acted on.
    pub fn validate(&self) -> Result<(), SpeedLensError> {
        if self.auto_test_interval_minutes == 0 {
            return Err(SpeedLensError::config(
                "auto-test interval must be at least one minute",
            ));
        }

        Ok(())
    }
}
