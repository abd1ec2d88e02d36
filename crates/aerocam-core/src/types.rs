use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lighting mode at the camera location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayNight {
    Day,
    Night,
}

impl DayNight {
    pub fn from_is_day(is_day: bool) -> Self {
        if is_day {
            DayNight::Day
        } else {
            DayNight::Night
        }
    }

    pub fn is_day(self) -> bool {
        self == DayNight::Day
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayNight::Day => "day",
            DayNight::Night => "night",
        }
    }
}

impl fmt::Display for DayNight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DayNight {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(DayNight::Day),
            "night" => Ok(DayNight::Night),
            other => Err(format!("unknown day/night mode: {other}")),
        }
    }
}

/// Sunrise and sunset for one UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

impl SunTimes {
    /// True when `at` falls in `[sunrise, sunset)`.
    pub fn is_day_at(&self, at: DateTime<Utc>) -> bool {
        self.sunrise <= at && at < self.sunset
    }
}

/// Outcome of a sun-time lookup for a single date.
///
/// At high latitudes the sun may stay above (or below) the horizon for the
/// whole day; those days have no transition instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolarDay {
    Regular(SunTimes),
    PolarDay,
    PolarNight,
}

impl SolarDay {
    pub fn times(&self) -> Option<SunTimes> {
        match self {
            SolarDay::Regular(t) => Some(*t),
            SolarDay::PolarDay | SolarDay::PolarNight => None,
        }
    }
}

/// Destination kind selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMethod {
    Api,
    Sftp,
}

impl fmt::Display for UploadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadMethod::Api => write!(f, "API"),
            UploadMethod::Sftp => write!(f, "SFTP"),
        }
    }
}

/// Format a UTC instant the way every wire format in this project expects it:
/// RFC 3339, second precision, `Z` suffix.
pub fn format_utc(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
