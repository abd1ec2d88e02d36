use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{AerocamError, Result};
use crate::types::{DayNight, UploadMethod};

pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SFTP_PORT: u16 = 22;
pub const DEFAULT_DEBUG_DAY_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_DEBUG_NIGHT_INTERVAL_SECS: u64 = 30;
pub const REEVALUATE_INTERVAL_SECS: u64 = 300; // 5 minutes
pub const DEBUG_REEVALUATE_INTERVAL_SECS: u64 = 30;
pub const MAX_INTERVAL_SECS: u64 = 86_400;
pub const MAX_DEBUG_INTERVAL_SECS: u64 = 3_600;
pub const DEFAULT_METAR_API_URL: &str = "https://aviationweather.gov/api/data/metar";
pub const DEFAULT_LICENSE_MARK: &str = "This work is licensed under CC BY-SA 4.0. To view a copy of this license, visit https://creativecommons.org/licenses/by-sa/4.0/";

/// Top-level config (aerocam.toml + AEROCAM_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AerocamConfig {
    pub camera: CameraConfig,
    pub location: LocationConfig,
    pub schedule: ScheduleConfig,
    pub upload: UploadConfig,
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub metar: MetarConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// RTSP URL, with or without embedded credentials.
    pub rtsp_url: String,
    /// Username to splice into `rtsp_url` when it carries no credentials.
    pub rtsp_user: Option<String>,
    pub rtsp_password: Option<String>,
}

impl CameraConfig {
    /// The RTSP URL with any `user:pass@` section masked, safe for logs.
    pub fn redacted_url(&self) -> String {
        match self.rtsp_url.split_once("://") {
            Some((scheme, rest)) => match rest.rsplit_once('@') {
                Some((_, host)) => format!("{scheme}://***@{host}"),
                None => self.rtsp_url.clone(),
            },
            None => self.rtsp_url.clone(),
        }
    }
}

/// Camera position. All times derived from it are UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Location identifier, usually the airfield ICAO code.
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Free-text heading, e.g. "060° RWY 06".
    pub camera_heading: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub day_interval_seconds: u64,
    pub night_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_method")]
    pub method: UploadMethod,
    pub api: Option<ApiConfig>,
    pub sftp: Option<SftpConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub url: String,
    pub key: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub remote_path: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u64,
    /// Public base URL the uploaded images are served from. When unset,
    /// `cam.json` carries bare filenames.
    pub image_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub provider_name: String,
    pub camera_name: String,
    /// TrueType/OpenType font for the burned-in text. When unset the usual
    /// system locations are searched.
    pub font_path: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// Text colour: a name (`white`, `black`, `yellow`...) or `#rrggbb`.
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default = "bool_true")]
    pub shadow_enabled: bool,
    #[serde(default = "default_overlay_padding")]
    pub padding: u32,
    #[serde(default = "default_line_spacing")]
    pub line_spacing: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetarConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub icao_code: String,
    #[serde(default = "default_metar_api_url")]
    pub api_url: String,
    /// Print the raw METAR/TAF block on the full artifact.
    #[serde(default = "bool_true")]
    pub raw_metar_enabled: bool,
}

impl Default for MetarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            icao_code: String::new(),
            api_url: default_metar_api_url(),
            raw_metar_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_license_mark")]
    pub license_mark: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            license_mark: default_license_mark(),
        }
    }
}

/// Development settings.
///
/// When `enabled`, the short debug intervals replace the schedule intervals,
/// transitions are not looked ahead, and the schedule is re-evaluated every
/// 30 seconds instead of every 5 minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,
    pub day_night_override: Option<DayNight>,
    #[serde(default = "default_debug_day_interval")]
    pub day_interval_seconds: u64,
    #[serde(default = "default_debug_night_interval")]
    pub night_interval_seconds: u64,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            day_night_override: None,
            day_interval_seconds: DEFAULT_DEBUG_DAY_INTERVAL_SECS,
            night_interval_seconds: DEFAULT_DEBUG_NIGHT_INTERVAL_SECS,
        }
    }
}

/// Legacy environment toggles (`DEBUG_MODE`, `DEBUG_DAY_NIGHT_MODE`) kept for
/// deployments whose unit files still set them.
#[derive(Debug, Clone, Default)]
pub struct LegacyDebugEnv {
    pub debug_mode: Option<String>,
    pub day_night_mode: Option<String>,
}

impl LegacyDebugEnv {
    pub fn from_env() -> Self {
        Self {
            debug_mode: std::env::var("DEBUG_MODE").ok(),
            day_night_mode: std::env::var("DEBUG_DAY_NIGHT_MODE").ok(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_upload_method() -> UploadMethod {
    UploadMethod::Api
}
fn default_api_timeout() -> u64 {
    DEFAULT_API_TIMEOUT_SECS
}
fn default_sftp_port() -> u16 {
    DEFAULT_SFTP_PORT
}
fn default_metar_api_url() -> String {
    DEFAULT_METAR_API_URL.to_string()
}
fn default_license_mark() -> String {
    DEFAULT_LICENSE_MARK.to_string()
}
fn default_font_size() -> u32 {
    16
}
fn default_font_color() -> String {
    "white".to_string()
}
fn default_overlay_padding() -> u32 {
    15
}
fn default_line_spacing() -> u32 {
    4
}
fn default_debug_day_interval() -> u64 {
    DEFAULT_DEBUG_DAY_INTERVAL_SECS
}
fn default_debug_night_interval() -> u64 {
    DEFAULT_DEBUG_NIGHT_INTERVAL_SECS
}

impl AerocamConfig {
    /// Load config from a TOML file with AEROCAM_* env var overrides.
    ///
    /// Path resolution: explicit argument, then ~/.aerocam/aerocam.toml.
    /// Nested keys use a double underscore, e.g.
    /// `AEROCAM_UPLOAD__API__KEY=...`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        if !Path::new(&path).exists() {
            return Err(AerocamError::Config(format!(
                "config file not found: {path}"
            )));
        }

        let figment = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("AEROCAM_").split("__"));
        Self::from_figment(figment, LegacyDebugEnv::from_env())
    }

    /// Parse an in-memory TOML document; legacy env toggles are ignored.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::from_figment(
            Figment::new().merge(Toml::string(toml)),
            LegacyDebugEnv::default(),
        )
    }

    fn from_figment(figment: Figment, legacy: LegacyDebugEnv) -> Result<Self> {
        let mut config: AerocamConfig = figment
            .extract()
            .map_err(|e| AerocamError::Config(e.to_string()))?;
        config.apply_legacy_env(&legacy);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn apply_legacy_env(&mut self, legacy: &LegacyDebugEnv) {
        if let Some(ref flag) = legacy.debug_mode {
            if flag.trim().eq_ignore_ascii_case("true") {
                self.debug.enabled = true;
            }
        }
        if let Some(ref mode) = legacy.day_night_mode {
            match mode.parse::<DayNight>() {
                Ok(m) => self.debug.day_night_override = Some(m),
                Err(_) if mode.trim().is_empty() => {}
                Err(e) => tracing::warn!("ignoring DEBUG_DAY_NIGHT_MODE: {e}"),
            }
        }
    }

    fn normalize(&mut self) {
        self.metar.icao_code = self.metar.icao_code.trim().to_ascii_uppercase();
    }

    /// Check value ranges and cross-field requirements.
    pub fn validate(&self) -> Result<()> {
        if !self.camera.rtsp_url.starts_with("rtsp://") {
            return Err(AerocamError::invalid(
                "camera.rtsp_url",
                "RTSP URL must start with rtsp://",
            ));
        }
        if self.location.name.trim().is_empty() {
            return Err(AerocamError::invalid("location.name", "must not be empty"));
        }
        if !(-90.0..=90.0).contains(&self.location.latitude) {
            return Err(AerocamError::invalid(
                "location.latitude",
                "must be between -90 and 90",
            ));
        }
        if !(-180.0..=180.0).contains(&self.location.longitude) {
            return Err(AerocamError::invalid(
                "location.longitude",
                "must be between -180 and 180",
            ));
        }
        if self.location.camera_heading.trim().is_empty() {
            return Err(AerocamError::invalid(
                "location.camera_heading",
                "must not be empty",
            ));
        }
        for (field, value, max) in [
            ("schedule.day_interval_seconds", self.schedule.day_interval_seconds, MAX_INTERVAL_SECS),
            ("schedule.night_interval_seconds", self.schedule.night_interval_seconds, MAX_INTERVAL_SECS),
            ("debug.day_interval_seconds", self.debug.day_interval_seconds, MAX_DEBUG_INTERVAL_SECS),
            ("debug.night_interval_seconds", self.debug.night_interval_seconds, MAX_DEBUG_INTERVAL_SECS),
        ] {
            check_interval(field, value, max)?;
        }

        match self.upload.method {
            UploadMethod::Api => {
                let api = self.upload.api.as_ref().ok_or_else(|| {
                    AerocamError::invalid(
                        "upload.api",
                        "api configuration is required when upload method is 'api'",
                    )
                })?;
                if api.key.is_empty() {
                    return Err(AerocamError::invalid("upload.api.key", "must not be empty"));
                }
                check_timeout("upload.api.timeout_seconds", api.timeout_seconds)?;
            }
            UploadMethod::Sftp => {
                let sftp = self.upload.sftp.as_ref().ok_or_else(|| {
                    AerocamError::invalid(
                        "upload.sftp",
                        "sftp configuration is required when upload method is 'sftp'",
                    )
                })?;
                for (field, value) in [
                    ("upload.sftp.host", &sftp.host),
                    ("upload.sftp.user", &sftp.user),
                    ("upload.sftp.password", &sftp.password),
                    ("upload.sftp.remote_path", &sftp.remote_path),
                ] {
                    if value.is_empty() {
                        return Err(AerocamError::invalid(field, "must not be empty"));
                    }
                }
                if sftp.port == 0 {
                    return Err(AerocamError::invalid("upload.sftp.port", "must be 1-65535"));
                }
                check_timeout("upload.sftp.timeout_seconds", sftp.timeout_seconds)?;
            }
        }

        if self.metar.enabled && self.metar.icao_code.len() != 4 {
            return Err(AerocamError::invalid(
                "metar.icao_code",
                "must be a 4-letter ICAO code when METAR is enabled",
            ));
        }
        if !(6..=200).contains(&self.overlay.font_size) {
            return Err(AerocamError::invalid(
                "overlay.font_size",
                "must be between 6 and 200",
            ));
        }
        Ok(())
    }

    /// Day and night capture intervals in force, in seconds.
    pub fn intervals(&self) -> (u64, u64) {
        if self.debug.enabled {
            (
                self.debug.day_interval_seconds,
                self.debug.night_interval_seconds,
            )
        } else {
            (
                self.schedule.day_interval_seconds,
                self.schedule.night_interval_seconds,
            )
        }
    }

    /// Capture interval for the given mode, in seconds.
    pub fn interval_for(&self, mode: DayNight) -> u64 {
        let (day, night) = self.intervals();
        match mode {
            DayNight::Day => day,
            DayNight::Night => night,
        }
    }

    /// How often the schedule is re-derived independent of capture firings.
    pub fn reevaluate_interval_secs(&self) -> u64 {
        if self.debug.enabled {
            DEBUG_REEVALUATE_INTERVAL_SECS
        } else {
            REEVALUATE_INTERVAL_SECS
        }
    }
}

fn check_interval(field: &str, value: u64, max: u64) -> Result<()> {
    if value == 0 || value > max {
        return Err(AerocamError::invalid(
            field,
            format!("must be between 1 and {max} seconds"),
        ));
    }
    Ok(())
}

fn check_timeout(field: &str, value: u64) -> Result<()> {
    if value == 0 || value > 300 {
        return Err(AerocamError::invalid(field, "must be between 1 and 300 seconds"));
    }
    Ok(())
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.aerocam/aerocam.toml", home)
}
