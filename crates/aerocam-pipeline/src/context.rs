//! Per-cycle context: what the pipeline knows about the world at capture time.

use chrono::{DateTime, Utc};

use aerocam_core::{AerocamConfig, DayNight, SunTimes};
use aerocam_upload::UploadMetadata;

use crate::augment::{OverlayContext, OverlayStyle};
use crate::weather::WeatherReport;

/// Static settings the pipeline copies out of config at startup.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub location_name: String,
    pub camera_heading: String,
    pub latitude: f64,
    pub longitude: f64,
    pub provider_name: String,
    pub camera_name: String,
    pub license_mark: String,
    pub metar_enabled: bool,
    /// Draw METAR/TAF text on the full artifact.
    pub weather_overlay: bool,
    pub overlay: OverlayStyle,
}

impl PipelineSettings {
    pub fn from_config(config: &AerocamConfig) -> Self {
        Self {
            location_name: config.location.name.clone(),
            camera_heading: config.location.camera_heading.clone(),
            latitude: config.location.latitude,
            longitude: config.location.longitude,
            provider_name: config.overlay.provider_name.clone(),
            camera_name: config.overlay.camera_name.clone(),
            license_mark: config.metadata.license_mark.clone(),
            metar_enabled: config.metar.enabled,
            weather_overlay: config.metar.enabled && config.metar.raw_metar_enabled,
            overlay: OverlayStyle::from_config(&config.overlay),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleContext {
    pub captured_at: DateTime<Utc>,
    pub mode: DayNight,
    pub sun: Option<SunTimes>,
    pub weather: Option<WeatherReport>,
}

impl CycleContext {
    fn raw_metar(&self) -> Option<String> {
        self.weather.as_ref().and_then(|w| w.raw_metar.clone())
    }

    fn raw_taf(&self) -> Option<String> {
        self.weather.as_ref().and_then(|w| w.raw_taf.clone())
    }

    pub fn upload_metadata(&self, settings: &PipelineSettings) -> UploadMetadata {
        UploadMetadata {
            timestamp: self.captured_at,
            location: settings.location_name.clone(),
            is_day: self.mode.is_day(),
            raw_metar: self.raw_metar(),
            raw_taf: self.raw_taf(),
            sunrise: self.sun.map(|s| s.sunrise),
            sunset: self.sun.map(|s| s.sunset),
            camera_heading: settings.camera_heading.clone(),
        }
    }

    /// Overlay for the full artifact (`full = true`) or the clean one.
    pub fn overlay(&self, settings: &PipelineSettings, full: bool) -> OverlayContext {
        OverlayContext {
            captured_at: self.captured_at,
            provider_name: settings.provider_name.clone(),
            camera_name: settings.camera_name.clone(),
            location_name: settings.location_name.clone(),
            camera_heading: settings.camera_heading.clone(),
            latitude: settings.latitude,
            longitude: settings.longitude,
            license_mark: settings.license_mark.clone(),
            sun: self.sun,
            raw_metar: self.raw_metar(),
            raw_taf: self.raw_taf(),
            include_sun: full,
            include_weather: full && settings.weather_overlay,
        }
    }
}
