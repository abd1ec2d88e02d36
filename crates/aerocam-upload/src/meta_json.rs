//! `cam.json`, the side-document written next to the clean image on SFTP.
//!
//! Web front-ends poll it to learn where the latest images live, when the
//! next one is due, and which METAR/TAF text to display beside the clean
//! (overlay-free) frame.

use chrono::Duration;
use serde::Serialize;

use aerocam_core::{format_utc, AerocamConfig};

use crate::filename::full_sibling;
use crate::types::UploadMetadata;

/// Static inputs for `cam.json`, captured from config once at startup.
#[derive(Debug, Clone)]
pub struct CamJsonTemplate {
    pub debug_mode: bool,
    pub day_ttl_seconds: u64,
    pub night_ttl_seconds: u64,
    pub image_base_url: Option<String>,
    pub provider_name: String,
    pub camera_name: String,
    pub license_mark: String,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub metar_enabled: bool,
    pub icao_code: String,
}

impl CamJsonTemplate {
    pub fn from_config(config: &AerocamConfig) -> Self {
        let (day_ttl_seconds, night_ttl_seconds) = config.intervals();
        Self {
            debug_mode: config.debug.enabled,
            day_ttl_seconds,
            night_ttl_seconds,
            image_base_url: config
                .upload
                .sftp
                .as_ref()
                .and_then(|s| s.image_base_url.clone()),
            provider_name: config.overlay.provider_name.clone(),
            camera_name: config.overlay.camera_name.clone(),
            license_mark: config.metadata.license_mark.clone(),
            location_name: config.location.name.clone(),
            latitude: config.location.latitude,
            longitude: config.location.longitude,
            metar_enabled: config.metar.enabled,
            icao_code: config.metar.icao_code.clone(),
        }
    }

    fn url_for(&self, filename: &str) -> String {
        match &self.image_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), filename),
            None => filename.to_string(),
        }
    }

    /// Build the document for the clean artifact named `clean_filename`.
    pub fn build(&self, metadata: &UploadMetadata, clean_filename: &str) -> CamJson {
        let ttl = if metadata.is_day {
            self.day_ttl_seconds
        } else {
            self.night_ttl_seconds
        };
        let last_update = metadata.timestamp;
        let next_update = last_update + Duration::seconds(ttl as i64);
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        CamJson {
            day_night_mode: if metadata.is_day { "day" } else { "night" },
            debug_mode: self.debug_mode,
            last_update: format_utc(last_update),
            last_update_timestamp: last_update.timestamp(),
            next_update: format_utc(next_update),
            next_update_timestamp: next_update.timestamp(),
            images: vec![CamJsonImage {
                path: self.url_for(&full_sibling(clean_filename)),
                no_metar_path: self.url_for(clean_filename),
                ttl: ttl.to_string(),
                provider_name: self.provider_name.clone(),
                camera_name: self.camera_name.clone(),
                license_mark: self.license_mark.clone(),
                location: CamJsonLocation {
                    name: self.location_name.clone(),
                    latitude: self.latitude,
                    longitude: self.longitude,
                    camera_heading: metadata.camera_heading.clone(),
                },
                sunrise: metadata.sunrise.map(format_utc),
                sunset: metadata.sunset.map(format_utc),
                metar: CamJsonMetar {
                    enabled: self.metar_enabled,
                    icao_code: self.metar_enabled.then(|| self.icao_code.clone()),
                    raw_metar: non_empty(&metadata.raw_metar).filter(|_| self.metar_enabled),
                    raw_taf: non_empty(&metadata.raw_taf).filter(|_| self.metar_enabled),
                },
            }],
        }
    }

    /// Pretty-printed JSON bytes, ready to write.
    pub fn render(
        &self,
        metadata: &UploadMetadata,
        clean_filename: &str,
    ) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.build(metadata, clean_filename))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CamJson {
    pub day_night_mode: &'static str,
    pub debug_mode: bool,
    pub last_update: String,
    pub last_update_timestamp: i64,
    pub next_update: String,
    pub next_update_timestamp: i64,
    pub images: Vec<CamJsonImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CamJsonImage {
    pub path: String,
    pub no_metar_path: String,
    #[serde(rename = "TTL")]
    pub ttl: String,
    pub provider_name: String,
    pub camera_name: String,
    pub license_mark: String,
    pub location: CamJsonLocation,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub metar: CamJsonMetar,
}

#[derive(Debug, Clone, Serialize)]
pub struct CamJsonLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub camera_heading: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CamJsonMetar {
    pub enabled: bool,
    pub icao_code: Option<String>,
    pub raw_metar: Option<String>,
    pub raw_taf: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn template() -> CamJsonTemplate {
        CamJsonTemplate {
            debug_mode: false,
            day_ttl_seconds: 300,
            night_ttl_seconds: 3600,
            image_base_url: Some("https://img.example.org/cams/".into()),
            provider_name: "Aeroclub".into(),
            camera_name: "North".into(),
            license_mark: "CC BY-SA 4.0".into(),
            location_name: "LFAS".into(),
            latitude: 48.5,
            longitude: -1.5,
            metar_enabled: true,
            icao_code: "LFAS".into(),
        }
    }

    fn metadata(is_day: bool) -> UploadMetadata {
        UploadMetadata {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 15, 30, 0).unwrap(),
            location: "LFAS".into(),
            is_day,
            raw_metar: Some("METAR LFAS 021530Z 24012KT 9999 FEW030 08/03 Q1021".into()),
            raw_taf: Some(String::new()),
            sunrise: None,
            sunset: None,
            camera_heading: "060°".into(),
        }
    }

    #[test]
    fn urls_point_at_both_images() {
        let doc = template().build(&metadata(true), "LFAS-North-clean.jpg");
        let image = &doc.images[0];
        assert_eq!(image.path, "https://img.example.org/cams/LFAS-North.jpg");
        assert_eq!(image.no_metar_path, "https://img.example.org/cams/LFAS-North-clean.jpg");
    }

    #[test]
    fn bare_filenames_without_base_url() {
        let mut t = template();
        t.image_base_url = None;
        let doc = t.build(&metadata(true), "LFAS-North-clean.jpg");
        assert_eq!(doc.images[0].path, "LFAS-North.jpg");
    }

    #[test]
    fn ttl_and_next_update_follow_mode() {
        let doc = template().build(&metadata(false), "x-clean.jpg");
        assert_eq!(doc.day_night_mode, "night");
        assert_eq!(doc.images[0].ttl, "3600");
        assert_eq!(doc.last_update, "2026-01-02T15:30:00Z");
        assert_eq!(doc.next_update, "2026-01-02T16:30:00Z");
        assert_eq!(doc.next_update_timestamp - doc.last_update_timestamp, 3600);
    }

    #[test]
    fn metar_block_drops_empty_and_disabled_values() {
        let doc = template().build(&metadata(true), "x-clean.jpg");
        assert!(doc.images[0].metar.raw_metar.is_some());
        assert_eq!(doc.images[0].metar.raw_taf, None);

        let mut t = template();
        t.metar_enabled = false;
        let doc = t.build(&metadata(true), "x-clean.jpg");
        assert_eq!(doc.images[0].metar.icao_code, None);
        assert_eq!(doc.images[0].metar.raw_metar, None);
    }

    #[test]
    fn rendered_json_uses_ttl_key() {
        let bytes = template().render(&metadata(true), "x-clean.jpg").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["images"][0]["TTL"], "300");
        assert_eq!(value["images"][0]["location"]["camera_heading"], "060°");
        assert!(value["images"][0]["sunrise"].is_null());
    }
}
