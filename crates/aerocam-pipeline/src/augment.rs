//! Overlay drawing and EXIF metadata for captured frames.
//!
//! [`RasterOverlay`] decodes the frame, burns the overlay text into the
//! pixels, re-encodes it as JPEG and inserts an EXIF `APP1` segment carrying
//! the capture metadata. Without a usable font the text is skipped; the EXIF
//! block is always written.

use std::io::Cursor;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use chrono::{DateTime, Utc};
use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use aerocam_core::config::OverlayConfig;
use aerocam_core::{format_utc, SunTimes};

use crate::error::{PipelineError, Result};

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: [u8; 2] = [0xFF, 0xE0];
const APP1: [u8; 2] = [0xFF, 0xE1];
const EXIF_HEADER: &[u8] = b"Exif\0\0";
/// Character code prefix of an EXIF `UserComment` holding ASCII text.
pub const USER_COMMENT_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const JPEG_QUALITY: u8 = 90;
const SHADOW_OFFSET: i32 = 2;
const SHADOW_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Searched in order when no font path is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
];

/// Everything the augmenter may draw or embed for one artifact.
#[derive(Debug, Clone)]
pub struct OverlayContext {
    pub captured_at: DateTime<Utc>,
    pub provider_name: String,
    pub camera_name: String,
    pub location_name: String,
    pub camera_heading: String,
    pub latitude: f64,
    pub longitude: f64,
    pub license_mark: String,
    pub sun: Option<SunTimes>,
    pub raw_metar: Option<String>,
    pub raw_taf: Option<String>,
    /// Draw the sunrise/sunset and camera heading lines.
    pub include_sun: bool,
    /// Draw METAR/TAF text.
    pub include_weather: bool,
}

/// Overlay text grouped by where it lands on the frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBlocks {
    /// Top-left corner.
    pub left: Vec<String>,
    /// Top-right corner, each line right aligned.
    pub right: Vec<String>,
    /// Bottom-left corner in a smaller size, wrapped to the frame width.
    pub weather: Vec<String>,
}

impl OverlayContext {
    pub fn blocks(&self) -> TextBlocks {
        let mut right = vec![format!(
            "{} - {}",
            self.camera_name,
            format_utc(self.captured_at)
        )];
        if self.include_sun {
            if let Some(sun) = &self.sun {
                right.push(format!(
                    "Sunrise {}  Sunset {}",
                    sun.sunrise.format("%H:%MZ"),
                    sun.sunset.format("%H:%MZ")
                ));
            }
            if !self.camera_heading.is_empty() {
                right.push(self.camera_heading.clone());
            }
        }

        let mut weather = Vec::new();
        if self.include_weather {
            weather.extend(self.raw_metar.iter().filter(|m| !m.is_empty()).cloned());
            if let Some(taf) = &self.raw_taf {
                // Leading indentation of TAF change groups is kept.
                weather.extend(
                    taf.lines()
                        .map(str::trim_end)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                );
            }
        }

        TextBlocks {
            left: vec![self.provider_name.clone()],
            right,
            weather,
        }
    }

    /// Machine-readable metadata. Weather and sun data are always present
    /// when known, whatever the overlay shows.
    pub fn metadata(&self) -> Value {
        let mut map = Map::new();
        map.insert("camera_name".into(), json!(self.camera_name));
        map.insert("provider_name".into(), json!(self.provider_name));
        map.insert("latitude".into(), json!(self.latitude.to_string()));
        map.insert("longitude".into(), json!(self.longitude.to_string()));
        map.insert("license_mark".into(), json!(self.license_mark));
        map.insert("camera_heading".into(), json!(self.camera_heading));
        map.insert("airfield_icao".into(), json!(self.location_name));
        map.insert("captured_at".into(), json!(format_utc(self.captured_at)));
        if let Some(metar) = self.raw_metar.as_ref().filter(|m| !m.is_empty()) {
            map.insert("metar".into(), json!(metar));
        }
        if let Some(taf) = self.raw_taf.as_ref().filter(|t| !t.is_empty()) {
            map.insert("taf".into(), json!(taf));
        }
        if let Some(sun) = &self.sun {
            map.insert("sunrise".into(), json!(format_utc(sun.sunrise)));
            map.insert("sunset".into(), json!(format_utc(sun.sunset)));
        }
        Value::Object(map)
    }
}

/// Turns a raw frame into an annotated artifact.
pub trait Augmenter: Send + Sync {
    fn augment(&self, image: &[u8], ctx: &OverlayContext) -> Result<Vec<u8>>;
}

/// Font and layout settings for the burned-in text.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub font_path: Option<String>,
    pub font_size: u32,
    pub color: Rgb<u8>,
    pub shadow: bool,
    pub padding: u32,
    pub line_spacing: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: 16,
            color: Rgb([255, 255, 255]),
            shadow: true,
            padding: 15,
            line_spacing: 4,
        }
    }
}

impl OverlayStyle {
    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            font_path: config.font_path.clone(),
            font_size: config.font_size,
            color: parse_color(&config.font_color),
            shadow: config.shadow_enabled,
            padding: config.padding,
            line_spacing: config.line_spacing,
        }
    }
}

/// `#rrggbb` or a colour name. Anything else is white.
pub fn parse_color(value: &str) -> Rgb<u8> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() == 6 {
            if let Ok(rgb) = u32::from_str_radix(hex, 16) {
                let [_, r, g, b] = rgb.to_be_bytes();
                return Rgb([r, g, b]);
            }
        }
    }
    match value.to_ascii_lowercase().as_str() {
        "black" => Rgb([0, 0, 0]),
        "red" => Rgb([255, 0, 0]),
        "green" => Rgb([0, 255, 0]),
        "blue" => Rgb([0, 0, 255]),
        "yellow" => Rgb([255, 255, 0]),
        _ => Rgb([255, 255, 255]),
    }
}

/// First loadable font: the configured path, then the usual system
/// locations.
pub fn load_font(configured: Option<&str>) -> Option<FontArc> {
    configured
        .into_iter()
        .chain(SYSTEM_FONTS.iter().copied())
        .find_map(|path| {
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    if configured == Some(path) {
                        warn!(path, error = %e, "configured overlay font not readable");
                    }
                    return None;
                }
            };
            match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    debug!(path, "overlay font loaded");
                    Some(font)
                }
                Err(e) => {
                    warn!(path, error = %e, "not a usable font file");
                    None
                }
            }
        })
}

/// Draws the overlay onto the pixels and embeds the metadata as EXIF.
pub struct RasterOverlay {
    style: OverlayStyle,
    font: Option<FontArc>,
}

impl RasterOverlay {
    pub fn new(style: OverlayStyle, font: Option<FontArc>) -> Self {
        Self { style, font }
    }

    /// Resolve the font for `style` once. A missing font is logged here and
    /// not again for every frame.
    pub fn load(style: OverlayStyle) -> Self {
        let font = load_font(style.font_path.as_deref());
        if font.is_none() {
            warn!("no usable overlay font found, frames carry EXIF metadata only");
        }
        Self::new(style, font)
    }

    fn draw(&self, canvas: &mut RgbImage, font: &FontArc, blocks: &TextBlocks) {
        let style = &self.style;
        let pad = style.padding as i32;
        let gap = style.line_spacing as i32;
        let width = canvas.width() as i32;
        let height = canvas.height() as i32;
        let scale = PxScale::from(style.font_size as f32);
        let small = PxScale::from(style.font_size.saturating_sub(2).max(8) as f32);
        let step = line_height(font, scale) + gap;

        let mut y = pad;
        for line in &blocks.left {
            self.text(canvas, font, scale, pad, y, line);
            y += step;
        }

        let mut y = pad;
        for line in &blocks.right {
            let (w, _) = text_size(scale, font, line);
            self.text(canvas, font, scale, width - pad - w as i32, y, line);
            y += step;
        }

        let max_width = (width - 2 * pad).max(1) as u32;
        let wrapped: Vec<String> = blocks
            .weather
            .iter()
            .flat_map(|line| wrap(line, font, small, max_width))
            .collect();
        let small_step = line_height(font, small) + gap;
        let mut y = height - pad - small_step * wrapped.len() as i32 + gap;
        for line in &wrapped {
            self.text(canvas, font, small, pad, y, line);
            y += small_step;
        }
    }

    fn text(
        &self,
        canvas: &mut RgbImage,
        font: &FontArc,
        scale: PxScale,
        x: i32,
        y: i32,
        text: &str,
    ) {
        if self.style.shadow {
            draw_text_mut(
                canvas,
                SHADOW_COLOR,
                x + SHADOW_OFFSET,
                y + SHADOW_OFFSET,
                scale,
                font,
                text,
            );
        }
        draw_text_mut(canvas, self.style.color, x, y, scale, font, text);
    }
}

impl Augmenter for RasterOverlay {
    fn augment(&self, image: &[u8], ctx: &OverlayContext) -> Result<Vec<u8>> {
        let decoded = image::load_from_memory_with_format(image, ImageFormat::Jpeg)
            .map_err(|e| PipelineError::Augment(format!("decode: {e}")))?;
        let mut canvas = decoded.to_rgb8();
        if let Some(font) = &self.font {
            self.draw(&mut canvas, font, &ctx.blocks());
        }

        let mut encoded = Vec::with_capacity(image.len());
        JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY)
            .encode_image(&canvas)
            .map_err(|e| PipelineError::Augment(format!("encode: {e}")))?;
        insert_exif(&encoded, &exif_block(ctx)?)
    }
}

fn line_height(font: &FontArc, scale: PxScale) -> i32 {
    font.as_scaled(scale).height().ceil() as i32
}

/// Greedy word wrap that keeps the line's leading indentation.
fn wrap(line: &str, font: &FontArc, scale: PxScale, max_width: u32) -> Vec<String> {
    let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
    let mut out = Vec::new();
    let mut current = indent.clone();
    for word in line.split_whitespace() {
        if current.trim().is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if text_size(scale, font, &candidate).0 > max_width {
            out.push(std::mem::replace(&mut current, format!("{indent}{word}")));
        } else {
            current = candidate;
        }
    }
    if !current.trim().is_empty() {
        out.push(current);
    }
    out
}

/// Big-endian TIFF structure with the descriptive, GPS and metadata tags.
fn exif_block(ctx: &OverlayContext) -> Result<Vec<u8>> {
    let ascii = |s: &str| exif::Value::Ascii(vec![s.as_bytes().to_vec()]);
    let field = |tag, value| Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    };

    let mut comment = USER_COMMENT_ASCII.to_vec();
    comment.extend_from_slice(serde_json::to_string(&ctx.metadata())?.as_bytes());
    let lat_ref = if ctx.latitude >= 0.0 { "N" } else { "S" };
    let lon_ref = if ctx.longitude >= 0.0 { "E" } else { "W" };

    let fields = [
        field(Tag::ImageDescription, ascii(&ctx.camera_name)),
        field(
            Tag::Copyright,
            ascii(&format!("{}\n{}", ctx.provider_name, ctx.license_mark)),
        ),
        field(
            Tag::DateTimeOriginal,
            ascii(&ctx.captured_at.format("%Y:%m:%d %H:%M:%S").to_string()),
        ),
        field(Tag::UserComment, exif::Value::Undefined(comment, 0)),
        field(Tag::GPSVersionID, exif::Value::Byte(vec![2, 2, 0, 0])),
        field(Tag::GPSLatitudeRef, ascii(lat_ref)),
        field(Tag::GPSLatitude, exif::Value::Rational(dms(ctx.latitude))),
        field(Tag::GPSLongitudeRef, ascii(lon_ref)),
        field(Tag::GPSLongitude, exif::Value::Rational(dms(ctx.longitude))),
    ];

    let mut writer = Writer::new();
    for f in &fields {
        writer.push_field(f);
    }
    let mut out = Cursor::new(Vec::new());
    writer
        .write(&mut out, false)
        .map_err(|e| PipelineError::Augment(format!("exif: {e}")))?;
    Ok(out.into_inner())
}

/// Degrees, minutes and hundredths of seconds of an unsigned coordinate.
fn dms(coordinate: f64) -> Vec<Rational> {
    let abs = coordinate.abs();
    let degrees = abs.trunc();
    let minutes_f = (abs - degrees) * 60.0;
    let minutes = minutes_f.trunc();
    let seconds = (minutes_f - minutes) * 60.0;
    vec![
        Rational { num: degrees as u32, denom: 1 },
        Rational { num: minutes as u32, denom: 1 },
        Rational { num: (seconds * 100.0).round() as u32, denom: 100 },
    ]
}

/// Insert an `APP1` Exif segment after SOI, or after the JFIF `APP0`
/// segment when there is one.
fn insert_exif(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>> {
    if !jpeg.starts_with(&SOI) {
        return Err(PipelineError::Augment("encoder output is not a JPEG".into()));
    }
    let segment_len = 2 + EXIF_HEADER.len() + tiff.len();
    let len = u16::try_from(segment_len).map_err(|_| {
        PipelineError::Augment(format!(
            "EXIF block of {} bytes exceeds JPEG segment limit",
            tiff.len()
        ))
    })?;

    let mut at = SOI.len();
    if jpeg.get(at..at + 2) == Some(&APP0[..]) {
        if let Some(&[hi, lo]) = jpeg.get(at + 2..at + 4) {
            at = (at + 2 + u16::from_be_bytes([hi, lo]) as usize).min(jpeg.len());
        }
    }

    let mut out = Vec::with_capacity(jpeg.len() + segment_len + 2);
    out.extend_from_slice(&jpeg[..at]);
    out.extend_from_slice(&APP1);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[at..]);
    Ok(out)
}
