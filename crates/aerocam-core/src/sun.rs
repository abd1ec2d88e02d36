//! Sunrise/sunset computation.
//!
//! Uses the sunrise equation (NOAA simplified form) with the standard
//! -0.833° solar altitude for the visible upper limb. Accuracy is within a
//! couple of minutes at mid latitudes, which is well inside the capture
//! cadence this is used for. All inputs and outputs are UTC.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::types::{SolarDay, SunTimes};

/// Julian date of 2000-01-01 12:00 UTC.
const J2000: f64 = 2_451_545.0;
/// `num_days_from_ce()` of 2000-01-01.
const J2000_DAYS_FROM_CE: i32 = 730_120;
/// Julian date of the Unix epoch.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const EARTH_AXIAL_TILT_DEG: f64 = 23.4397;
const HORIZON_ALTITUDE_DEG: f64 = -0.833;

/// Source of sun times for a given UTC date.
///
/// The production implementation is [`SolarCalculator`]; tests plug in fixed
/// tables so day/night boundaries are deterministic.
pub trait SunSource: Send + Sync {
    fn solar_day(&self, date: NaiveDate) -> SolarDay;
}

/// Computes sun times for a fixed observer position.
#[derive(Debug, Clone, Copy)]
pub struct SolarCalculator {
    latitude: f64,
    longitude: f64,
}

impl SolarCalculator {
    /// `latitude` in degrees north, `longitude` in degrees east.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl SunSource for SolarCalculator {
    fn solar_day(&self, date: NaiveDate) -> SolarDay {
        let n = (date.num_days_from_ce() - J2000_DAYS_FROM_CE) as f64;

        // Mean solar time at the observer's meridian.
        let j_star = n - self.longitude / 360.0;
        let m = (357.5291 + 0.985_600_28 * j_star).rem_euclid(360.0);
        let m_rad = m.to_radians();
        let center =
            1.9148 * m_rad.sin() + 0.0200 * (2.0 * m_rad).sin() + 0.0003 * (3.0 * m_rad).sin();
        let lambda = (m + center + 180.0 + 102.9372).rem_euclid(360.0);
        let lambda_rad = lambda.to_radians();
        let transit = J2000 + j_star + 0.0053 * m_rad.sin() - 0.0069 * (2.0 * lambda_rad).sin();

        let sin_decl = lambda_rad.sin() * EARTH_AXIAL_TILT_DEG.to_radians().sin();
        let cos_decl = sin_decl.asin().cos();
        let phi = self.latitude.to_radians();
        let cos_hour_angle = (HORIZON_ALTITUDE_DEG.to_radians().sin() - phi.sin() * sin_decl)
            / (phi.cos() * cos_decl);

        if cos_hour_angle.is_nan() {
            return SolarDay::PolarNight;
        }
        if cos_hour_angle < -1.0 {
            return SolarDay::PolarDay;
        }
        if cos_hour_angle > 1.0 {
            return SolarDay::PolarNight;
        }

        let half_day = cos_hour_angle.acos().to_degrees() / 360.0;
        match (
            julian_to_utc(transit - half_day),
            julian_to_utc(transit + half_day),
        ) {
            (Some(sunrise), Some(sunset)) => SolarDay::Regular(SunTimes { sunrise, sunset }),
            _ => SolarDay::PolarNight,
        }
    }
}

fn julian_to_utc(jd: f64) -> Option<DateTime<Utc>> {
    let secs = ((jd - UNIX_EPOCH_JD) * 86_400.0).round() as i64;
    Utc.timestamp_opt(secs, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn minutes_of_day(at: DateTime<Utc>) -> i64 {
        (at.hour() * 60 + at.minute()) as i64
    }

    fn assert_close(actual: DateTime<Utc>, expected_h: u32, expected_m: u32) {
        let expected = (expected_h * 60 + expected_m) as i64;
        let diff = (minutes_of_day(actual) - expected).abs();
        assert!(diff <= 5, "got {actual}, expected ~{expected_h:02}:{expected_m:02}");
    }

    #[test]
    fn london_summer_solstice() {
        let calc = SolarCalculator::new(51.5074, -0.1278);
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let times = calc.solar_day(date).times().expect("regular day");
        assert_close(times.sunrise, 3, 43);
        assert_close(times.sunset, 20, 21);
    }

    #[test]
    fn equator_equinox_is_roughly_twelve_hours() {
        let calc = SolarCalculator::new(0.0, 0.0);
        let date = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let times = calc.solar_day(date).times().expect("regular day");
        let length = (times.sunset - times.sunrise).num_minutes();
        assert!((720..=740).contains(&length), "day length {length} min");
        assert_eq!(times.sunrise.date_naive(), date);
    }

    #[test]
    fn eastern_longitude_shifts_events_earlier() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let west = SolarCalculator::new(45.0, 0.0).solar_day(date).times().unwrap();
        let east = SolarCalculator::new(45.0, 15.0).solar_day(date).times().unwrap();
        let shift = (west.sunrise - east.sunrise).num_minutes();
        assert!((55..=65).contains(&shift), "shift {shift} min");
    }

    #[test]
    fn svalbard_has_polar_day_and_night() {
        let calc = SolarCalculator::new(78.22, 15.65);
        let june = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let december = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
        assert_eq!(calc.solar_day(june), SolarDay::PolarDay);
        assert_eq!(calc.solar_day(december), SolarDay::PolarNight);
    }
}
