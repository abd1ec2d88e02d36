//! Day/night determination with an optional forced mode.

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};

use crate::sun::SunSource;
use crate::types::{DayNight, SolarDay, SunTimes};

/// Resolves the lighting mode at an instant.
///
/// A forced mode (from `debug.day_night_override` or `DEBUG_DAY_NIGHT_MODE`)
/// wins unconditionally. Otherwise the sun source decides, looking at the
/// previous, current and next UTC dates so observers far from Greenwich whose
/// solar day straddles midnight UTC are still classified correctly.
#[derive(Clone)]
pub struct DayNightResolver {
    sun: Arc<dyn SunSource>,
    forced: Option<DayNight>,
}

impl DayNightResolver {
    pub fn new(sun: Arc<dyn SunSource>, forced: Option<DayNight>) -> Self {
        Self { sun, forced }
    }

    pub fn forced(&self) -> Option<DayNight> {
        self.forced
    }

    /// Mode at `now`.
    ///
    /// Polar days count as day and polar nights as night.
    pub fn mode_at(&self, now: DateTime<Utc>) -> DayNight {
        if let Some(mode) = self.forced {
            return mode;
        }
        let today = now.date_naive();
        match self.sun.solar_day(today) {
            SolarDay::PolarDay => return DayNight::Day,
            SolarDay::PolarNight => return DayNight::Night,
            SolarDay::Regular(_) => {}
        }
        let is_day = self
            .candidate_days(now)
            .iter()
            .filter_map(SolarDay::times)
            .any(|t| t.is_day_at(now));
        DayNight::from_is_day(is_day)
    }

    /// Sunrise/sunset for `now`'s UTC date, if the sun rises and sets that day.
    pub fn sun_times(&self, now: DateTime<Utc>) -> Option<SunTimes> {
        self.sun.solar_day(now.date_naive()).times()
    }

    /// The next instant the mode flips away from `mode`: sunset when `mode`
    /// is day, sunrise when it is night.
    ///
    /// Today's event is used when it is still ahead of `now`, otherwise the
    /// following day's. Returns `None` when no such event exists in that
    /// window (polar day or night).
    pub fn next_transition(&self, now: DateTime<Utc>, mode: DayNight) -> Option<DateTime<Utc>> {
        self.candidate_days(now)
            .iter()
            .filter_map(SolarDay::times)
            .map(|t| match mode {
                DayNight::Day => t.sunset,
                DayNight::Night => t.sunrise,
            })
            .filter(|event| *event > now)
            .min()
    }

    fn candidate_days(&self, now: DateTime<Utc>) -> [SolarDay; 3] {
        let today = now.date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        [
            self.sun.solar_day(yesterday),
            self.sun.solar_day(today),
            self.sun.solar_day(tomorrow),
        ]
    }
}

impl std::fmt::Debug for DayNightResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DayNightResolver")
            .field("forced", &self.forced)
            .finish_non_exhaustive()
    }
}
