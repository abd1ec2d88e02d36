use chrono::{DateTime, Duration, Utc};

use aerocam_core::{AerocamConfig, DayNight, DayNightResolver};

use crate::types::{Trigger, TriggerDecision};

/// Chooses between an interval trigger and a one-shot at the next
/// sunrise/sunset.
#[derive(Debug, Clone)]
pub struct TriggerPolicy {
    resolver: DayNightResolver,
    day_interval_secs: u64,
    night_interval_secs: u64,
    /// Debug mode ignores transitions and always uses the interval.
    debug: bool,
}

impl TriggerPolicy {
    pub fn new(
        resolver: DayNightResolver,
        day_interval_secs: u64,
        night_interval_secs: u64,
        debug: bool,
    ) -> Self {
        Self {
            resolver,
            day_interval_secs,
            night_interval_secs,
            debug,
        }
    }

    pub fn from_config(config: &AerocamConfig, resolver: DayNightResolver) -> Self {
        let (day, night) = config.intervals();
        Self::new(resolver, day, night, config.debug.enabled)
    }

    pub fn resolver(&self) -> &DayNightResolver {
        &self.resolver
    }

    pub fn interval_for(&self, mode: DayNight) -> u64 {
        match mode {
            DayNight::Day => self.day_interval_secs,
            DayNight::Night => self.night_interval_secs,
        }
    }

    /// Decide the capture trigger at `now`. Never fails: without sun data
    /// the decision is a plain interval.
    pub fn evaluate(&self, now: DateTime<Utc>) -> TriggerDecision {
        let mode = self.resolver.mode_at(now);
        let interval_secs = self.interval_for(mode);
        let candidate = now + Duration::seconds(interval_secs as i64);

        let transition = if self.debug {
            None
        } else {
            self.resolver.next_transition(now, mode)
        };

        let trigger = match transition {
            Some(at) if now < at && at < candidate => Trigger::OneShot { at },
            _ => Trigger::Interval {
                every_secs: interval_secs,
            },
        };

        TriggerDecision {
            evaluated_at: now,
            mode,
            interval_secs,
            transition,
            trigger,
        }
    }
}
