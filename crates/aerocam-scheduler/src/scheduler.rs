//! Capture/re-evaluation job bookkeeping.
//!
//! `Scheduler` is a plain state machine: the engine asks it for the next
//! deadline, sleeps, then calls [`Scheduler::tick`] and acts on what comes
//! back. Nothing here sleeps or spawns, which keeps every transition
//! testable with hand-picked instants.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::{Result, SchedulerError};
use crate::types::{ScheduleState, SchedulerAction, Trigger, TriggerDecision};

pub const CAPTURE_JOB: &str = "capture";

#[derive(Debug, Clone, Copy)]
struct CaptureJob {
    trigger: Trigger,
    next_fire: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    capture: Option<CaptureJob>,
    state: Option<ScheduleState>,
    reevaluate_every: Duration,
    next_reevaluation: Option<DateTime<Utc>>,
}

impl Scheduler {
    /// `reevaluate_every_secs` is the cadence of the recurring re-evaluation
    /// job; it is armed by [`Scheduler::start`].
    pub fn new(reevaluate_every_secs: u64) -> Self {
        Self {
            capture: None,
            state: None,
            reevaluate_every: Duration::seconds(reevaluate_every_secs.max(1) as i64),
            next_reevaluation: None,
        }
    }

    /// Arm the re-evaluation job relative to `now`.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.next_reevaluation = Some(now + self.reevaluate_every);
    }

    pub fn state(&self) -> Option<&ScheduleState> {
        self.state.as_ref()
    }

    pub fn next_capture_at(&self) -> Option<DateTime<Utc>> {
        self.capture.map(|job| job.next_fire)
    }

    /// Earliest instant at which [`Scheduler::tick`] has something to do.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        match (self.next_capture_at(), self.next_reevaluation) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Apply `decision`. Returns `true` when the capture job was replaced.
    ///
    /// An interval job with the same period is left alone so its countdown
    /// keeps running; re-evaluating more often than the interval must not
    /// postpone captures forever.
    pub fn reprogram(&mut self, decision: &TriggerDecision) -> Result<bool> {
        if let Trigger::Interval { every_secs: 0 } = decision.trigger {
            return Err(SchedulerError::InvalidSchedule(
                "interval must be at least one second".into(),
            ));
        }
        let now = decision.evaluated_at;
        self.state = Some(ScheduleState {
            current_trigger: decision.trigger,
            is_day: decision.mode.is_day(),
            last_evaluated_at: now,
        });

        if let Some(job) = &self.capture {
            let same_interval = matches!(job.trigger, Trigger::Interval { .. })
                && job.trigger == decision.trigger;
            if same_interval {
                debug!(trigger = %decision.trigger, next_fire = %job.next_fire, "capture job unchanged");
                return Ok(false);
            }
        }

        if let Err(e) = self.remove_capture_job() {
            debug!("{e}; creating capture job");
        }
        let next_fire = match decision.trigger {
            Trigger::Interval { every_secs } => now + Duration::seconds(every_secs as i64),
            Trigger::OneShot { at } => at,
        };
        self.capture = Some(CaptureJob {
            trigger: decision.trigger,
            next_fire,
        });
        info!(trigger = %decision.trigger, %next_fire, "capture job scheduled");
        Ok(true)
    }

    /// Remove the capture job. `JobNotFound` if none is programmed.
    pub fn remove_capture_job(&mut self) -> Result<Trigger> {
        self.capture
            .take()
            .map(|job| job.trigger)
            .ok_or_else(|| SchedulerError::JobNotFound {
                id: CAPTURE_JOB.to_string(),
            })
    }

    /// Collect due work at `now` and advance the jobs.
    ///
    /// Each job fires at most once per call however late `now` is; interval
    /// jobs then move to their first slot after `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<SchedulerAction> {
        let mut actions = Vec::new();

        if let Some(job) = self.capture.as_mut() {
            if job.next_fire <= now {
                match job.trigger {
                    Trigger::Interval { every_secs } => {
                        let period = Duration::seconds(every_secs as i64);
                        let (next, skipped) = advance_past(job.next_fire, period, now);
                        if skipped > 0 {
                            debug!(skipped, "late capture ticks coalesced");
                        }
                        job.next_fire = next;
                        actions.push(SchedulerAction::RunCycle { one_shot: false });
                    }
                    Trigger::OneShot { .. } => {
                        self.capture = None;
                        actions.push(SchedulerAction::RunCycle { one_shot: true });
                    }
                }
            }
        }

        if let Some(due) = self.next_reevaluation {
            if due <= now {
                let (next, _) = advance_past(due, self.reevaluate_every, now);
                self.next_reevaluation = Some(next);
                actions.push(SchedulerAction::Reevaluate);
            }
        }

        actions
    }
}

/// First `due + k * period` strictly after `now`, with the number of slots
/// skipped on the way.
fn advance_past(due: DateTime<Utc>, period: Duration, now: DateTime<Utc>) -> (DateTime<Utc>, i64) {
    let period_ms = period.num_milliseconds().max(1);
    let behind_ms = (now - due).num_milliseconds().max(0);
    let skipped = behind_ms / period_ms;
    (due + Duration::milliseconds(period_ms * (skipped + 1)), skipped)
}
