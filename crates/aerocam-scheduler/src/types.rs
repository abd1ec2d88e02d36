use chrono::{DateTime, Utc};

use aerocam_core::{format_utc, DayNight};

/// When the capture job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Repeat every `every_secs` seconds.
    Interval { every_secs: u64 },
    /// Fire exactly once at a transition instant.
    OneShot { at: DateTime<Utc> },
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Interval { every_secs } => write!(f, "every {}", format_hms(*every_secs)),
            Trigger::OneShot { at } => write!(f, "once at {}", format_utc(*at)),
        }
    }
}

/// Result of one policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerDecision {
    pub evaluated_at: DateTime<Utc>,
    pub mode: DayNight,
    /// Interval configured for `mode`, whichever trigger was chosen.
    pub interval_secs: u64,
    /// Next sunrise/sunset considered, if any.
    pub transition: Option<DateTime<Utc>>,
    pub trigger: Trigger,
}

/// Schedule as of the last evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    pub current_trigger: Trigger,
    pub is_day: bool,
    pub last_evaluated_at: DateTime<Utc>,
}

/// Work reported by [`crate::Scheduler::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerAction {
    /// Run one capture cycle. `one_shot` is set when a transition trigger
    /// fired; the capture job is gone until the next re-evaluation.
    RunCycle { one_shot: bool },
    /// Re-run the policy and reprogram.
    Reevaluate,
}

/// How a capture cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Capture succeeded; counts are per artifact.
    Completed { delivered: u8, failed: u8 },
    CaptureFailed,
    /// Another cycle was already in flight.
    Skipped,
    Cancelled,
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleOutcome::Completed { delivered, failed } => {
                write!(f, "completed ({delivered} delivered, {failed} failed)")
            }
            CycleOutcome::CaptureFailed => write!(f, "capture failed"),
            CycleOutcome::Skipped => write!(f, "skipped"),
            CycleOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// `h:mm:ss`.
pub fn format_hms(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
