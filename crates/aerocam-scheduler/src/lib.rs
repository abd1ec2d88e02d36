//! `aerocam-scheduler`: decides when the next capture cycle fires.
//!
//! # Overview
//!
//! [`policy::TriggerPolicy::evaluate`] turns "now" into a [`TriggerDecision`].
//! [`scheduler::Scheduler`] holds the programmed capture and re-evaluation
//! jobs and reports what is due on each [`tick`](scheduler::Scheduler::tick).
//! [`engine::SchedulerEngine`] drives both from a Tokio task and hands due
//! cycles to a [`CycleRunner`].
//!
//! # Trigger variants
//!
//! | Variant    | Behaviour                                                     |
//! |------------|---------------------------------------------------------------|
//! | `Interval` | Repeat every N seconds; late ticks coalesce into one firing   |
//! | `OneShot`  | Fire once at a sunrise/sunset instant, then re-evaluate        |

pub mod clock;
pub mod engine;
pub mod error;
pub mod policy;
pub mod scheduler;
pub mod types;

pub use clock::{AnchoredClock, Clock, SystemClock};
pub use engine::{CycleRunner, SchedulerEngine};
pub use error::{Result, SchedulerError};
pub use policy::TriggerPolicy;
pub use scheduler::Scheduler;
pub use types::{CycleOutcome, ScheduleState, SchedulerAction, Trigger, TriggerDecision};
