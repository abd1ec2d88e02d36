use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use aerocam_core::format_utc;

use crate::clock::Clock;
use crate::policy::TriggerPolicy;
use crate::scheduler::Scheduler;
use crate::types::{format_hms, CycleOutcome, SchedulerAction};

/// How long in-flight cycles get to unwind after shutdown before abort.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
/// Cadence of the debug-mode countdown log.
pub const COUNTDOWN_EVERY: Duration = Duration::from_secs(10);
/// Upper bound on a single idle sleep when nothing is programmed.
const IDLE_SLEEP: Duration = Duration::from_secs(60);

/// Executes one capture cycle. Must not panic or block; failures are
/// reported through the returned outcome.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self, shutdown: CancellationToken) -> CycleOutcome;
}

/// Drives a [`Scheduler`] from wall-clock time and spawns due cycles.
pub struct SchedulerEngine {
    scheduler: Scheduler,
    policy: TriggerPolicy,
    clock: Arc<dyn Clock>,
    runner: Arc<dyn CycleRunner>,
    countdown: bool,
}

impl SchedulerEngine {
    pub fn new(
        policy: TriggerPolicy,
        reevaluate_every_secs: u64,
        clock: Arc<dyn Clock>,
        runner: Arc<dyn CycleRunner>,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(reevaluate_every_secs),
            policy,
            clock,
            runner,
            countdown: false,
        }
    }

    /// Enable the periodic "next capture in" log.
    pub fn with_countdown(mut self, enabled: bool) -> Self {
        self.countdown = enabled;
        self
    }

    /// Main event loop. Runs one cycle immediately, then follows the
    /// programmed triggers until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("scheduler engine started");
        let mut cycles: JoinSet<CycleOutcome> = JoinSet::new();

        let now = self.clock.now();
        self.scheduler.start(now);
        self.reevaluate(now);
        self.spawn_cycle(&mut cycles, &shutdown, "initial");

        let mut countdown_timer = tokio::time::interval_at(
            tokio::time::Instant::now() + COUNTDOWN_EVERY,
            COUNTDOWN_EVERY,
        );
        countdown_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let wait = self.until_next_deadline();
            tokio::select! {
                _ = shutdown.cancelled() => break,

                _ = tokio::time::sleep(wait) => {
                    let now = self.clock.now();
                    for action in self.scheduler.tick(now) {
                        match action {
                            SchedulerAction::RunCycle { one_shot } => {
                                let reason = if one_shot { "transition" } else { "interval" };
                                self.spawn_cycle(&mut cycles, &shutdown, reason);
                            }
                            SchedulerAction::Reevaluate => self.reevaluate(now),
                        }
                    }
                }

                Some(joined) = cycles.join_next() => {
                    match joined {
                        Ok(outcome) => debug!(%outcome, "capture cycle finished"),
                        Err(e) if e.is_panic() => error!("capture cycle panicked: {e}"),
                        Err(e) => warn!("capture cycle task ended: {e}"),
                    }
                    self.reevaluate(self.clock.now());
                }

                _ = countdown_timer.tick(), if self.countdown => self.log_countdown(),
            }
        }

        info!(in_flight = cycles.len(), "scheduler engine shutting down");
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while cycles.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = cycles.len(),
                "in-flight cycle did not stop within {}s; aborting",
                SHUTDOWN_GRACE.as_secs()
            );
            cycles.abort_all();
            while cycles.join_next().await.is_some() {}
        }
        info!("scheduler engine stopped");
    }

    // --- private helpers ---------------------------------------------------

    fn until_next_deadline(&self) -> Duration {
        match self.scheduler.next_deadline() {
            Some(deadline) => (deadline - self.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO),
            None => IDLE_SLEEP,
        }
    }

    fn spawn_cycle(
        &self,
        cycles: &mut JoinSet<CycleOutcome>,
        shutdown: &CancellationToken,
        reason: &'static str,
    ) {
        debug!(reason, "firing capture cycle");
        let runner = Arc::clone(&self.runner);
        let token = shutdown.clone();
        cycles.spawn(async move { runner.run_cycle(token).await });
    }

    fn reevaluate(&mut self, now: DateTime<Utc>) {
        let decision = self.policy.evaluate(now);
        info!(
            at = %format_utc(now),
            mode = %decision.mode,
            forced = self.policy.resolver().forced().is_some(),
            interval = %format_hms(decision.interval_secs),
            trigger = %decision.trigger,
            "schedule re-evaluated"
        );
        if let Err(e) = self.scheduler.reprogram(&decision) {
            error!("reprogram failed: {e}");
        }
    }

    fn log_countdown(&self) {
        match self.scheduler.next_capture_at() {
            Some(at) => {
                let remaining = (at - self.clock.now()).num_seconds();
                if remaining > 0 {
                    debug!(remaining = %format_hms(remaining as u64), "next capture in");
                } else {
                    debug!("next capture: executing");
                }
            }
            None => debug!("next capture: scheduling"),
        }
    }
}
