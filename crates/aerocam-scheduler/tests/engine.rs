use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use aerocam_core::{DayNight, DayNightResolver, SolarDay, SunSource, SunTimes};
use aerocam_scheduler::{
    AnchoredClock, Clock, CycleOutcome, CycleRunner, SchedulerEngine, TriggerPolicy,
};

/// Sunrise 08:00, sunset 18:00 every day.
struct FixedSun;

impl SunSource for FixedSun {
    fn solar_day(&self, date: NaiveDate) -> SolarDay {
        let at = |h| Utc.from_utc_datetime(&date.and_hms_opt(h, 0, 0).unwrap());
        SolarDay::Regular(SunTimes {
            sunrise: at(8),
            sunset: at(18),
        })
    }
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 10, h, m, s).unwrap()
}

/// Records the wall time at which each cycle started.
struct Recorder {
    clock: Arc<dyn Clock>,
    fired: Mutex<Vec<DateTime<Utc>>>,
    work: Duration,
}

impl Recorder {
    fn new(clock: Arc<dyn Clock>, work: Duration) -> Self {
        Self {
            clock,
            fired: Mutex::new(Vec::new()),
            work,
        }
    }

    fn fired_hms(&self) -> Vec<String> {
        self.fired
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.format("%H:%M:%S").to_string())
            .collect()
    }
}

#[async_trait]
impl CycleRunner for Recorder {
    async fn run_cycle(&self, shutdown: CancellationToken) -> CycleOutcome {
        self.fired.lock().unwrap().push(self.clock.now());
        tokio::select! {
            _ = shutdown.cancelled() => CycleOutcome::Cancelled,
            _ = tokio::time::sleep(self.work) => CycleOutcome::Completed { delivered: 2, failed: 0 },
        }
    }
}

/// Ignores cancellation entirely.
struct Stubborn {
    finished: AtomicBool,
}

#[async_trait]
impl CycleRunner for Stubborn {
    async fn run_cycle(&self, _shutdown: CancellationToken) -> CycleOutcome {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        self.finished.store(true, Ordering::SeqCst);
        CycleOutcome::Completed {
            delivered: 0,
            failed: 0,
        }
    }
}

fn policy(forced: Option<DayNight>, day: u64, night: u64, debug: bool) -> TriggerPolicy {
    TriggerPolicy::new(
        DayNightResolver::new(Arc::new(FixedSun), forced),
        day,
        night,
        debug,
    )
}

#[tokio::test(start_paused = true)]
async fn sunrise_one_shot_then_day_interval() {
    let clock: Arc<dyn Clock> = Arc::new(AnchoredClock::starting_at(at(7, 30, 0)));
    let runner = Arc::new(Recorder::new(Arc::clone(&clock), Duration::from_secs(4)));
    let engine = SchedulerEngine::new(
        policy(None, 300, 3600, false),
        300,
        Arc::clone(&clock),
        runner.clone(),
    );

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(engine.run(shutdown.clone()));
    // Until 08:12.
    tokio::time::sleep(Duration::from_secs(42 * 60)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(
        runner.fired_hms(),
        vec!["07:30:00", "08:00:00", "08:05:00", "08:10:00"]
    );
}

#[tokio::test(start_paused = true)]
async fn frequent_reevaluation_does_not_postpone_interval() {
    let clock: Arc<dyn Clock> = Arc::new(AnchoredClock::starting_at(at(12, 0, 0)));
    let runner = Arc::new(Recorder::new(Arc::clone(&clock), Duration::from_secs(1)));
    // Re-evaluated every 30 s and after every cycle; interval is 100 s.
    let engine = SchedulerEngine::new(
        policy(Some(DayNight::Day), 100, 600, true),
        30,
        Arc::clone(&clock),
        runner.clone(),
    )
    .with_countdown(true);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(engine.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_secs(250)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(
        runner.fired_hms(),
        vec!["12:00:00", "12:01:40", "12:03:20"]
    );
}

#[tokio::test(start_paused = true)]
async fn forced_night_uses_night_interval_all_day() {
    let clock: Arc<dyn Clock> = Arc::new(AnchoredClock::starting_at(at(11, 0, 0)));
    let runner = Arc::new(Recorder::new(Arc::clone(&clock), Duration::ZERO));
    let engine = SchedulerEngine::new(
        policy(Some(DayNight::Night), 60, 600, false),
        300,
        Arc::clone(&clock),
        runner.clone(),
    );

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(engine.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_secs(1250)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(
        runner.fired_hms(),
        vec!["11:00:00", "11:10:00", "11:20:00"]
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_cooperative_cycle() {
    let clock: Arc<dyn Clock> = Arc::new(AnchoredClock::starting_at(at(12, 0, 0)));
    // Each cycle would take ten minutes if left alone.
    let runner = Arc::new(Recorder::new(Arc::clone(&clock), Duration::from_secs(600)));
    let engine = SchedulerEngine::new(
        policy(None, 300, 3600, false),
        300,
        Arc::clone(&clock),
        runner.clone(),
    );

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(engine.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_secs(5)).await;

    let started = tokio::time::Instant::now();
    shutdown.cancel();
    handle.await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(runner.fired_hms(), vec!["12:00:00"]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_stubborn_cycle_after_grace() {
    let clock: Arc<dyn Clock> = Arc::new(AnchoredClock::starting_at(at(12, 0, 0)));
    let runner = Arc::new(Stubborn {
        finished: AtomicBool::new(false),
    });
    let engine = SchedulerEngine::new(
        policy(None, 300, 3600, false),
        300,
        Arc::clone(&clock),
        runner.clone(),
    );

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(engine.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_secs(5)).await;

    let started = tokio::time::Instant::now();
    shutdown.cancel();
    handle.await.unwrap();
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(1) && waited < Duration::from_secs(2), "{waited:?}");
    assert!(!runner.finished.load(Ordering::SeqCst));
}
