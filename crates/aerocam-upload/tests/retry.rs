use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use aerocam_upload::{
    deliver, Artifact, ArtifactKind, Destination, Result, UploadError, UploadMetadata,
};

#[derive(Debug, Clone, Copy)]
enum Step {
    Ok,
    Status(u16),
    Timeout,
    AuthRejected,
    Hang,
}

/// Destination that replays a script and records when each attempt started.
struct Scripted {
    steps: Mutex<VecDeque<Step>>,
    started: Mutex<Vec<Instant>>,
}

impl Scripted {
    fn new(steps: &[Step]) -> Self {
        Self {
            steps: Mutex::new(steps.iter().copied().collect()),
            started: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    fn gaps(&self) -> Vec<Duration> {
        let started = self.started.lock().unwrap();
        started.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl Destination for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn attempt_once(&self, _: &Artifact, _: &UploadMetadata) -> Result<Option<u16>> {
        self.started.lock().unwrap().push(Instant::now());
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Ok);
        match step {
            Step::Ok => Ok(Some(201)),
            Step::Status(status) => Err(UploadError::Status {
                status,
                body: format!("status {status}"),
            }),
            Step::Timeout => Err(UploadError::Timeout { secs: 30 }),
            Step::AuthRejected => Err(UploadError::AuthRejected("denied".into())),
            Step::Hang => std::future::pending().await,
        }
    }
}

fn artifact() -> Artifact {
    Artifact::new(ArtifactKind::Full, "LFAS-North.jpg", vec![0xFF, 0xD8, 0xFF, 0xD9])
}

fn metadata() -> UploadMetadata {
    UploadMetadata {
        timestamp: Utc.with_ymd_and_hms(2026, 4, 10, 12, 0, 0).unwrap(),
        location: "LFAS".into(),
        is_day: true,
        raw_metar: None,
        raw_taf: None,
        sunrise: None,
        sunset: None,
        camera_heading: "060°".into(),
    }
}

#[tokio::test(start_paused = true)]
async fn first_success_returns_immediately() {
    let dest = Scripted::new(&[Step::Ok]);
    let outcome = deliver(&dest, &artifact(), &metadata(), &CancellationToken::new()).await;
    assert!(outcome.success);
    assert_eq!(outcome.status_code, Some(201));
    assert_eq!(dest.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn fail_fail_success_uses_one_and_two_second_backoff() {
    let dest = Scripted::new(&[Step::Status(503), Step::Timeout, Step::Ok]);
    let outcome = deliver(&dest, &artifact(), &metadata(), &CancellationToken::new()).await;

    assert!(outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(dest.attempts(), 3);
    assert_eq!(
        dest.gaps(),
        vec![Duration::from_millis(1000), Duration::from_millis(2000)]
    );
}

#[tokio::test(start_paused = true)]
async fn client_error_is_not_retried() {
    let dest = Scripted::new(&[Step::Status(400)]);
    let outcome = deliver(&dest, &artifact(), &metadata(), &CancellationToken::new()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.status_code, Some(400));
    assert_eq!(dest.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_credentials_are_not_retried() {
    let dest = Scripted::new(&[Step::AuthRejected]);
    let outcome = deliver(&dest, &artifact(), &metadata(), &CancellationToken::new()).await;
    assert!(!outcome.success);
    assert_eq!(dest.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn throttling_is_retried() {
    let dest = Scripted::new(&[Step::Status(429), Step::Ok]);
    let outcome = deliver(&dest, &artifact(), &metadata(), &CancellationToken::new()).await;
    assert!(outcome.success);
    assert_eq!(dest.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn three_server_errors_cite_the_last() {
    let dest = Scripted::new(&[Step::Status(500), Step::Status(502), Step::Status(503)]);
    let start = Instant::now();
    let outcome = deliver(&dest, &artifact(), &metadata(), &CancellationToken::new()).await;

    assert!(!outcome.success);
    assert!(!outcome.cancelled);
    assert_eq!(dest.attempts(), 3);
    assert_eq!(outcome.status_code, Some(503));
    assert_eq!(
        outcome.error.as_deref(),
        Some("All 3 upload attempts failed. Last error: HTTP 503: status 503")
    );
    // No wait after the final attempt.
    assert_eq!(start.elapsed(), Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_stops_retries() {
    let dest = Scripted::new(&[Step::Status(503), Step::Status(503), Step::Ok]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let outcome = deliver(&dest, &artifact(), &metadata(), &cancel).await;
    assert!(outcome.cancelled);
    assert!(!outcome.success);
    assert_eq!(dest.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_in_flight_attempt() {
    let dest = Scripted::new(&[Step::Hang]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let outcome = deliver(&dest, &artifact(), &metadata(), &cancel).await;
    assert!(outcome.cancelled);
    assert_eq!(dest.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_makes_no_attempt() {
    let dest = Scripted::new(&[Step::Ok]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = deliver(&dest, &artifact(), &metadata(), &cancel).await;
    assert!(outcome.cancelled);
    assert_eq!(dest.attempts(), 0);
}
