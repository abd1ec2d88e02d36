//! Bounded retry with exponential backoff around a single [`Destination`]
//! attempt.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::destination::Destination;
use crate::error::UploadError;
use crate::types::{Artifact, UploadMetadata, UploadOutcome};

pub const MAX_ATTEMPTS: u32 = 3;
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_backoff: INITIAL_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based): 1s, 2s, 4s...
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Deliver `artifact` with the default policy (3 attempts, 1s then 2s).
pub async fn deliver(
    destination: &dyn Destination,
    artifact: &Artifact,
    metadata: &UploadMetadata,
    cancel: &CancellationToken,
) -> UploadOutcome {
    deliver_with_policy(destination, artifact, metadata, cancel, RetryPolicy::default()).await
}

/// Deliver `artifact`, retrying retryable failures per `policy`.
///
/// Success and non-retryable failures return immediately. Cancellation,
/// whether during an attempt or a backoff wait, returns an outcome with
/// `cancelled = true` and starts no further attempts.
pub async fn deliver_with_policy(
    destination: &dyn Destination,
    artifact: &Artifact,
    metadata: &UploadMetadata,
    cancel: &CancellationToken,
    policy: RetryPolicy,
) -> UploadOutcome {
    let mut last_error: Option<UploadError> = None;

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return UploadOutcome::cancelled(attempt - 1);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return UploadOutcome::cancelled(attempt),
            r = destination.attempt_once(artifact, metadata) => r,
        };

        match result {
            Ok(status) => {
                if attempt > 1 {
                    info!(
                        destination = destination.name(),
                        file = %artifact.filename,
                        attempt,
                        "upload succeeded after retry"
                    );
                }
                return UploadOutcome::delivered(status, attempt);
            }
            Err(UploadError::Cancelled) => return UploadOutcome::cancelled(attempt),
            Err(e) if !e.is_retryable() => {
                warn!(
                    destination = destination.name(),
                    file = %artifact.filename,
                    error = %e,
                    "upload failed, not retrying"
                );
                return UploadOutcome::failed(e.status_code(), e.to_string(), attempt);
            }
            Err(e) => {
                warn!(
                    destination = destination.name(),
                    file = %artifact.filename,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "upload attempt failed"
                );
                last_error = Some(e);
            }
        }

        if attempt < policy.max_attempts {
            let wait = policy.backoff_after(attempt);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return UploadOutcome::cancelled(attempt),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    let status = last_error.as_ref().and_then(UploadError::status_code);
    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempts made".to_string());
    UploadOutcome::failed(
        status,
        format!(
            "All {} upload attempts failed. Last error: {reason}",
            policy.max_attempts
        ),
        policy.max_attempts,
    )
}
