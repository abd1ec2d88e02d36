//! The capture cycle: acquire, annotate, deliver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use aerocam_core::DayNightResolver;
use aerocam_scheduler::{Clock, CycleOutcome, CycleRunner, SystemClock};
use aerocam_upload::filename::artifact_filename;
use aerocam_upload::{deliver_with_policy, Artifact, ArtifactKind, Destination, RetryPolicy};

use crate::augment::{Augmenter, RasterOverlay};
use crate::capture::FrameSource;
use crate::context::{CycleContext, PipelineSettings};
use crate::guard::CycleGuard;
use crate::weather::{WeatherReport, WeatherSource};

/// Runs capture cycles against one frame source and one destination.
///
/// Shared as `Arc<dyn CycleRunner>` by the scheduler engine. Only one cycle
/// runs at a time; overlapping triggers are skipped, not queued.
pub struct Pipeline {
    settings: PipelineSettings,
    resolver: DayNightResolver,
    frames: Arc<dyn FrameSource>,
    augmenter: Arc<dyn Augmenter>,
    weather: Option<Arc<dyn WeatherSource>>,
    destination: Arc<dyn Destination>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    guard: CycleGuard,
    camera_seen: AtomicBool,
    destination_seen: AtomicBool,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        resolver: DayNightResolver,
        frames: Arc<dyn FrameSource>,
        destination: Arc<dyn Destination>,
    ) -> Self {
        let augmenter = Arc::new(RasterOverlay::load(settings.overlay.clone()));
        Self {
            settings,
            resolver,
            frames,
            augmenter,
            weather: None,
            destination,
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
            guard: CycleGuard::new(),
            camera_seen: AtomicBool::new(false),
            destination_seen: AtomicBool::new(false),
        }
    }

    pub fn with_augmenter(mut self, augmenter: Arc<dyn Augmenter>) -> Self {
        self.augmenter = augmenter;
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherSource>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn guard(&self) -> &CycleGuard {
        &self.guard
    }

    #[instrument(name = "cycle", skip_all, fields(id = %Uuid::now_v7()))]
    async fn run_locked(&self, cancel: &CancellationToken) -> CycleOutcome {
        if cancel.is_cancelled() {
            info!("shutdown requested, cycle not started");
            return CycleOutcome::Cancelled;
        }

        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("cycle cancelled during capture");
                return CycleOutcome::Cancelled;
            }
            r = self.frames.capture() => r,
        };
        let frame = match frame {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "frame capture failed");
                return CycleOutcome::CaptureFailed;
            }
        };
        if !self.camera_seen.swap(true, Ordering::Relaxed) {
            info!("connected to camera");
        }
        debug!(bytes = frame.len(), "frame captured");

        if cancel.is_cancelled() {
            info!("cycle cancelled after capture");
            return CycleOutcome::Cancelled;
        }

        let captured_at = self.clock.now();
        let weather = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("cycle cancelled during weather lookup");
                return CycleOutcome::Cancelled;
            }
            w = self.fetch_weather() => w,
        };
        let ctx = CycleContext {
            captured_at,
            mode: self.resolver.mode_at(captured_at),
            sun: self.resolver.sun_times(captured_at),
            weather,
        };
        debug!(mode = %ctx.mode, "cycle context ready");

        let (full, clean) = self.annotate(&frame, &ctx).await;
        let (location, camera) = (&self.settings.location_name, &self.settings.camera_name);
        let artifacts = [
            Artifact::new(
                ArtifactKind::Full,
                artifact_filename(location, camera, ArtifactKind::Full),
                full,
            ),
            Artifact::new(
                ArtifactKind::Clean,
                artifact_filename(location, camera, ArtifactKind::Clean),
                clean,
            ),
        ];
        let metadata = ctx.upload_metadata(&self.settings);

        if cancel.is_cancelled() {
            info!("cycle cancelled before upload");
            return CycleOutcome::Cancelled;
        }

        let mut delivered = 0u8;
        let mut failed = 0u8;
        for artifact in &artifacts {
            let outcome = deliver_with_policy(
                self.destination.as_ref(),
                artifact,
                &metadata,
                cancel,
                self.retry,
            )
            .await;

            if outcome.cancelled {
                info!(kind = %artifact.kind, "upload cancelled during shutdown");
                return CycleOutcome::Cancelled;
            }
            if outcome.success {
                delivered += 1;
                if !self.destination_seen.swap(true, Ordering::Relaxed) {
                    info!("connected to {}", self.destination.name());
                }
                info!(
                    kind = %artifact.kind,
                    file = %artifact.filename,
                    bytes = artifact.len(),
                    attempts = outcome.attempts,
                    "artifact delivered"
                );
            } else {
                failed += 1;
                error!(
                    kind = %artifact.kind,
                    file = %artifact.filename,
                    status = ?outcome.status_code,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "artifact delivery failed"
                );
            }
        }

        info!(delivered, failed, mode = %ctx.mode, "cycle complete");
        CycleOutcome::Completed { delivered, failed }
    }

    async fn fetch_weather(&self) -> Option<WeatherReport> {
        if !self.settings.metar_enabled {
            return None;
        }
        let source = self.weather.as_ref()?;
        match source.fetch().await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "weather unavailable for this cycle");
                None
            }
        }
    }

    /// Full and clean artifacts, rendered off the async workers. If either
    /// fails, both fall back to the original frame so the pair stays
    /// consistent.
    async fn annotate(&self, frame: &[u8], ctx: &CycleContext) -> (Vec<u8>, Vec<u8>) {
        let augmenter = Arc::clone(&self.augmenter);
        let full_ctx = ctx.overlay(&self.settings, true);
        let clean_ctx = ctx.overlay(&self.settings, false);
        let source = frame.to_vec();
        let rendered = tokio::task::spawn_blocking(move || {
            (
                augmenter.augment(&source, &full_ctx),
                augmenter.augment(&source, &clean_ctx),
            )
        })
        .await;

        match rendered {
            Ok((Ok(full), Ok(clean))) => (full, clean),
            Ok((Err(e), _)) | Ok((_, Err(e))) => {
                warn!(error = %e, "augmentation failed, delivering original frame");
                (frame.to_vec(), frame.to_vec())
            }
            Err(e) => {
                warn!(error = %e, "augmentation task failed, delivering original frame");
                (frame.to_vec(), frame.to_vec())
            }
        }
    }
}

#[async_trait]
impl CycleRunner for Pipeline {
    async fn run_cycle(&self, shutdown: CancellationToken) -> CycleOutcome {
        let Some(lease) = self.guard.try_acquire(&shutdown) else {
            info!("previous capture cycle still running, skipping trigger");
            return CycleOutcome::Skipped;
        };
        self.run_locked(lease.token()).await
    }
}
