use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::runtime::Runtime;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use aerocam_core::{AerocamConfig, DayNightResolver, SolarCalculator};
use aerocam_pipeline::{FfmpegCapture, MetarClient, Pipeline, PipelineSettings};
use aerocam_scheduler::engine::SHUTDOWN_GRACE;
use aerocam_scheduler::{SchedulerEngine, SystemClock, TriggerPolicy};

/// Aerocam - periodic webcam capture and upload with a day/night cadence
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file (default ~/.aerocam/aerocam.toml)
    #[arg(short, long, env = "AEROCAM_CONFIG")]
    config: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aerocam=info,aerocam_daemon=info,aerocam_pipeline=info,\
                 aerocam_scheduler=info,aerocam_upload=info"
                    .into()
            }),
        )
        .init();

    let args = Args::parse();

    // Config errors are fatal: nothing useful can run without a camera and
    // a destination.
    let config = match AerocamConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(code = e.code(), "{e}");
            return ExitCode::FAILURE;
        }
    };
    if args.check_config {
        info!("configuration is valid");
        return ExitCode::SUCCESS;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match block_on_bounded(runtime, run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Run `future` to completion, then tear the runtime down without waiting
/// longer than [`SHUTDOWN_GRACE`] for blocking tasks that are still stuck
/// (an abandoned SSH session or DNS lookup).
fn block_on_bounded<F: Future>(runtime: Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    output
}

async fn run(config: AerocamConfig) -> anyhow::Result<()> {
    let ffmpeg = which::which("ffmpeg").context(
        "ffmpeg not found on PATH; install it (e.g. `apt install ffmpeg`) and retry",
    )?;
    log_summary(&config);

    let destination = aerocam_upload::build_destination(&config)
        .context("failed to initialise upload destination")?;

    let sun = Arc::new(SolarCalculator::new(
        config.location.latitude,
        config.location.longitude,
    ));
    let resolver = DayNightResolver::new(sun, config.debug.day_night_override);

    let frames = FfmpegCapture::from_config(&config.camera)
        .with_program(ffmpeg.to_string_lossy().into_owned());
    let mut pipeline = Pipeline::new(
        PipelineSettings::from_config(&config),
        resolver.clone(),
        Arc::new(frames),
        destination,
    );
    if config.metar.enabled {
        let metar = MetarClient::new(config.metar.api_url.clone(), config.metar.icao_code.clone())
            .context("failed to build METAR client")?;
        pipeline = pipeline.with_weather(Arc::new(metar));
    }

    let engine = SchedulerEngine::new(
        TriggerPolicy::from_config(&config, resolver),
        config.reevaluate_interval_secs(),
        Arc::new(SystemClock),
        Arc::new(pipeline),
    )
    .with_countdown(config.debug.enabled);

    let shutdown = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(shutdown.clone()));

    shutdown_signal().await;
    shutdown.cancel();
    if let Err(e) = engine_task.await {
        warn!(error = %e, "scheduler task ended abnormally");
    }
    info!("aerocam stopped");
    Ok(())
}

fn log_summary(config: &AerocamConfig) {
    let (day, night) = config.intervals();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        location = %config.location.name,
        latitude = config.location.latitude,
        longitude = config.location.longitude,
        camera = %config.camera.redacted_url(),
        upload = %config.upload.method,
        day_interval_secs = day,
        night_interval_secs = night,
        metar = config.metar.enabled,
        "aerocam starting"
    );
    if config.debug.enabled {
        warn!(
            override_mode = ?config.debug.day_night_override,
            "debug mode enabled: short intervals, no sunrise/sunset triggers"
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
