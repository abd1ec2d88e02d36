use thiserror::Error;

/// Errors raised inside a capture cycle. None of them escape
/// [`crate::Pipeline`]; they end up as log lines and a cycle outcome.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// ffmpeg could not be started.
    #[error("ffmpeg spawn error: {0}")]
    CaptureSpawn(#[source] std::io::Error),

    #[error("ffmpeg exited with code {code}: {stderr}")]
    CaptureExit { code: i32, stderr: String },

    #[error("ffmpeg timeout after {secs}s")]
    CaptureTimeout { secs: u64 },

    #[error("ffmpeg produced no output")]
    EmptyFrame,

    /// The image is not a JPEG the augmenter can annotate.
    #[error("Augmentation failed: {0}")]
    Augment(String),

    #[error("Weather lookup failed: {0}")]
    Weather(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
