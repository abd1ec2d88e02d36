use thiserror::Error;

/// Failure of a single delivery attempt.
///
/// [`UploadError::is_retryable`] decides whether the retry wrapper tries
/// again or gives up straight away.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timeout after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SFTP authentication failed: {0}")]
    AuthRejected(String),

    #[error("SFTP error: {0}")]
    Sftp(String),

    #[error("Failed to create remote directory {path}: {reason}")]
    RemoteDir { path: String, reason: String },

    #[error("Failed to write {what}: {reason}")]
    RemoteWrite { what: &'static str, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Destination misconfigured: {0}")]
    Config(String),

    #[error("Upload cancelled during shutdown")]
    Cancelled,
}

impl UploadError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Client-class HTTP statuses (4xx other than 408 and 429), rejected
    /// credentials and local misconfiguration are final; everything else
    /// (5xx, timeouts, connection and transport faults) is retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Status { status, .. } => !is_client_error(*status),
            UploadError::Http(e) => !e.is_builder(),
            UploadError::Timeout { .. }
            | UploadError::Sftp(_)
            | UploadError::RemoteDir { .. }
            | UploadError::RemoteWrite { .. } => true,
            UploadError::AuthRejected(_)
            | UploadError::Serialization(_)
            | UploadError::Config(_)
            | UploadError::Cancelled => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UploadError::Status { status, .. } => Some(*status),
            UploadError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<ssh2::Error> for UploadError {
    fn from(e: ssh2::Error) -> Self {
        UploadError::Sftp(e.to_string())
    }
}

fn is_client_error(status: u16) -> bool {
    (400..500).contains(&status) && status != 408 && status != 429
}

pub type Result<T> = std::result::Result<T, UploadError>;
