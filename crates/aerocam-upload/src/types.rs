use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which variant of a captured frame an artifact carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Frame with the full text overlay burned in.
    Full,
    /// Frame annotated without the sun and weather lines. Carries the same
    /// embedded metadata and ships together with `cam.json` on SFTP.
    Clean,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Full => "full",
            ArtifactKind::Clean => "clean",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An encoded JPEG ready for delivery under its remote filename.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            filename: filename.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Per-cycle metadata sent alongside every artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadMetadata {
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub is_day: bool,
    pub raw_metar: Option<String>,
    pub raw_taf: Option<String>,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub camera_heading: String,
}

impl UploadMetadata {
    /// `"True"` / `"False"`, the form downstream consumers of the
    /// `X-Is-Day` header already parse.
    pub fn is_day_header(&self) -> &'static str {
        if self.is_day {
            "True"
        } else {
            "False"
        }
    }
}

/// Final result of delivering one artifact, after retries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    /// Set when delivery stopped because shutdown was requested.
    pub cancelled: bool,
    /// Attempts actually started.
    pub attempts: u32,
}

impl UploadOutcome {
    pub fn delivered(status_code: Option<u16>, attempts: u32) -> Self {
        Self {
            success: true,
            status_code,
            attempts,
            ..Default::default()
        }
    }

    pub fn failed(status_code: Option<u16>, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            success: false,
            status_code,
            error: Some(error.into()),
            cancelled: false,
            attempts,
        }
    }

    pub fn cancelled(attempts: u32) -> Self {
        Self {
            success: false,
            status_code: None,
            error: Some("Upload cancelled during shutdown".to_string()),
            cancelled: true,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_outcome_is_not_success() {
        let outcome = UploadOutcome::cancelled(1);
        assert!(!outcome.success);
        assert!(outcome.cancelled);
        assert_eq!(outcome.status_code, None);
    }
}
