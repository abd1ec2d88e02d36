use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use aerocam_core::format_utc;

use crate::destination::Destination;
use crate::error::{Result, UploadError};
use crate::types::{Artifact, UploadMetadata};

/// HTTP destination: one authenticated `PUT` of the JPEG per attempt.
pub struct ApiDestination {
    client: reqwest::Client,
    endpoint: String,
    key: String,
    timeout_secs: u64,
}

impl ApiDestination {
    pub fn new(endpoint: String, key: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            key,
            timeout_secs,
        })
    }
}

#[async_trait]
impl Destination for ApiDestination {
    fn name(&self) -> &str {
        "API"
    }

    async fn attempt_once(
        &self,
        artifact: &Artifact,
        metadata: &UploadMetadata,
    ) -> Result<Option<u16>> {
        debug!(
            endpoint = %self.endpoint,
            file = %artifact.filename,
            bytes = artifact.len(),
            "PUT image"
        );

        let resp = self
            .client
            .put(&self.endpoint)
            .bearer_auth(&self.key)
            .header(CONTENT_TYPE, "image/jpeg")
            .header("X-Capture-Timestamp", format_utc(metadata.timestamp))
            .header("X-Location", metadata.location.as_str())
            .header("X-Is-Day", metadata.is_day_header())
            .body(artifact.bytes.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UploadError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    UploadError::Http(e)
                }
            })?;

        // Any 2xx counts: receivers answer 200, 201 or 204 for a stored image.
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status, body = %body, "upload API rejected image");
            return Err(UploadError::Status { status, body });
        }
        Ok(Some(status))
    }
}
