use std::sync::Arc;

use async_trait::async_trait;

use aerocam_core::{AerocamConfig, UploadMethod};

use crate::api::ApiDestination;
use crate::error::{Result, UploadError};
use crate::meta_json::CamJsonTemplate;
use crate::sftp::SftpDestination;
use crate::types::{Artifact, UploadMetadata};

/// One delivery target. Implementations perform a single attempt; retries,
/// backoff and cancellation live in [`crate::retry::deliver`].
#[async_trait]
pub trait Destination: Send + Sync {
    /// Short name for logs, e.g. `"API"` or `"SFTP"`.
    fn name(&self) -> &str;

    /// Try once to deliver `artifact`. On success returns the HTTP status
    /// when the destination speaks HTTP.
    async fn attempt_once(&self, artifact: &Artifact, metadata: &UploadMetadata)
        -> Result<Option<u16>>;
}

/// Build the destination selected by `upload.method`.
pub fn build_destination(config: &AerocamConfig) -> Result<Arc<dyn Destination>> {
    match config.upload.method {
        UploadMethod::Api => {
            let api = config.upload.api.as_ref().ok_or_else(|| {
                UploadError::Config("upload.api is required when upload.method = \"api\"".into())
            })?;
            Ok(Arc::new(ApiDestination::new(
                api.url.clone(),
                api.key.clone(),
                api.timeout_seconds,
            )?))
        }
        UploadMethod::Sftp => {
            let sftp = config.upload.sftp.as_ref().ok_or_else(|| {
                UploadError::Config("upload.sftp is required when upload.method = \"sftp\"".into())
            })?;
            Ok(Arc::new(SftpDestination::new(
                sftp.clone(),
                CamJsonTemplate::from_config(config),
            )))
        }
    }
}
