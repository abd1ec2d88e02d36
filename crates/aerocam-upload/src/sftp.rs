//! SFTP destination.
//!
//! `ssh2` sessions are blocking, so each attempt runs on tokio's blocking
//! pool and the whole connect/auth/write sequence sits under one timeout.
//! The blocking side shares the same deadline: every SSH call is bounded by
//! the budget left, so an abandoned attempt unwinds by the time the next
//! one starts instead of writing the same remote path concurrently.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ssh2::ErrorCode;
use tracing::debug;

use aerocam_core::config::SftpConfig;

use crate::destination::Destination;
use crate::error::{Result, UploadError};
use crate::filename::{remote_join, side_document_path};
use crate::meta_json::CamJsonTemplate;
use crate::types::{Artifact, ArtifactKind, UploadMetadata};

// libssh2 session error codes that mean the server refused the credentials.
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
const LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED: i32 = -19;

/// The remote filesystem operations an upload needs.
///
/// Kept narrow so the write sequence can be exercised against an in-memory
/// implementation.
pub trait RemoteFs {
    fn list_dir(&self, path: &str) -> Result<()>;
    fn create_dir_all(&self, path: &str) -> Result<()>;
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<()>;
}

/// Everything one attempt writes, resolved before connecting.
#[derive(Debug, Clone)]
pub struct UploadPlan {
    pub remote_dir: String,
    pub image_path: String,
    pub image: Vec<u8>,
    /// `(path, bytes)` of `cam.json`, present for the clean artifact only.
    pub side_document: Option<(String, Vec<u8>)>,
}

impl UploadPlan {
    /// List the directory, create it if listing fails, write the image,
    /// then the side-document. Any failure fails the whole attempt.
    pub fn execute(&self, fs: &dyn RemoteFs) -> Result<()> {
        if fs.list_dir(&self.remote_dir).is_err() {
            fs.create_dir_all(&self.remote_dir)
                .map_err(|e| UploadError::RemoteDir {
                    path: self.remote_dir.clone(),
                    reason: e.to_string(),
                })?;
        }
        fs.write_file(&self.image_path, &self.image)
            .map_err(|e| UploadError::RemoteWrite {
                what: "image file to SFTP server",
                reason: e.to_string(),
            })?;
        if let Some((path, bytes)) = &self.side_document {
            fs.write_file(path, bytes)
                .map_err(|e| UploadError::RemoteWrite {
                    what: "JSON metadata file to SFTP server",
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

pub struct SftpDestination {
    settings: Arc<SftpConfig>,
    cam_json: CamJsonTemplate,
}

impl SftpDestination {
    pub fn new(settings: SftpConfig, cam_json: CamJsonTemplate) -> Self {
        Self {
            settings: Arc::new(settings),
            cam_json,
        }
    }

    pub fn plan(&self, artifact: &Artifact, metadata: &UploadMetadata) -> Result<UploadPlan> {
        let remote_dir = self.settings.remote_path.trim_end_matches('/').to_string();
        let side_document = match artifact.kind {
            ArtifactKind::Clean => Some((
                side_document_path(&remote_dir),
                self.cam_json.render(metadata, &artifact.filename)?,
            )),
            ArtifactKind::Full => None,
        };
        Ok(UploadPlan {
            image_path: remote_join(&remote_dir, &artifact.filename),
            remote_dir,
            image: artifact.bytes.clone(),
            side_document,
        })
    }
}

#[async_trait]
impl Destination for SftpDestination {
    fn name(&self) -> &str {
        "SFTP"
    }

    async fn attempt_once(
        &self,
        artifact: &Artifact,
        metadata: &UploadMetadata,
    ) -> Result<Option<u16>> {
        let plan = self.plan(artifact, metadata)?;
        let settings = Arc::clone(&self.settings);
        let timeout = Duration::from_secs(settings.timeout_seconds);

        debug!(
            host = %settings.host,
            path = %plan.image_path,
            bytes = plan.image.len(),
            cam_json = plan.side_document.is_some(),
            "SFTP upload"
        );

        let deadline = Deadline::after(timeout);
        let job = tokio::task::spawn_blocking(move || {
            let fs = Ssh2Fs::connect(&settings, deadline)?;
            plan.execute(&fs)
        });

        match tokio::time::timeout(timeout, job).await {
            Err(_) => Err(UploadError::Timeout {
                secs: self.settings.timeout_seconds,
            }),
            Ok(Err(join)) => Err(UploadError::Sftp(format!("upload task failed: {join}"))),
            Ok(Ok(result)) => result.map(|()| None),
        }
    }
}

/// Wall-clock budget shared by every blocking call of one attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub(crate) fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// Time left, or `Timeout` once the budget is spent.
    pub(crate) fn remaining(&self) -> Result<Duration> {
        match self.at.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(left),
            _ => Err(UploadError::Timeout {
                secs: self.budget.as_secs(),
            }),
        }
    }
}

/// Map a failed `userauth_password`. Only an explicit refusal is final;
/// timeouts and socket errors during auth are retried like any other
/// transport failure.
fn auth_error(e: ssh2::Error) -> UploadError {
    match e.code() {
        ErrorCode::Session(
            LIBSSH2_ERROR_AUTHENTICATION_FAILED | LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED,
        ) => UploadError::AuthRejected(e.to_string()),
        _ => UploadError::Sftp(format!("authentication: {e}")),
    }
}

/// [`RemoteFs`] over a live `ssh2` SFTP channel.
struct Ssh2Fs {
    sftp: ssh2::Sftp,
    // Dropping the session closes the channel, so it must outlive `sftp`.
    session: ssh2::Session,
    deadline: Deadline,
}

impl Ssh2Fs {
    fn connect(settings: &SftpConfig, deadline: Deadline) -> Result<Self> {
        let addr = (settings.host.as_str(), settings.port)
            .to_socket_addrs()
            .map_err(|e| UploadError::Sftp(format!("resolve {}: {e}", settings.host)))?
            .next()
            .ok_or_else(|| UploadError::Sftp(format!("no address for {}", settings.host)))?;
        let tcp = TcpStream::connect_timeout(&addr, deadline.remaining()?)
            .map_err(|e| UploadError::Sftp(format!("connect {addr}: {e}")))?;

        let mut session = ssh2::Session::new()?;
        session.set_tcp_stream(tcp);
        bound(&session, deadline)?;
        session.handshake()?;
        bound(&session, deadline)?;
        session
            .userauth_password(&settings.user, &settings.password)
            .map_err(auth_error)?;
        if !session.authenticated() {
            return Err(UploadError::AuthRejected(format!(
                "server did not accept credentials for {}",
                settings.user
            )));
        }
        bound(&session, deadline)?;
        let sftp = session.sftp()?;
        Ok(Self {
            sftp,
            session,
            deadline,
        })
    }

    fn bound(&self) -> Result<()> {
        bound(&self.session, self.deadline)
    }
}

/// Cap the next blocking session call at the attempt's remaining budget.
fn bound(session: &ssh2::Session, deadline: Deadline) -> Result<()> {
    let left = deadline.remaining()?;
    session.set_timeout(u32::try_from(left.as_millis()).unwrap_or(u32::MAX).max(1));
    Ok(())
}

impl RemoteFs for Ssh2Fs {
    fn list_dir(&self, path: &str) -> Result<()> {
        self.bound()?;
        self.sftp.readdir(Path::new(path))?;
        Ok(())
    }

    fn create_dir_all(&self, path: &str) -> Result<()> {
        let mut current = String::new();
        for part in path.split('/') {
            if part.is_empty() {
                if current.is_empty() && path.starts_with('/') {
                    current.push('/');
                }
                continue;
            }
            if !current.is_empty() && !current.ends_with('/') {
                current.push('/');
            }
            current.push_str(part);
            self.bound()?;
            let dir = Path::new(&current);
            if self.sftp.stat(dir).is_ok() {
                continue;
            }
            if let Err(e) = self.sftp.mkdir(dir, 0o755) {
                // Lost a race with another writer; fine if it exists now.
                if self.sftp.stat(dir).is_err() {
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.bound()?;
        let mut file = self.sftp.create(Path::new(path))?;
        file.write_all(bytes)
            .map_err(|e| UploadError::Sftp(format!("write {path}: {e}")))?;
        Ok(())
    }
}
