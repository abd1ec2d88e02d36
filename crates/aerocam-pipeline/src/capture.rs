//! Frame acquisition through an external `ffmpeg` process.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use aerocam_core::config::CameraConfig;

use crate::error::{PipelineError, Result};

pub const CAPTURE_TIMEOUT_SECS: u64 = 30;

/// Produces one encoded frame per call.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> Result<Vec<u8>>;
}

/// Grabs a single JPEG from an RTSP stream:
/// `ffmpeg -rtsp_transport tcp -i <url> -frames:v 1 -q:v 2 -f image2 pipe:1`.
#[derive(Debug, Clone)]
pub struct FfmpegCapture {
    program: String,
    input_url: String,
    redacted_url: String,
    timeout: Duration,
}

impl FfmpegCapture {
    pub fn from_config(camera: &CameraConfig) -> Self {
        let input_url = match (&camera.rtsp_user, &camera.rtsp_password) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                with_credentials(&camera.rtsp_url, user, password)
            }
            _ => camera.rtsp_url.clone(),
        };
        Self {
            program: "ffmpeg".to_string(),
            input_url,
            redacted_url: camera.redacted_url(),
            timeout: Duration::from_secs(CAPTURE_TIMEOUT_SECS),
        }
    }

    /// Use a different executable (e.g. an absolute path found at startup).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn args(&self) -> Vec<String> {
        [
            "-rtsp_transport",
            "tcp",
            "-i",
            self.input_url.as_str(),
            "-frames:v",
            "1",
            "-q:v",
            "2",
            "-f",
            "image2",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

#[async_trait]
impl FrameSource for FfmpegCapture {
    async fn capture(&self) -> Result<Vec<u8>> {
        debug!(program = %self.program, url = %self.redacted_url, "capturing frame");

        // kill_on_drop reaps ffmpeg when the timeout (or a cancelled cycle)
        // drops the wait future.
        let child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(PipelineError::CaptureSpawn)?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(PipelineError::CaptureSpawn)?,
            Err(_) => {
                return Err(PipelineError::CaptureTimeout {
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::CaptureExit {
                code: output.status.code().unwrap_or(-1),
                stderr: last_line(&stderr).to_string(),
            });
        }
        if output.stdout.is_empty() {
            return Err(PipelineError::EmptyFrame);
        }
        Ok(output.stdout)
    }
}

/// Splice `user:password@` into an RTSP URL, replacing any credentials it
/// already carries. The username is percent-encoded when it contains URL
/// delimiters; the password is passed through untouched because several
/// camera firmwares reject encoded passwords.
pub fn with_credentials(url: &str, user: &str, password: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let (authority_end, _) = rest
        .char_indices()
        .find(|(_, c)| *c == '/' || *c == '?')
        .unwrap_or((rest.len(), ' '));
    let (authority, tail) = rest.split_at(authority_end);
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    format!("{scheme}://{}:{password}@{host}{tail}", encode_user(user))
}

fn encode_user(user: &str) -> String {
    const DELIMITERS: &[char] = &['@', ':', '/', '?', '#', '[', ']'];
    if !user.contains(DELIMITERS) {
        return user.to_string();
    }
    let mut out = String::with_capacity(user.len() * 3);
    for b in user.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// ffmpeg prints a banner before the real error; the last non-empty line
/// is the useful one.
fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Unknown error")
}
