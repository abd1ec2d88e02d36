//! `aerocam-upload`: delivers captured images to the configured destination.
//!
//! # Destinations
//!
//! | Kind   | Wire shape                                                   |
//! |--------|--------------------------------------------------------------|
//! | `api`  | one `PUT` with bearer auth and `X-Capture-*` headers          |
//! | `sftp` | file write over SSH, plus `cam.json` next to the clean image  |
//!
//! Both sit behind [`Destination::attempt_once`]; [`retry::deliver`] wraps a
//! single attempt with the shared retry/backoff policy and cancellation.

pub mod api;
pub mod destination;
pub mod error;
pub mod filename;
pub mod meta_json;
pub mod retry;
pub mod sftp;
pub mod types;

pub use destination::{build_destination, Destination};
pub use error::{Result, UploadError};
pub use retry::{deliver, deliver_with_policy, RetryPolicy};
pub use types::{Artifact, ArtifactKind, UploadMetadata, UploadOutcome};
