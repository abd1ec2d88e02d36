//! `aerocam-pipeline`: one capture cycle, end to end.
//!
//! A cycle acquires a frame, derives the day/night and weather context,
//! produces a full and a clean artifact, and delivers both in that order.
//! [`CycleGuard`] keeps it single-flight; every stage checks the shutdown
//! token so a cancelled cycle stops at the next boundary.

pub mod augment;
pub mod capture;
pub mod context;
pub mod cycle;
pub mod error;
pub mod guard;
pub mod weather;

pub use augment::{Augmenter, OverlayContext, OverlayStyle, RasterOverlay};
pub use capture::{FfmpegCapture, FrameSource};
pub use context::{CycleContext, PipelineSettings};
pub use cycle::Pipeline;
pub use error::{PipelineError, Result};
pub use guard::{CycleGuard, CycleLease};
pub use weather::{MetarClient, WeatherReport, WeatherSource};
