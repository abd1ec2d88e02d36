//! `aerocam-core`: configuration, shared types and solar calculations used by
//! every other aerocam crate.

pub mod config;
pub mod daynight;
pub mod error;
pub mod sun;
pub mod types;

pub use config::AerocamConfig;
pub use daynight::DayNightResolver;
pub use error::{AerocamError, Result};
pub use sun::{SolarCalculator, SunSource};
pub use types::{format_utc, DayNight, SolarDay, SunTimes, UploadMethod};
