use thiserror::Error;

#[derive(Debug, Error)]
pub enum AerocamError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AerocamError {
    /// Short error code string, stable across releases, used in log fields.
    pub fn code(&self) -> &'static str {
        match self {
            AerocamError::Config(_) => "CONFIG_ERROR",
            AerocamError::InvalidConfig { .. } => "INVALID_CONFIG",
            AerocamError::Serialization(_) => "SERIALIZATION_ERROR",
            AerocamError::Io(_) => "IO_ERROR",
        }
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        AerocamError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AerocamError>;
