//! Platform-specific errors

use thiserror::Error;

/// Platform adapter errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Settings file is not a JSON object
    #[error("Invalid settings file {path}: {message}")]
    InvalidSettingsFile {
        /// Path to the offending file
        path: String,
        /// What was wrong with it
        message: String,
    },

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Platform result type
pub type Result<T> = std::result::Result<T, PlatformError>;

impl PlatformError {
    /// Create an invalid-settings-file error
    pub fn invalid_settings_file(
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidSettingsFile {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<PlatformError> for detour_core::Error {
    fn from(err: PlatformError) -> Self {
        detour_core::Error::storage(err.to_string())
    }
}
