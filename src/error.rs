//! Error types for lumascale

use thiserror::Error;

/// Result type alias for lumascale operations
pub type Result<T> = std::result::Result<T, Error>;

/// lumascale error type
#[derive(Error, Debug)]
pub enum Error {
    // Setup errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    // Frame processing errors
    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Resampling error: {0}")]
    Resample(String),

    #[error("Enhancement error: {0}")]
    Enhance(String),

    // I/O errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is raised while setting up a pipeline
    /// (the pipeline refuses to initialize rather than failing a frame)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Model(_) | Error::Json(_) | Error::Toml(_)
        )
    }

    /// Check if this error aborted a single frame
    pub fn is_frame_failure(&self) -> bool {
        matches!(
            self,
            Error::Allocation(_) | Error::Resample(_) | Error::Enhance(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::Config("width".into()).is_configuration());
        assert!(Error::Model("empty".into()).is_configuration());
        assert!(!Error::Allocation("scratch".into()).is_configuration());
        assert!(Error::Allocation("scratch".into()).is_frame_failure());
        assert!(Error::Enhance("engine".into()).is_frame_failure());
        assert!(!Error::Internal("x".into()).is_frame_failure());
    }
}
