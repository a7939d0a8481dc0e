//! Engine error types

use thiserror::Error;

/// Errors from imdedup-core operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid thresholds, blocker names, or LSH parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing or corrupt shipped calibration tables.
    #[error("calibration error: {0}")]
    Calibration(String),

    /// Malformed raw record lacking both an id and a source identifier.
    #[error("input error: {0}")]
    Input(String),

    /// Artifact write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Stable kind label used in audit output.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Configuration(_) => "configuration",
            EngineError::Calibration(_) => "calibration",
            EngineError::Input(_) => "input",
            EngineError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::Configuration("t_low > t_high".to_string());
        assert_eq!(err.to_string(), "configuration error: t_low > t_high");
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: EngineError = io.into();
        assert_eq!(err.kind(), "io");
    }
}
