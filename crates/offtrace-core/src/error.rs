//! Error types for offtrace

use thiserror::Error;

/// Main error type for offtrace
#[derive(Error, Debug)]
pub enum OffTraceError {
    /// A parameter or table fell outside its accepted range or shape.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for offtrace operations
pub type Result<T> = std::result::Result<T, OffTraceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let err = OffTraceError::InvalidArgument("Learning rate must be > 0 and <= 1".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid argument: Learning rate must be > 0 and <= 1"
        );
    }

    #[test]
    fn test_serialization_from() {
        let parse_err = serde_json::from_str::<f64>("not a number").unwrap_err();
        let err: OffTraceError = parse_err.into();
        assert!(matches!(err, OffTraceError::Serialization(_)));
    }
}
