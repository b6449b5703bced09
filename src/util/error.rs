//! Error types for the graphflat library.

use thiserror::Error;

/// Main error type for graph/record conversion operations.
///
/// Conversion failures are localized: the surrounding machinery reports
/// them as rejection attributes or diagnostics and continues the batch.
#[derive(Error, Debug)]
pub enum Error {
    /// Remote graph store unreachable or object missing
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    /// Outbound commit to the remote store failed
    #[error("Transmission failed: {0}")]
    Transmission(String),

    /// Record carries an unknown target-type discriminator
    #[error("Unsupported target type: {0}")]
    UnsupportedType(String),

    /// Node kind has no geometry conversion
    #[error("Unsupported geometry kind: {0}")]
    UnsupportedGeometry(String),

    /// Traversal revisited a node id
    #[error("Cycle detected at node {0}")]
    CycleDetected(String),

    /// Required attribute missing from a record
    #[error("Missing attribute: {0}")]
    MissingAttribute(String),

    /// Value shape does not match the expected scalar type
    #[error("Type mismatch at {label}: expected {expected}, got {actual}")]
    TypeMismatch {
        label: String,
        expected: String,
        actual: String,
    },

    /// Malformed wire data (JSON dump, URL)
    #[error("Invalid wire data: {0}")]
    InvalidWire(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid wire data error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidWire(msg.into())
    }
}

/// Result type alias for graphflat operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::CycleDetected("abc123".into());
        assert!(e.to_string().contains("abc123"));

        let e = Error::TypeMismatch {
            label: "parameters.height".into(),
            expected: "Real64".into(),
            actual: "List".into(),
        };
        assert!(e.to_string().contains("parameters.height"));
        assert!(e.to_string().contains("Real64"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
