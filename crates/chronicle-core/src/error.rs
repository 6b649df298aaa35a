//! Error types for the chronicle service.

use thiserror::Error;

/// Result type alias using chronicle's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for chronicle operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Place not found
    #[error("Place not found: {0}")]
    PlaceNotFound(uuid::Uuid),

    /// Request failed validation (shape, ranges, window ordering)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication failed (missing or mismatched API key)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Conflicting registration or state (e.g. duplicate source name)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation exceeded its wall-clock budget
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A source plugin failed during discover/extract
    #[error("Source '{source_name}' failed: {message}")]
    Source { source_name: String, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store unavailable (pool exhausted, connection loss)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Wrap a plugin failure, tagging the offending source.
    pub fn source(source: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Source {
            source_name: source.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn display_not_found() {
        let err = Error::NotFound("place 42".to_string());
        assert_eq!(err.to_string(), "Not found: place 42");
    }

    #[test]
    fn display_place_not_found_includes_id() {
        let id = Uuid::new_v4();
        let err = Error::PlaceNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn display_validation() {
        let err = Error::Validation("end must be > start".to_string());
        assert_eq!(err.to_string(), "Validation error: end must be > start");
    }

    #[test]
    fn display_source_names_the_plugin() {
        let err = Error::source("spotify", "rate limited");
        assert_eq!(err.to_string(), "Source 'spotify' failed: rate limited");
    }

    #[test]
    fn display_timeout() {
        let err = Error::Timeout("query exceeded 30s".to_string());
        assert_eq!(err.to_string(), "Timeout: query exceeded 30s");
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
