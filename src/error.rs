//! Error types for geonear.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GeoNearError>;

/// Errors surfaced by the location store and its collaborators.
#[derive(Debug, Error)]
pub enum GeoNearError {
    /// Malformed coordinates or query parameters.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A storage backend could not be reached or failed its health check.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Unknown storage mode string.
    #[error("Invalid storage mode: {0}")]
    InvalidMode(String),

    /// Configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A seeding source file does not exist.
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeoNearError {
    /// True for errors that mean "could not query", as opposed to bad input.
    pub fn is_storage_failure(&self) -> bool {
        !matches!(
            self,
            GeoNearError::InvalidInput(_) | GeoNearError::InvalidMode(_) | GeoNearError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = GeoNearError::InvalidInput("latitude must be finite".into());
        assert_eq!(err.to_string(), "Invalid input: latitude must be finite");

        let err = GeoNearError::SourceNotFound(PathBuf::from("data/big_cities.json"));
        assert_eq!(err.to_string(), "Source file not found: data/big_cities.json");
    }

    #[test]
    fn test_storage_failure_classification() {
        assert!(!GeoNearError::InvalidInput("x".into()).is_storage_failure());
        assert!(GeoNearError::BackendUnavailable("down".into()).is_storage_failure());
        assert!(GeoNearError::SourceNotFound(PathBuf::from("x.json")).is_storage_failure());
    }
}
