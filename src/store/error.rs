//! Memory store error types
//!
//! Defines all errors that can occur in the persistence layer.

use thiserror::Error;

/// Errors that can occur in the memory store
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite reported an error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Another memory already holds this text
    #[error("Memory already exists: {0}")]
    Duplicate(String),

    /// CSV export failed
    #[error("Export error: {0}")]
    Export(String),

    /// A stored value could not be decoded
    #[error("Corrupt row: {0}")]
    Corruption(String),

    /// The blocking worker running the query died
    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<csv::Error> for StoreError {
    fn from(err: csv::Error) -> Self {
        StoreError::Export(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Corruption("bad sender 'bot'".to_string());
        assert_eq!(err.to_string(), "Corrupt row: bad sender 'bot'");

        let err = StoreError::Task("cancelled".to_string());
        assert_eq!(err.to_string(), "Background task failed: cancelled");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }
}
