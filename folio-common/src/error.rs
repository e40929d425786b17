//! Common error types for Folio

use thiserror::Error;

/// Common result type for Folio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Folio crates
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem access (database directory, buckets, config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unparseable config file or stored setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested row or object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input (form fields, bucket names, ids)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Error::Internal(format!("Malformed UUID in database: {}", err))
    }
}
