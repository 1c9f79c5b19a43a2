//! Common error types for the Karwan directory

use crate::validation::ValidationErrors;
use thiserror::Error;

/// Common result type for directory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the store, schema manager and directory service
#[derive(Error, Debug)]
pub enum Error {
    /// Required field missing/empty or malformed email; nothing was persisted
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Identity key already exists on a create request
    #[error("Profile already exists for {0} (use update mode)")]
    DuplicateIdentity(String),

    /// Requested profile or identity key not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage I/O or constraint failure (wraps sqlx::Error)
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Schema could not be brought to the current generation
    #[error("Migration error: {0}")]
    Migration(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored data could not be decoded into the domain model
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl Error {
    /// Convert any failure raised while preparing the schema into a fatal
    /// migration error, keeping the original message.
    pub fn into_migration(self) -> Self {
        match self {
            Error::Migration(_) => self,
            other => Error::Migration(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}
