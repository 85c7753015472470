//! Common error types for StudyHub

use thiserror::Error;

/// Common result type for StudyHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across StudyHub services
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Payload failed structural validation
    #[error("Validation error: {0}")]
    Validation(String),
}
