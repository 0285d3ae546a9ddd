//! Error types for the Windowguard service.

use thiserror::Error;

/// Main error type for Windowguard operations.
///
/// A denied request is not an error; it is reported through
/// [`Decision`](crate::ratelimit::Decision).
#[derive(Error, Debug)]
pub enum WindowGuardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The identity key passed to a check was empty
    #[error("Invalid key: identity key must not be empty")]
    InvalidKey,

    /// The cost passed to a check was not positive
    #[error("Invalid cost: {0} (cost must be at least 1)")]
    InvalidCost(u64),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WindowGuardError {
    /// Whether this error was caused by the caller and not by the service.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, WindowGuardError::InvalidKey | WindowGuardError::InvalidCost(_))
    }
}

impl From<::config::ConfigError> for WindowGuardError {
    fn from(err: ::config::ConfigError) -> Self {
        WindowGuardError::Config(err.to_string())
    }
}

/// Result type alias for Windowguard operations.
pub type Result<T> = std::result::Result<T, WindowGuardError>;
