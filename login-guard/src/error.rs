//! Error types for the login guard
//!
//! Per-call login outcomes (invalid credentials, locked accounts, provider
//! outages) are reported through [`LoginOutcome`](crate::guard::LoginOutcome),
//! not through this type. [`Error`] covers configuration problems and failures
//! of the collaborators the guard calls into.

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Configuration values failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// The referenced account does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Resource conflict (e.g. registering an existing account id)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Account store failure
    #[error("Account store error: {0}")]
    Store(String),

    /// Audit store failure
    #[error("Audit error: {0}")]
    Audit(String),

    /// Identity provider setup failure (bad URL, HTTP client construction)
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same call may succeed
    ///
    /// Collaborator failures are transient; caller errors are not.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Audit(_) | Self::Io(_))
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Audit(format!("Failed to serialize audit entry: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::AccountNotFound("alice@example.com".to_string());
        assert_eq!(err.to_string(), "Account not found: alice@example.com");

        let err = Error::Validation("failure_threshold must be greater than 0".into());
        assert_eq!(
            err.to_string(),
            "Validation error: failure_threshold must be greater than 0"
        );
    }

    #[test]
    fn test_retriable_classification() {
        assert!(Error::Store("connection reset".into()).is_retriable());
        assert!(Error::Audit("disk full".into()).is_retriable());
        assert!(!Error::AccountNotFound("bob".into()).is_retriable());
        assert!(!Error::Conflict("bob".into()).is_retriable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_retriable());
    }
}
