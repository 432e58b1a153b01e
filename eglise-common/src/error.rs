//! Common error types for the church hierarchy services

use thiserror::Error;

/// Common result type for hierarchy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the hierarchy crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored or supplied identifier is not a valid UUID
    #[error("Invalid identifier: {0}")]
    InvalidId(#[from] uuid::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing required field, excluded qualification or malformed input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Duplicate name, responsibility already held, membership elsewhere
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors raised before any write because the request itself
    /// was unacceptable (validation, conflict, not found).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::Validation(_) | Error::Conflict(_)
        )
    }

    /// Map a unique-constraint violation to a Conflict carrying `message`,
    /// passing every other error through unchanged.
    pub fn on_unique_violation(self, message: impl Into<String>) -> Self {
        match &self {
            Error::Database(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Error::Conflict(message.into())
            }
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_kinds() {
        assert!(Error::NotFound("x".into()).is_rejection());
        assert!(Error::Validation("x".into()).is_rejection());
        assert!(Error::Conflict("x".into()).is_rejection());
        assert!(!Error::Internal("x".into()).is_rejection());
        assert!(!Error::Config("x".into()).is_rejection());
    }

    #[test]
    fn non_database_errors_pass_through_unique_mapping() {
        let err = Error::Validation("bad".into()).on_unique_violation("dup");
        assert!(matches!(err, Error::Validation(msg) if msg == "bad"));
    }

    #[test]
    fn uuid_errors_convert() {
        let err: Error = uuid::Uuid::parse_str("not-a-uuid").unwrap_err().into();
        assert!(matches!(err, Error::InvalidId(_)));
    }
}
