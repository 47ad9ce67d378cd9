//! Error types for buzza operations.
//!
//! Every store operation returns a [`BuzzaError`] whose variant is the error
//! kind. Callers map kinds to responses; the message carries the operation
//! context accumulated on the way up.

use thiserror::Error;

/// Result type alias for buzza operations.
pub type BuzzaResult<T> = Result<T, BuzzaError>;

/// Main error type for all buzza operations.
#[derive(Error, Debug)]
pub enum BuzzaError {
    /// No current record matches the request.
    #[error("Not found: {message}")]
    NotFound { message: String, code: ErrorCode },

    /// Caller supplied malformed or missing input.
    #[error("Validation error: {message}")]
    Validation { message: String, code: ErrorCode },

    /// Stored data violates an invariant the queries rely on.
    #[error("Integrity violation: {message}")]
    Integrity { message: String, code: ErrorCode },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,
    ValInvalidCursor,

    // Program (PRG_xxx)
    PrgNotFound,
    PrgMultipleLatest,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,
    DbInterrupted,
    DbCorruptRow,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ValInvalidCursor => "VAL_003",
            ErrorCode::PrgNotFound => "PRG_001",
            ErrorCode::PrgMultipleLatest => "PRG_002",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::DbInterrupted => "DB_003",
            ErrorCode::DbCorruptRow => "DB_004",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl BuzzaError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
        }
    }

    /// Create a validation error for a required field that is absent or empty.
    pub fn missing_field(field: &str) -> Self {
        Self::Validation {
            message: format!("missing {}", field),
            code: ErrorCode::ValMissingField,
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: ErrorCode::PrgNotFound,
        }
    }

    /// Create an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
            code: ErrorCode::PrgMultipleLatest,
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Prefix the message with the operation that failed, keeping the kind.
    pub fn context(self, op: &str) -> Self {
        match self {
            Self::NotFound { message, code } => Self::NotFound {
                message: format!("{}: {}", op, message),
                code,
            },
            Self::Validation { message, code } => Self::Validation {
                message: format!("{}: {}", op, message),
                code,
            },
            Self::Integrity { message, code } => Self::Integrity {
                message: format!("{}: {}", op, message),
                code,
            },
            Self::Database {
                message,
                code,
                source,
            } => Self::Database {
                message: format!("{}: {}", op, message),
                code,
                source,
            },
            Self::Configuration(msg) => Self::Configuration(format!("{}: {}", op, msg)),
            Self::Internal(msg) => Self::Internal(format!("{}: {}", op, msg)),
            // Source errors keep their own Display.
            other @ (Self::Io(_) | Self::Serialization(_)) => other,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::Integrity { code, .. } => *code,
            Self::Database { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether the statement was aborted because its call ran past its deadline.
    pub fn is_interrupted(&self) -> bool {
        self.code() == ErrorCode::DbInterrupted
    }
}

impl From<rusqlite::Error> for BuzzaError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::OperationInterrupted) => ErrorCode::DbInterrupted,
            Some(rusqlite::ErrorCode::CannotOpen) => ErrorCode::DbConnectionFailed,
            _ => match &err {
                rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::InvalidColumnType(..) => ErrorCode::DbCorruptRow,
                _ => ErrorCode::DbOperationFailed,
            },
        };
        Self::Database {
            message: err.to_string(),
            code,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = BuzzaError::validation("Invalid input");
        assert_eq!(err.code(), ErrorCode::ValInvalidInput);
        assert!(err.to_string().contains("Invalid input"));
    }

    #[test]
    fn test_context_keeps_kind() {
        let err = BuzzaError::not_found("program").context("latest program files");
        assert!(matches!(err, BuzzaError::NotFound { .. }));
        assert_eq!(err.code(), ErrorCode::PrgNotFound);
        assert_eq!(err.to_string(), "Not found: latest program files: program");

        let err = BuzzaError::integrity("too many results (2)").context("query");
        assert!(matches!(err, BuzzaError::Integrity { .. }));
        assert!(err.to_string().contains("query: too many results (2)"));
    }

    #[test]
    fn test_interrupt_is_classified() {
        let err: BuzzaError = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
            None,
        )
        .into();
        assert!(err.is_interrupted());
        assert!(matches!(err, BuzzaError::Database { .. }));
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::PrgNotFound.as_str(), "PRG_001");
        assert_eq!(ErrorCode::PrgMultipleLatest.as_str(), "PRG_002");
    }
}
