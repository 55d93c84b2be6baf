//! Error types and recovery strategies for Folio
//!
//! Every error is classified into one of three severity tiers:
//! - **Recoverable**: can be retried (locked or briefly unavailable database)
//! - **Degraded**: the operation is skipped but the process keeps running
//! - **Fatal**: requires user intervention (corrupted database, failed migration)
//!
//! Each error also carries a recommended recovery action.

use std::fmt;
use thiserror::Error;

/// What the user or caller should do about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Run the operation again right away
    RetryImmediate,
    /// Wait for the other writer to finish, then retry (e.g., database busy)
    RetryWithBackoff,
    /// Skip the failing item and continue with the rest
    SkipItem,
    /// Check or restore the database before trying again
    RepairDatabase,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryImmediate => write!(f, "Run the command again"),
            Self::RetryWithBackoff => write!(f, "Wait a moment, then run the command again"),
            Self::SkipItem => write!(f, "Check the ID and try again"),
            Self::RepairDatabase => {
                write!(f, "Run 'folio init' to check the database or restore a backup")
            }
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Error can be automatically recovered from
    Recoverable,
    /// Operation skipped but the process continues
    Degraded,
    /// Critical error requiring user action
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type for Folio
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Database Errors =====
    /// Database operation failed
    #[error("Database error: {message}")]
    DatabaseError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database is corrupted and needs repair
    #[error("Database corrupted: {details}")]
    DatabaseCorrupted { details: String },

    /// Database migration failed
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    /// Database is locked by another process
    #[error("Database locked: {operation}")]
    DatabaseLocked { operation: String },

    /// Record not found in database
    #[error("Record not found: {entity} with {identifier}")]
    RecordNotFound { entity: String, identifier: String },

    /// Stored row could not be mapped back into a domain value
    #[error("Invalid stored value: {field} = '{value}'")]
    InvalidStoredValue { field: String, value: String },
}

impl AppError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DatabaseLocked { .. } => ErrorSeverity::Recoverable,

            Self::DatabaseCorrupted { .. } | Self::MigrationFailed { .. } => ErrorSeverity::Fatal,

            Self::DatabaseError { .. }
            | Self::RecordNotFound { .. }
            | Self::InvalidStoredValue { .. } => ErrorSeverity::Degraded,
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::DatabaseLocked { .. } => RecoveryAction::RetryWithBackoff,
            Self::DatabaseError { .. } => RecoveryAction::RetryImmediate,
            Self::DatabaseCorrupted { .. } | Self::MigrationFailed { .. } => {
                RecoveryAction::RepairDatabase
            }
            Self::RecordNotFound { .. } | Self::InvalidStoredValue { .. } => {
                RecoveryAction::SkipItem
            }
        }
    }

    /// Returns a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::DatabaseError { .. } | Self::DatabaseLocked { .. } => {
                "The library database is temporarily unavailable. Please try again.".to_string()
            }
            Self::DatabaseCorrupted { .. } => {
                "The library database is damaged and needs repair.".to_string()
            }
            Self::MigrationFailed { .. } => {
                "Failed to upgrade the library database.".to_string()
            }
            Self::RecordNotFound { entity, .. } => {
                format!("The requested {} was not found.", entity.to_lowercase())
            }
            Self::InvalidStoredValue { .. } => {
                "The library database contains an unreadable record.".to_string()
            }
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Returns true if this error can be automatically retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.recovery_action(),
            RecoveryAction::RetryImmediate | RecoveryAction::RetryWithBackoff
        )
    }

    /// Helper to create a database error from any error type.
    ///
    /// SQLite lock contention (`SQLITE_BUSY`/`SQLITE_LOCKED`) becomes
    /// [`AppError::DatabaseLocked`] so callers can retry it.
    pub fn database<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        let message = message.into();
        if is_lock_contention(&source) {
            return Self::DatabaseLocked { operation: message };
        }
        Self::DatabaseError {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create a not-found error for an entity
    pub fn not_found(entity: impl Into<String>, identifier: impl ToString) -> Self {
        Self::RecordNotFound {
            entity: entity.into(),
            identifier: identifier.to_string(),
        }
    }

    /// Returns true if this is a missing-record error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

fn is_lock_contention(error: &dyn std::error::Error) -> bool {
    let text = error.to_string();
    text.contains("database is locked") || text.contains("database table is locked")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Recoverable < ErrorSeverity::Degraded);
        assert!(ErrorSeverity::Degraded < ErrorSeverity::Fatal);
    }

    #[test]
    fn test_database_locked_is_retryable() {
        let err = AppError::DatabaseLocked {
            operation: "update book".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Recoverable);
        assert_eq!(err.recovery_action(), RecoveryAction::RetryWithBackoff);
        assert!(err.is_retryable());
        assert!(!err.is_critical());
    }

    #[test]
    fn test_record_not_found_skips_item() {
        let err = AppError::not_found("Book", "42");
        assert!(err.is_not_found());
        assert_eq!(err.severity(), ErrorSeverity::Degraded);
        assert_eq!(err.recovery_action(), RecoveryAction::SkipItem);
        assert_eq!(err.to_string(), "Record not found: Book with 42");
        assert_eq!(err.user_message(), "The requested book was not found.");
    }

    #[test]
    fn test_corrupted_database_needs_repair() {
        let err = AppError::DatabaseCorrupted {
            details: "page checksum".to_string(),
        };
        assert!(err.is_critical());
        assert!(!err.is_retryable());
        assert_eq!(err.recovery_action(), RecoveryAction::RepairDatabase);
        assert_eq!(
            err.user_message(),
            "The library database is damaged and needs repair."
        );
    }

    #[test]
    fn test_database_helper_keeps_source() {
        let inner = io::Error::new(io::ErrorKind::Other, "disk I/O error");
        let err = AppError::database("Failed to update book", inner);

        assert!(matches!(err, AppError::DatabaseError { .. }));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Database error: Failed to update book");
    }

    #[test]
    fn test_busy_database_becomes_locked() {
        let inner = io::Error::new(io::ErrorKind::Other, "(code: 5) database is locked");
        let err = AppError::database("Failed to update book", inner);

        assert!(matches!(
            &err,
            AppError::DatabaseLocked { operation } if operation == "Failed to update book"
        ));
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Recoverable);
    }

    #[test]
    fn test_recovery_action_display() {
        assert_eq!(
            RecoveryAction::SkipItem.to_string(),
            "Check the ID and try again"
        );
        assert!(RecoveryAction::RepairDatabase.to_string().contains("folio init"));
    }
}
