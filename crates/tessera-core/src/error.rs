//! Unified error type for the data-access tier.

use std::fmt::Debug;
use thiserror::Error;

/// Errors surfaced by every DAO.
///
/// Driver failures are translated into these variants at the DAO boundary
/// so callers never have to inspect `sqlx` errors directly.
#[derive(Error, Debug)]
pub enum TesseraError {
    // ============ Domain Errors ============
    /// The requested row does not exist
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// The caller's etag no longer matches the stored etag
    #[error("Conflicting update: {0}")]
    ConflictingUpdate(String),

    /// A unique name, alias, or key is already taken
    #[error("Name conflict: {0}")]
    NameConflict(String),

    /// A foreign-key constraint rejected the write
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// The supplied model is missing a required field or holds an invalid value
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// An argument makes the requested operation illegal
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ============ Infrastructure Errors ============
    /// Unexpected SQL or driver failure
    #[error("Datastore error: {0}")]
    Datastore(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TesseraError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ConflictingUpdate(_) => "CONFLICTING_UPDATE",
            Self::NameConflict(_) => "NAME_CONFLICT",
            Self::IntegrityViolation(_) => "INTEGRITY_VIOLATION",
            Self::InvalidModel(_) => "INVALID_MODEL",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Datastore(_) => "DATASTORE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a not found error for a resource.
    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a conflicting-update error.
    #[must_use]
    pub fn conflicting_update<T: Into<String>>(message: T) -> Self {
        Self::ConflictingUpdate(message.into())
    }

    /// Creates a name conflict error.
    #[must_use]
    pub fn name_conflict<T: Into<String>>(message: T) -> Self {
        Self::NameConflict(message.into())
    }

    /// Creates an invalid-model error.
    #[must_use]
    pub fn invalid_model<T: Into<String>>(message: T) -> Self {
        Self::InvalidModel(message.into())
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid_argument<T: Into<String>>(message: T) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true for the not-found variant.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for the conflicting-update variant.
    #[must_use]
    pub const fn is_conflicting_update(&self) -> bool {
        matches!(self, Self::ConflictingUpdate(_))
    }

    /// Re-labels a bare `RowNotFound` translation with the resource that was queried.
    #[must_use]
    pub fn or_not_found<T: ToString>(self, resource_type: &'static str, id: T) -> Self {
        match self {
            Self::NotFound { resource_type: "database_row", .. } => {
                Self::not_found(resource_type, id)
            }
            other => other,
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for TesseraError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match &err {
            sqlx::Error::RowNotFound => Self::NotFound {
                resource_type: "database_row",
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => Self::NameConflict(db_err.message().to_string()),
                ErrorKind::ForeignKeyViolation => {
                    Self::IntegrityViolation(db_err.message().to_string())
                }
                ErrorKind::NotNullViolation | ErrorKind::CheckViolation => {
                    Self::InvalidModel(db_err.message().to_string())
                }
                _ => Self::Datastore(err.to_string()),
            },
            _ => Self::Datastore(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Datastore(format!("Blob serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TesseraError::not_found("Node", 1).error_code(), "NOT_FOUND");
        assert_eq!(
            TesseraError::conflicting_update("stale").error_code(),
            "CONFLICTING_UPDATE"
        );
        assert_eq!(TesseraError::name_conflict("dup").error_code(), "NAME_CONFLICT");
        assert_eq!(
            TesseraError::IntegrityViolation("fk".to_string()).error_code(),
            "INTEGRITY_VIOLATION"
        );
        assert_eq!(TesseraError::invalid_model("name").error_code(), "INVALID_MODEL");
        assert_eq!(TesseraError::invalid_argument("x").error_code(), "INVALID_ARGUMENT");
        assert_eq!(TesseraError::Datastore("db".to_string()).error_code(), "DATASTORE_ERROR");
        assert_eq!(TesseraError::internal("err").error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_error_constructors() {
        let not_found = TesseraError::not_found("Team", "123");
        assert!(not_found.to_string().contains("Team"));
        assert!(not_found.to_string().contains("123"));
        assert!(not_found.is_not_found());

        let conflict = TesseraError::conflicting_update("etag changed");
        assert!(conflict.to_string().contains("etag changed"));
        assert!(conflict.is_conflicting_update());

        let invalid = TesseraError::invalid_model("name is required");
        assert!(invalid.to_string().contains("name is required"));
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_or_not_found_relabels_row_not_found() {
        let err = TesseraError::from(sqlx::Error::RowNotFound).or_not_found("WikiPage", 7);
        match err {
            TesseraError::NotFound { resource_type, id } => {
                assert_eq!(resource_type, "WikiPage");
                assert_eq!(id, "7");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_or_not_found_keeps_other_errors() {
        let err = TesseraError::name_conflict("dup").or_not_found("Node", 1);
        assert!(matches!(err, TesseraError::NameConflict(_)));

        let err = TesseraError::not_found("Team", 2).or_not_found("Node", 1);
        assert!(matches!(
            err,
            TesseraError::NotFound {
                resource_type: "Team",
                ..
            }
        ));
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_pool_errors_become_datastore() {
        let err = TesseraError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, TesseraError::Datastore(_)));
    }

    #[test]
    fn test_json_error_becomes_datastore() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = TesseraError::from(json_err);
        assert_eq!(err.error_code(), "DATASTORE_ERROR");
    }
}
