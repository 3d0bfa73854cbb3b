//! Database error types.

use athlethia_core::CollaboratorError;
use thiserror::Error;

/// Database-specific errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open or create the database.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Migration execution failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    Query(String),

    /// Requested record was not found.
    #[error("{0}")]
    NotFound(String),

    /// Failed to decode a stored value.
    #[error("decode error: {0}")]
    Decode(String),

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

const COLLABORATOR: &str = "scam database";

impl From<DatabaseError> for CollaboratorError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(what) => Self::NotFound(what),
            DatabaseError::Open(_)
            | DatabaseError::Io(_)
            | DatabaseError::Sqlx(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => {
                Self::unavailable(COLLABORATOR, err.to_string())
            }
            other => Self::backend(COLLABORATOR, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_mapping() {
        let closed: CollaboratorError = DatabaseError::Sqlx(sqlx::Error::PoolClosed).into();
        assert!(matches!(closed, CollaboratorError::Unavailable { .. }));

        let missing: CollaboratorError =
            DatabaseError::NotFound("scan abc not found".to_string()).into();
        assert!(matches!(missing, CollaboratorError::NotFound(msg) if msg.contains("abc")));

        let decode: CollaboratorError = DatabaseError::Decode("bad verdict".to_string()).into();
        assert!(matches!(decode, CollaboratorError::Backend { .. }));
    }
}
