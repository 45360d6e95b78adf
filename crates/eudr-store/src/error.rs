//! # Store Errors
//!
//! Typed persistence failures. Every variant carries the same rollback
//! contract: the session that produced it must be rolled back, and no
//! processed flag written through it may become visible.

use thiserror::Error;

/// Failure reported by a persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached, or the connection was lost.
    #[error("store unreachable: {0}")]
    Connectivity(String),

    /// A write violated a table constraint (unique, foreign key, check,
    /// or not-null).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A batch write touched a different number of rows than expected.
    #[error("partial batch: expected {expected} rows, affected {affected}")]
    PartialBatch {
        /// Rows the caller asked to write.
        expected: u64,
        /// Rows the backend reported as written.
        affected: u64,
    },

    /// A row could not be decoded into a record.
    #[error("row decode failed: {0}")]
    Decode(String),

    /// A reference layer name is not a plain SQL identifier.
    #[error("invalid reference layer name '{0}'")]
    InvalidLayer(String),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying on a fresh connection could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match &err {
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => Self::ConstraintViolation(db.message().to_string()),
                _ => Self::Backend(err.to_string()),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connectivity(err.to_string()),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::TypeNotFound { .. } => Self::Decode(err.to_string()),
            _ => Self::Backend(err.to_string()),
        }
    }
}

impl From<StoreError> for eudr_core::EudrError {
    fn from(err: StoreError) -> Self {
        eudr_core::EudrError::Persistence(err.to_string())
    }
}
