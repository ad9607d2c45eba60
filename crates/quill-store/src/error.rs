//! Error types for quill storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Key that was looked up.
        id: String,
    },

    /// A conditional write found the row in a state that forbids it.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The conditional decrement found no credit to consume.
    #[error("insufficient credits: balance={balance}")]
    InsufficientCredits {
        /// Balance observed by the failed decrement.
        balance: i64,
    },
}

impl StoreError {
    /// Not-found error for an account.
    #[must_use]
    pub fn account_not_found(user_id: &quill_core::UserId) -> Self {
        Self::NotFound {
            entity: "account",
            id: user_id.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Serialization(err.to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(format!("migration failed: {err}"))
    }
}
