//! Error types for the quill ledger.

use crate::ids::IdError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// No credit left for the action. Recoverable, shown to the end user.
    #[error("insufficient credits: balance={balance}")]
    InsufficientCredits {
        /// Balance at the time of the attempt.
        balance: i64,
        /// User-facing explanation.
        message: String,
    },

    /// Account not found. The caller may choose to initialize it.
    #[error("account not found: {user_id}")]
    AccountNotFound {
        /// The user ID that was not found.
        user_id: String,
    },

    /// A caller-supplied argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A stored account violates the ledger invariants.
    #[error("corrupt account {user_id}: {detail}")]
    CorruptAccount {
        /// The affected user ID.
        user_id: String,
        /// Which invariant was violated.
        detail: String,
    },

    /// Storage error. The operation must be treated as not performed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl LedgerError {
    /// Whether the error is an expected, user-facing rejection rather than a
    /// fault.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientCredits { .. }
                | Self::AccountNotFound { .. }
                | Self::InvalidArgument(_)
                | Self::InvalidId(_)
        )
    }
}
