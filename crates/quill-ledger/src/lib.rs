//! Credit accounting and subscription lifecycle for quill.
//!
//! - [`CreditService`]: check, consume, status, initialization, monthly reset
//! - [`SubscriptionService`]: upgrade, downgrade, renew, bonus grants, lazy
//!   expiry
//!
//! Both services are stateless over a shared [`quill_store::Store`] and an
//! injected [`quill_core::CreditPolicy`]. Nothing is cached between calls:
//! every operation reads the store, so several service instances can share one
//! database. Monthly resets and expiry checks are pull-based; an external
//! scheduler is expected to call them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod credits;
pub mod subscription;

pub use credits::CreditService;
pub use subscription::{SubscriptionService, MAX_BONUS_CREDITS};

use quill_core::{status::balance_message, LedgerError, Tier, UserId};
use quill_store::StoreError;

/// Translate a store failure into the ledger taxonomy.
fn ledger_error(err: StoreError, user_id: &UserId) -> LedgerError {
    match err {
        StoreError::NotFound { .. } => LedgerError::AccountNotFound {
            user_id: user_id.to_string(),
        },
        StoreError::PreconditionFailed(reason) => LedgerError::InvalidArgument(reason),
        StoreError::InsufficientCredits { balance } => LedgerError::InsufficientCredits {
            balance,
            message: balance_message(balance, Tier::Free),
        },
        StoreError::Database(msg) | StoreError::Serialization(msg) => {
            tracing::error!(user_id = %user_id, error = %msg, "Ledger storage failure");
            LedgerError::Storage(msg)
        }
    }
}
