//! Storage layer for quill.
//!
//! This crate persists ledger accounts and backend selections. Two backends
//! implement the [`Store`] trait:
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`. Every mutation is a single SQL
//!   statement, so the row itself serializes concurrent writers even when
//!   they run in separate processes.
//! - [`MemoryStore`]: a mutex-guarded map with the same semantics, for tests
//!   and single-process development.
//!
//! # Tables
//!
//! - `accounts`: one ledger row per user, keyed by `user_id`
//! - `backend_selections`: the user's selected external project, keyed by
//!   `user_id`
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use quill_core::{Account, CreditPolicy, Tier, UserId};
//! use quill_store::{MemoryStore, Store};
//!
//! # async fn example() -> quill_store::Result<()> {
//! let store = MemoryStore::new();
//! let account = Account::new(UserId::generate(), Tier::Free, &CreditPolicy::default(), Utc::now());
//! store.insert_account_if_absent(&account).await?;
//!
//! let after = store.try_consume(&account.user_id, 2000).await?;
//! assert_eq!(after.balance, account.balance - 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_core::{Account, BackendSelection, PlanAssignment, UserId};

/// The storage trait defining all database operations.
///
/// Each method is one atomic operation against the backing store; callers
/// never combine a read and a write to implement a ledger change.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Get an account by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_account(&self, user_id: &UserId) -> Result<Option<Account>>;

    /// Insert `account` unless a row for its user already exists.
    ///
    /// Returns the stored row: the existing one untouched, or the new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_account_if_absent(&self, account: &Account) -> Result<Account>;

    /// Consume one credit: decrement the balance by 1 and add `units` to both
    /// usage counters, only if the balance is at least 1.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::InsufficientCredits` if the balance is below 1; nothing
    ///   is written.
    async fn try_consume(&self, user_id: &UserId, units: i64) -> Result<Account>;

    /// Zero the monthly counter and move the window anchor to `now`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    async fn reset_monthly(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Account>;

    /// Write tier, subscription flag, expiry and balance together.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    async fn assign_plan(&self, user_id: &UserId, plan: &PlanAssignment) -> Result<Account>;

    /// Set a new subscription expiry without touching the balance.
    ///
    /// Only an active pro subscription can be extended.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::PreconditionFailed` if the account is not an active pro
    ///   subscription; nothing is written.
    async fn extend_subscription(
        &self,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<Account>;

    /// Add `amount` credits to the balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::PreconditionFailed` if the new balance would not fit in
    ///   an `i64`; nothing is written.
    async fn add_credits(&self, user_id: &UserId, amount: i64) -> Result<Account>;

    /// Apply `plan` if the account has an active subscription that expired
    /// before `now`.
    ///
    /// Returns `Some(account)` only when this call performed the change, so
    /// concurrent callers observe exactly one expiry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    async fn expire_if_due(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        plan: &PlanAssignment,
    ) -> Result<Option<Account>>;

    // =========================================================================
    // Backend Selection Operations
    // =========================================================================

    /// Get the user's backend selection, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_selection(&self, user_id: &UserId) -> Result<Option<BackendSelection>>;

    /// Insert or replace the user's backend selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_selection(&self, user_id: &UserId, selection: &BackendSelection) -> Result<()>;

    /// Remove the user's backend selection. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn clear_selection(&self, user_id: &UserId) -> Result<bool>;
}
