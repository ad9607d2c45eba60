//! In-memory storage implementation.
//!
//! All state sits behind one mutex, which plays the role the row lock plays
//! in PostgreSQL: each trait method runs entirely inside the lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use quill_core::{Account, BackendSelection, PlanAssignment, Tier, UserId};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct Tables {
    accounts: HashMap<UserId, Account>,
    selections: HashMap<UserId, BackendSelection>,
}

/// Mutex-backed storage for tests and single-process development.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an account verbatim.
    ///
    /// Bypasses every ledger rule; intended for seeding test fixtures.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_account(&self, account: Account) -> Result<()> {
        self.lock()?
            .accounts
            .insert(account.user_id.clone(), account);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    /// Run `f` on the account row under the lock.
    fn with_account<T>(
        &self,
        user_id: &UserId,
        f: impl FnOnce(&mut Account) -> Result<T>,
    ) -> Result<T> {
        let mut tables = self.lock()?;
        let account = tables
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| StoreError::account_not_found(user_id))?;
        f(account)
    }
}

#[async_trait]
impl Store for MemoryStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    async fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        Ok(self.lock()?.accounts.get(user_id).cloned())
    }

    async fn insert_account_if_absent(&self, account: &Account) -> Result<Account> {
        let mut tables = self.lock()?;
        let stored = tables
            .accounts
            .entry(account.user_id.clone())
            .or_insert_with(|| account.clone());
        Ok(stored.clone())
    }

    async fn try_consume(&self, user_id: &UserId, units: i64) -> Result<Account> {
        self.with_account(user_id, |account| {
            if account.balance < 1 {
                return Err(StoreError::InsufficientCredits {
                    balance: account.balance,
                });
            }
            account.balance -= 1;
            account.lifetime_consumed_units += units;
            account.monthly_consumed_units += units;
            account.updated_at = Utc::now();
            Ok(account.clone())
        })
    }

    async fn reset_monthly(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Account> {
        self.with_account(user_id, |account| {
            account.monthly_consumed_units = 0;
            account.monthly_period_anchor = now;
            account.updated_at = now;
            Ok(account.clone())
        })
    }

    async fn assign_plan(&self, user_id: &UserId, plan: &PlanAssignment) -> Result<Account> {
        self.with_account(user_id, |account| {
            plan.apply(account, Utc::now());
            Ok(account.clone())
        })
    }

    async fn extend_subscription(
        &self,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<Account> {
        self.with_account(user_id, |account| {
            if account.tier != Tier::Pro || !account.subscription_active {
                return Err(StoreError::PreconditionFailed(
                    "only an active pro subscription can be renewed".into(),
                ));
            }
            account.subscription_expires_at = Some(expires_at);
            account.updated_at = Utc::now();
            Ok(account.clone())
        })
    }

    async fn add_credits(&self, user_id: &UserId, amount: i64) -> Result<Account> {
        self.with_account(user_id, |account| {
            account.balance = account
                .balance
                .checked_add(amount)
                .ok_or_else(|| StoreError::PreconditionFailed("balance would overflow".into()))?;
            account.updated_at = Utc::now();
            Ok(account.clone())
        })
    }

    async fn expire_if_due(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        plan: &PlanAssignment,
    ) -> Result<Option<Account>> {
        self.with_account(user_id, |account| {
            if !account.subscription_lapsed(now) {
                return Ok(None);
            }
            plan.apply(account, now);
            Ok(Some(account.clone()))
        })
    }

    // =========================================================================
    // Backend Selection Operations
    // =========================================================================

    async fn get_selection(&self, user_id: &UserId) -> Result<Option<BackendSelection>> {
        Ok(self.lock()?.selections.get(user_id).cloned())
    }

    async fn put_selection(&self, user_id: &UserId, selection: &BackendSelection) -> Result<()> {
        self.lock()?
            .selections
            .insert(user_id.clone(), selection.clone());
        Ok(())
    }

    async fn clear_selection(&self, user_id: &UserId) -> Result<bool> {
        Ok(self.lock()?.selections.remove(user_id).is_some())
    }
}
