//! Subscription lifecycle: upgrade, downgrade, renew, bonus grants and lazy
//! expiry.
//!
//! ```text
//! free --upgrade--> pro(active, timed) --renew--> pro(active, extended)
//! pro(active) --expiry reached & checked--> free
//! pro(active) --downgrade--> free
//! ```
//!
//! Plan changes write tier, subscription and balance in one store operation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use quill_core::{Account, CreditPolicy, LedgerError, PlanAssignment, Result, UserId};
use quill_store::Store;

use crate::ledger_error;

/// Largest credit amount a single bonus grant may add.
pub const MAX_BONUS_CREDITS: i64 = 1_000_000;

/// Stateless subscription lifecycle over a shared store.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn Store>,
    policy: CreditPolicy,
}

impl SubscriptionService {
    /// Create a service over `store` with an injected policy.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, policy: CreditPolicy) -> Self {
        Self { store, policy }
    }

    /// Move to pro for `duration_days`.
    ///
    /// The balance is reset to the pro allotment, not added to: unused free
    /// credits are forfeited.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a duration outside
    /// `1..=max_duration_days`, `AccountNotFound` for an unknown user.
    pub async fn upgrade(&self, user_id: &UserId, duration_days: i64) -> Result<Account> {
        let expires_at = self.expiry_from_now(duration_days)?;
        let plan = PlanAssignment::pro(&self.policy, expires_at);
        let account = self
            .store
            .assign_plan(user_id, &plan)
            .await
            .map_err(|e| ledger_error(e, user_id))?;

        tracing::info!(
            user_id = %user_id,
            balance = account.balance,
            expires_at = %expires_at,
            "Upgraded to pro"
        );
        Ok(account)
    }

    /// Return to free: free allotment, no subscription, expiry cleared.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` for an unknown user.
    pub async fn downgrade(&self, user_id: &UserId) -> Result<Account> {
        let plan = PlanAssignment::free(&self.policy);
        let account = self
            .store
            .assign_plan(user_id, &plan)
            .await
            .map_err(|e| ledger_error(e, user_id))?;

        tracing::info!(user_id = %user_id, balance = account.balance, "Downgraded to free");
        Ok(account)
    }

    /// Set the expiry to now plus `duration_days`. Balance is untouched.
    ///
    /// Only an active pro subscription renews; free and enterprise accounts
    /// are refused and left as they are.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a duration outside
    /// `1..=max_duration_days` or an account that is not active pro,
    /// `AccountNotFound` for an unknown user.
    pub async fn renew(&self, user_id: &UserId, duration_days: i64) -> Result<Account> {
        let expires_at = self.expiry_from_now(duration_days)?;
        let account = self
            .store
            .extend_subscription(user_id, expires_at)
            .await
            .map_err(|e| ledger_error(e, user_id))?;

        tracing::info!(user_id = %user_id, expires_at = %expires_at, "Subscription renewed");
        Ok(account)
    }

    /// Add `amount` credits regardless of tier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless `amount` is in
    /// `1..=MAX_BONUS_CREDITS` and fits on top of the current balance,
    /// `AccountNotFound` for an unknown user.
    pub async fn grant_bonus(&self, user_id: &UserId, amount: i64) -> Result<Account> {
        if !(1..=MAX_BONUS_CREDITS).contains(&amount) {
            return Err(LedgerError::InvalidArgument(format!(
                "bonus amount must be between 1 and {MAX_BONUS_CREDITS}, got {amount}"
            )));
        }

        let account = self
            .store
            .add_credits(user_id, amount)
            .await
            .map_err(|e| ledger_error(e, user_id))?;

        tracing::info!(user_id = %user_id, amount, balance = account.balance, "Bonus granted");
        Ok(account)
    }

    /// Downgrade if an active subscription has lapsed. Returns whether it did.
    ///
    /// The check and the downgrade are one conditional store write, so
    /// concurrent callers downgrade at most once.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` for an unknown user.
    pub async fn check_expiry(&self, user_id: &UserId) -> Result<bool> {
        let plan = PlanAssignment::free(&self.policy);
        let expired = self
            .store
            .expire_if_due(user_id, Utc::now(), &plan)
            .await
            .map_err(|e| ledger_error(e, user_id))?;

        if let Some(account) = &expired {
            tracing::info!(
                user_id = %user_id,
                balance = account.balance,
                "Subscription expired; downgraded to free"
            );
        }
        Ok(expired.is_some())
    }

    fn expiry_from_now(&self, duration_days: i64) -> Result<DateTime<Utc>> {
        if !(1..=self.policy.max_duration_days).contains(&duration_days) {
            return Err(LedgerError::InvalidArgument(format!(
                "duration_days must be between 1 and {}, got {duration_days}",
                self.policy.max_duration_days
            )));
        }
        Ok(Utc::now() + Duration::days(duration_days))
    }
}
