//! Credit accounting: check, consume, status and account initialization.

use std::sync::Arc;

use chrono::Utc;

use quill_core::status::balance_message;
use quill_core::{
    Account, AccountStatus, BalanceCheck, ConsumeReceipt, CreditPolicy, LedgerError, Result, Tier,
    UserId,
};
use quill_store::{Store, StoreError};

use crate::ledger_error;

/// Stateless credit accounting over a shared store.
#[derive(Clone)]
pub struct CreditService {
    store: Arc<dyn Store>,
    policy: CreditPolicy,
}

impl CreditService {
    /// Create a service over `store` with an injected policy.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, policy: CreditPolicy) -> Self {
        Self { store, policy }
    }

    /// The policy this service was built with.
    #[must_use]
    pub const fn policy(&self) -> &CreditPolicy {
        &self.policy
    }

    /// Read-only balance check. `allowed` is `balance > 0`.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` for an unknown user, `CorruptAccount` if the
    /// stored record breaks its invariants, `Storage` on store failure.
    pub async fn check_balance(&self, user_id: &UserId) -> Result<BalanceCheck> {
        let account = self.load(user_id).await?;
        Ok(BalanceCheck::for_account(&account))
    }

    /// Spend one credit and record `units_per_credit` units of usage.
    ///
    /// The store performs the conditional decrement atomically. A failure of
    /// any kind means the action is not authorized; nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientCredits` (with the current balance) when the
    /// balance is below one, `AccountNotFound` for an unknown user, `Storage`
    /// if the decrement could not be confirmed.
    pub async fn consume(&self, user_id: &UserId) -> Result<ConsumeReceipt> {
        let account = match self
            .store
            .try_consume(user_id, self.policy.units_per_credit)
            .await
        {
            Ok(account) => account,
            Err(StoreError::InsufficientCredits { balance }) => {
                let tier = self.tier_hint(user_id).await;
                tracing::debug!(user_id = %user_id, balance, "Consume rejected: no credits");
                return Err(LedgerError::InsufficientCredits {
                    balance,
                    message: balance_message(balance, tier),
                });
            }
            Err(e) => return Err(ledger_error(e, user_id)),
        };

        account.check_invariants().inspect_err(report_corruption)?;

        tracing::info!(
            user_id = %user_id,
            balance = account.balance,
            lifetime_units = account.lifetime_consumed_units,
            monthly_units = account.monthly_consumed_units,
            "Credit consumed"
        );

        Ok(ConsumeReceipt::from(&account))
    }

    /// Full status projection of the stored account.
    ///
    /// # Errors
    ///
    /// Same as [`Self::check_balance`].
    pub async fn status(&self, user_id: &UserId) -> Result<AccountStatus> {
        let account = self.load(user_id).await?;
        Ok(AccountStatus::project(&account, &self.policy, Utc::now()))
    }

    /// Create the account on `tier` if it does not exist.
    ///
    /// Idempotent: an existing account is returned unchanged, balance
    /// included.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on store failure.
    pub async fn initialize_account(&self, user_id: &UserId, tier: Tier) -> Result<Account> {
        let fresh = Account::new(user_id.clone(), tier, &self.policy, Utc::now());
        let stored = self
            .store
            .insert_account_if_absent(&fresh)
            .await
            .map_err(|e| ledger_error(e, user_id))?;

        if stored.created_at == fresh.created_at && stored.tier == tier {
            tracing::info!(user_id = %user_id, tier = %tier, balance = stored.balance, "Account initialized");
        } else {
            tracing::debug!(user_id = %user_id, "Account already exists");
        }

        stored.check_invariants().inspect_err(report_corruption)?;
        Ok(stored)
    }

    /// Zero the monthly counter and move the window anchor to now.
    ///
    /// Balance and lifetime usage are left alone.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` for an unknown user, `Storage` on store
    /// failure.
    pub async fn reset_monthly_window(&self, user_id: &UserId) -> Result<Account> {
        let account = self
            .store
            .reset_monthly(user_id, Utc::now())
            .await
            .map_err(|e| ledger_error(e, user_id))?;

        tracing::info!(
            user_id = %user_id,
            anchor = %account.monthly_period_anchor,
            "Monthly window reset"
        );
        Ok(account)
    }

    async fn load(&self, user_id: &UserId) -> Result<Account> {
        let account = self
            .store
            .get_account(user_id)
            .await
            .map_err(|e| ledger_error(e, user_id))?
            .ok_or_else(|| LedgerError::AccountNotFound {
                user_id: user_id.to_string(),
            })?;
        account.check_invariants().inspect_err(report_corruption)?;
        Ok(account)
    }

    /// Tier for the rejection message; a failed lookup only changes wording.
    async fn tier_hint(&self, user_id: &UserId) -> Tier {
        match self.store.get_account(user_id).await {
            Ok(Some(account)) => account.tier,
            _ => Tier::Free,
        }
    }
}

fn report_corruption(err: &LedgerError) {
    tracing::error!(error = %err, "Stored account violates ledger invariants");
}
