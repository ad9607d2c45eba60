//! Read-only views derived from an [`Account`].

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::{Account, CreditPolicy, Tier, UserId};

/// Result of a read-only balance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCheck {
    /// Whether the user may perform a gated action.
    pub allowed: bool,
    /// Current balance.
    pub balance: i64,
    /// User-facing explanation.
    pub message: String,
}

impl BalanceCheck {
    /// Build the check for an account.
    #[must_use]
    pub fn for_account(account: &Account) -> Self {
        let allowed = account.has_credits();
        Self {
            allowed,
            balance: account.balance,
            message: balance_message(account.balance, account.tier),
        }
    }
}

/// User-facing message for a balance.
#[must_use]
pub fn balance_message(balance: i64, tier: Tier) -> String {
    match (balance, tier) {
        (b, _) if b > 1 => format!("You have {b} credits remaining"),
        (1, _) => "You have 1 credit remaining".to_string(),
        (_, Tier::Free) => {
            "You have no credits remaining. Upgrade to Pro for more credits.".to_string()
        }
        _ => "You have no credits remaining for this billing period.".to_string(),
    }
}

/// Counters after a successful consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeReceipt {
    /// Balance after the decrement.
    pub balance: i64,
    /// Lifetime units after the increment.
    pub lifetime_consumed: i64,
    /// Monthly units after the increment.
    pub monthly_consumed: i64,
}

impl From<&Account> for ConsumeReceipt {
    fn from(account: &Account) -> Self {
        Self {
            balance: account.balance,
            lifetime_consumed: account.lifetime_consumed_units,
            monthly_consumed: account.monthly_consumed_units,
        }
    }
}

/// Full status projection of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    /// User ID.
    pub user_id: UserId,
    /// Current balance.
    pub balance: i64,
    /// Allowance implied by the tier.
    pub max_credits: i64,
    /// Lifetime consumed units.
    pub lifetime_consumed_units: i64,
    /// Lifetime consumed credits (units / ratio).
    pub lifetime_consumed_credits: i64,
    /// Monthly consumed units.
    pub monthly_consumed_units: i64,
    /// Monthly consumed credits (units / ratio).
    pub monthly_consumed_credits: i64,
    /// Start of the monthly window.
    pub monthly_period_anchor: DateTime<Utc>,
    /// Nominal end of the monthly window (anchor + one calendar month).
    pub monthly_window_ends_at: DateTime<Utc>,
    /// Current tier.
    pub tier: Tier,
    /// Whether a subscription is active.
    pub subscription_active: bool,
    /// Subscription expiry, if any.
    pub subscription_expires_at: Option<DateTime<Utc>>,
    /// Whole days left on an active subscription, if it has an expiry.
    pub subscription_days_remaining: Option<i64>,
}

impl AccountStatus {
    /// Project an account's stored state. Pure; `now` only feeds the
    /// days-remaining field.
    #[must_use]
    pub fn project(account: &Account, policy: &CreditPolicy, now: DateTime<Utc>) -> Self {
        let monthly_window_ends_at = account
            .monthly_period_anchor
            .checked_add_months(Months::new(1))
            .unwrap_or(account.monthly_period_anchor + Duration::days(30));

        let subscription_days_remaining = account
            .subscription_expires_at
            .filter(|_| account.subscription_active)
            .map(|at| (at - now).num_days().max(0));

        Self {
            user_id: account.user_id.clone(),
            balance: account.balance,
            max_credits: policy.allowance(account.tier),
            lifetime_consumed_units: account.lifetime_consumed_units,
            lifetime_consumed_credits: policy.units_to_credits(account.lifetime_consumed_units),
            monthly_consumed_units: account.monthly_consumed_units,
            monthly_consumed_credits: policy.units_to_credits(account.monthly_consumed_units),
            monthly_period_anchor: account.monthly_period_anchor,
            monthly_window_ends_at,
            tier: account.tier,
            subscription_active: account.subscription_active,
            subscription_expires_at: account.subscription_expires_at,
            subscription_days_remaining,
        }
    }
}
