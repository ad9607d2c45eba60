//! Account types for quill.
//!
//! This module defines the per-user ledger record: credit balance, usage
//! counters and subscription fields.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{CreditPolicy, LedgerError, UserId};

/// A ledger account for a user.
///
/// One record exists per user. It is created on first contact, mutated by
/// every consume/grant/plan change, and never hard-deleted by quill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The user ID (from the external auth provider).
    pub user_id: UserId,

    /// Credits currently available. Never negative.
    pub balance: i64,

    /// Units consumed over the account's lifetime.
    pub lifetime_consumed_units: i64,

    /// Units consumed in the current monthly window.
    pub monthly_consumed_units: i64,

    /// Start of the current monthly accounting window.
    pub monthly_period_anchor: DateTime<Utc>,

    /// Current tier.
    pub tier: Tier,

    /// Whether a paid subscription is active.
    pub subscription_active: bool,

    /// When the subscription lapses, if one is or was recently active.
    pub subscription_expires_at: Option<DateTime<Utc>>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account on `tier` with the policy's starting balance.
    ///
    /// Pro accounts start with an active subscription of
    /// `default_subscription_days`; enterprise accounts are active with no
    /// expiry; free accounts have no subscription.
    #[must_use]
    pub fn new(user_id: UserId, tier: Tier, policy: &CreditPolicy, now: DateTime<Utc>) -> Self {
        let (subscription_active, subscription_expires_at) = match tier {
            Tier::Free => (false, None),
            Tier::Pro => (
                true,
                Some(now + Duration::days(policy.default_subscription_days)),
            ),
            Tier::Enterprise => (true, None),
        };

        Self {
            user_id,
            balance: policy.starting_credits(tier),
            lifetime_consumed_units: 0,
            monthly_consumed_units: 0,
            monthly_period_anchor: now,
            tier,
            subscription_active,
            subscription_expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether at least one credit is available.
    #[must_use]
    pub const fn has_credits(&self) -> bool {
        self.balance > 0
    }

    /// Whether an active subscription has passed its expiry at `now`.
    #[must_use]
    pub fn subscription_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.subscription_active && self.subscription_expires_at.is_some_and(|at| at < now)
    }

    /// Check the stored invariants.
    ///
    /// A violation means an earlier write bypassed the conditional decrement;
    /// the record is reported, never repaired.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CorruptAccount`] if the balance or a usage
    /// counter is negative.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        let problem = if self.balance < 0 {
            Some(format!("negative balance {}", self.balance))
        } else if self.lifetime_consumed_units < 0 {
            Some(format!(
                "negative lifetime units {}",
                self.lifetime_consumed_units
            ))
        } else if self.monthly_consumed_units < 0 {
            Some(format!(
                "negative monthly units {}",
                self.monthly_consumed_units
            ))
        } else {
            None
        };

        match problem {
            Some(detail) => Err(LedgerError::CorruptAccount {
                user_id: self.user_id.to_string(),
                detail,
            }),
            None => Ok(()),
        }
    }
}

/// Allowance tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Free tier: small fixed allotment, no subscription.
    Free,

    /// Pro tier: timed subscription with the pro allotment.
    Pro,

    /// Enterprise tier: custom allotment, no expiry.
    Enterprise,
}

impl Tier {
    /// Get the tier name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(LedgerError::InvalidArgument(format!("unknown tier: {other}"))),
        }
    }
}

/// Tier, subscription and balance written together by a plan change.
///
/// Upgrade, downgrade and expiry all replace these four fields in one store
/// operation so that a reader never observes a pro tier with a free balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanAssignment {
    /// New tier.
    pub tier: Tier,
    /// New subscription flag.
    pub subscription_active: bool,
    /// New expiry (`None` clears it).
    pub subscription_expires_at: Option<DateTime<Utc>>,
    /// New balance (overwrites, does not add).
    pub balance: i64,
}

impl PlanAssignment {
    /// Pro plan with the full pro allotment, expiring at `expires_at`.
    #[must_use]
    pub const fn pro(policy: &CreditPolicy, expires_at: DateTime<Utc>) -> Self {
        Self {
            tier: Tier::Pro,
            subscription_active: true,
            subscription_expires_at: Some(expires_at),
            balance: policy.pro_tier_credits,
        }
    }

    /// Free plan with the free allotment and no subscription.
    #[must_use]
    pub const fn free(policy: &CreditPolicy) -> Self {
        Self {
            tier: Tier::Free,
            subscription_active: false,
            subscription_expires_at: None,
            balance: policy.free_tier_credits,
        }
    }

    /// Apply the assignment to an account record.
    pub fn apply(&self, account: &mut Account, now: DateTime<Utc>) {
        account.tier = self.tier;
        account.subscription_active = self.subscription_active;
        account.subscription_expires_at = self.subscription_expires_at;
        account.balance = self.balance;
        account.updated_at = now;
    }
}
