//! Credit policy: tier allowances and the unit/credit ratio.
//!
//! The policy is an immutable value handed to the services at construction
//! time, so tests can run against alternate tier tables.

use serde::{Deserialize, Serialize};

use crate::Tier;

// ============================================================================
// Constants
// ============================================================================

/// Units recorded against the usage counters for every consumed credit.
pub const DEFAULT_UNITS_PER_CREDIT: i64 = 2000;

/// Starting (and reset) balance for free-tier accounts.
pub const DEFAULT_FREE_TIER_CREDITS: i64 = 10;

/// Balance granted on upgrade to pro.
pub const DEFAULT_PRO_TIER_CREDITS: i64 = 100;

/// Starting balance for enterprise accounts.
pub const DEFAULT_ENTERPRISE_TIER_CREDITS: i64 = 1000;

/// Subscription length used when an account is created directly on pro.
pub const DEFAULT_SUBSCRIPTION_DAYS: i64 = 30;

/// Upper bound on `duration_days` for upgrade and renew.
pub const MAX_DURATION_DAYS: i64 = 3660;

/// Tier allowances and the fixed unit cost of one credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPolicy {
    /// Units added to the lifetime and monthly counters per consumed credit.
    pub units_per_credit: i64,

    /// Free-tier starting balance; also the balance after a downgrade.
    pub free_tier_credits: i64,

    /// Pro-tier balance, set (not added) on upgrade.
    pub pro_tier_credits: i64,

    /// Enterprise starting balance.
    pub enterprise_tier_credits: i64,

    /// Subscription length for accounts initialized on pro.
    pub default_subscription_days: i64,

    /// Largest accepted `duration_days` for upgrade and renew.
    pub max_duration_days: i64,
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self {
            units_per_credit: DEFAULT_UNITS_PER_CREDIT,
            free_tier_credits: DEFAULT_FREE_TIER_CREDITS,
            pro_tier_credits: DEFAULT_PRO_TIER_CREDITS,
            enterprise_tier_credits: DEFAULT_ENTERPRISE_TIER_CREDITS,
            default_subscription_days: DEFAULT_SUBSCRIPTION_DAYS,
            max_duration_days: MAX_DURATION_DAYS,
        }
    }
}

impl CreditPolicy {
    /// Balance a newly created account on `tier` starts with.
    #[must_use]
    pub const fn starting_credits(&self, tier: Tier) -> i64 {
        self.allowance(tier)
    }

    /// Maximum allowance implied by `tier`, as shown in status projections.
    #[must_use]
    pub const fn allowance(&self, tier: Tier) -> i64 {
        match tier {
            Tier::Free => self.free_tier_credits,
            Tier::Pro => self.pro_tier_credits,
            Tier::Enterprise => self.enterprise_tier_credits,
        }
    }

    /// Convert a unit count to whole credits (rounded down).
    #[must_use]
    pub const fn units_to_credits(&self, units: i64) -> i64 {
        if self.units_per_credit <= 0 {
            return 0;
        }
        units / self.units_per_credit
    }

    /// Check that the policy values are usable.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.units_per_credit <= 0 {
            return Err("units_per_credit must be positive".into());
        }
        for (name, value) in [
            ("free_tier_credits", self.free_tier_credits),
            ("pro_tier_credits", self.pro_tier_credits),
            ("enterprise_tier_credits", self.enterprise_tier_credits),
        ] {
            if value < 0 {
                return Err(format!("{name} must not be negative"));
            }
        }
        if self.default_subscription_days <= 0 || self.max_duration_days <= 0 {
            return Err("subscription durations must be positive".into());
        }
        Ok(())
    }
}
