//! Database schema definitions.
//!
//! Table and column names shared by the PostgreSQL queries. The DDL lives in
//! `migrations/` and is embedded with `sqlx::migrate!`.

/// Table names.
pub mod table {
    /// Ledger accounts, keyed by `user_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Selected external projects, keyed by `user_id`.
    pub const BACKEND_SELECTIONS: &str = "backend_selections";
}

/// Columns returned for an account row, in `AccountRow` order.
pub const ACCOUNT_COLUMNS: &str = "user_id, balance, lifetime_consumed_units, \
     monthly_consumed_units, monthly_period_anchor, tier, subscription_active, \
     subscription_expires_at, created_at, updated_at";

/// Columns returned for a backend selection row.
pub const SELECTION_COLUMNS: &str = "project_ref, public_endpoint, public_key, privileged_key";

