//! Core types and utilities for quill.
//!
//! This crate provides the foundational types shared by the ledger, the store
//! and the query proxy:
//!
//! - **Identifiers**: `UserId`
//! - **Accounts**: `Account`, `Tier`, `PlanAssignment`
//! - **Policy**: `CreditPolicy` (tier allowances and the unit/credit ratio)
//! - **Views**: `BalanceCheck`, `ConsumeReceipt`, `AccountStatus`
//! - **Backends**: `BackendSelection`, `PrivilegedKey`
//!
//! # Credits and units
//!
//! **1 credit = `units_per_credit` units** (2000 by default)
//!
//! - Every gated action consumes exactly one credit
//! - Usage counters are kept in units and always move by the full ratio
//! - Both scales are stored as `i64` and never tracked independently

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod error;
pub mod ids;
pub mod policy;
pub mod selection;
pub mod status;

pub use account::{Account, PlanAssignment, Tier};
pub use error::{LedgerError, Result};
pub use ids::{IdError, UserId};
pub use policy::{
    CreditPolicy, DEFAULT_ENTERPRISE_TIER_CREDITS, DEFAULT_FREE_TIER_CREDITS,
    DEFAULT_PRO_TIER_CREDITS, DEFAULT_SUBSCRIPTION_DAYS, DEFAULT_UNITS_PER_CREDIT,
    MAX_DURATION_DAYS,
};
pub use selection::{BackendSelection, PrivilegedKey, PublicBackendSelection, SelectionError};
pub use status::{AccountStatus, BalanceCheck, ConsumeReceipt};
