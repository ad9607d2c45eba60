//! API handlers.

pub mod accounts;
pub mod backend;
pub mod credits;
pub mod health;
pub mod query;
pub mod subscriptions;

use quill_core::UserId;

use crate::error::ApiError;

/// Parse the `:user_id` path segment.
pub(crate) fn parse_user_id(raw: String) -> Result<UserId, ApiError> {
    Ok(UserId::new(raw)?)
}
