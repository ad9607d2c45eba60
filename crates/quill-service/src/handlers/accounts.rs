//! Account initialization and status handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use quill_core::{AccountStatus, Tier};

use super::parse_user_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Initialize account request.
#[derive(Debug, Default, Deserialize)]
pub struct InitializeAccountRequest {
    /// Starting tier (default: free).
    #[serde(default)]
    pub tier: Option<Tier>,
}

/// Create the account if it does not exist.
///
/// Idempotent: an existing account is returned unchanged. The body is
/// optional; an empty body means the free tier.
pub async fn initialize_account(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
    body: Bytes,
) -> Result<Json<AccountStatus>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    let request: InitializeAccountRequest = if body.is_empty() {
        InitializeAccountRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    };
    let tier = request.tier.unwrap_or(Tier::Free);

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        tier = %tier,
        "Initializing account"
    );

    let account = state.credits.initialize_account(&user_id, tier).await?;
    Ok(Json(AccountStatus::project(
        &account,
        state.credits.policy(),
        Utc::now(),
    )))
}

/// Full status projection.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<AccountStatus>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    Ok(Json(state.credits.status(&user_id).await?))
}
