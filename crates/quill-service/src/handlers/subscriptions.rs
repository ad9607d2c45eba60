//! Admin handlers for the subscription lifecycle and monthly reset.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use quill_core::{Account, AccountStatus};

use super::parse_user_id;
use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Upgrade or renew request.
#[derive(Debug, Deserialize)]
pub struct DurationRequest {
    /// Subscription length from now, in days.
    pub duration_days: i64,
}

/// Bonus grant request.
#[derive(Debug, Deserialize)]
pub struct BonusRequest {
    /// Credits to add. Must be positive.
    pub amount: i64,
    /// Reason (for audit logging).
    #[serde(default)]
    pub reason: Option<String>,
}

/// Expiry check response.
#[derive(Debug, Serialize)]
pub struct ExpiryCheckResponse {
    /// Whether the subscription had lapsed and was downgraded.
    pub expired: bool,
}

fn project(state: &AppState, account: &Account) -> Json<AccountStatus> {
    Json(AccountStatus::project(
        account,
        state.credits.policy(),
        Utc::now(),
    ))
}

/// Move to pro, resetting the balance to the pro allotment.
pub async fn upgrade(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(user_id): Path<String>,
    Json(body): Json<DurationRequest>,
) -> Result<Json<AccountStatus>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    let account = state
        .subscriptions
        .upgrade(&user_id, body.duration_days)
        .await?;

    tracing::info!(admin_id = %auth.admin_id, user_id = %user_id, "Admin upgrade");
    Ok(project(&state, &account))
}

/// Return to free.
pub async fn downgrade(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(user_id): Path<String>,
) -> Result<Json<AccountStatus>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    let account = state.subscriptions.downgrade(&user_id).await?;

    tracing::info!(admin_id = %auth.admin_id, user_id = %user_id, "Admin downgrade");
    Ok(project(&state, &account))
}

/// Extend the subscription without touching the balance.
pub async fn renew(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(user_id): Path<String>,
    Json(body): Json<DurationRequest>,
) -> Result<Json<AccountStatus>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    let account = state
        .subscriptions
        .renew(&user_id, body.duration_days)
        .await?;

    tracing::info!(admin_id = %auth.admin_id, user_id = %user_id, "Admin renew");
    Ok(project(&state, &account))
}

/// Add bonus credits.
pub async fn grant_bonus(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(user_id): Path<String>,
    Json(body): Json<BonusRequest>,
) -> Result<Json<AccountStatus>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    let account = state
        .subscriptions
        .grant_bonus(&user_id, body.amount)
        .await?;

    tracing::info!(
        admin_id = %auth.admin_id,
        user_id = %user_id,
        amount = body.amount,
        reason = body.reason.as_deref().unwrap_or(""),
        "Admin bonus grant"
    );
    Ok(project(&state, &account))
}

/// Downgrade if the subscription has lapsed.
pub async fn check_expiry(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(user_id): Path<String>,
) -> Result<Json<ExpiryCheckResponse>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    let expired = state.subscriptions.check_expiry(&user_id).await?;
    Ok(Json(ExpiryCheckResponse { expired }))
}

/// Start a new monthly usage window.
pub async fn reset_monthly(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(user_id): Path<String>,
) -> Result<Json<AccountStatus>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    let account = state.credits.reset_monthly_window(&user_id).await?;
    Ok(project(&state, &account))
}
