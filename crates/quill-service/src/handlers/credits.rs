//! Credit check and consume handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use quill_core::{BalanceCheck, ConsumeReceipt};

use super::parse_user_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Read-only check whether the user may start a gated action.
pub async fn check_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceCheck>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    Ok(Json(state.credits.check_balance(&user_id).await?))
}

/// Spend one credit.
///
/// Any error response means the action is not authorized.
pub async fn consume(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<ConsumeReceipt>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    let receipt = state.credits.consume(&user_id).await?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        balance = receipt.balance,
        "Consume authorized"
    );

    Ok(Json(receipt))
}
