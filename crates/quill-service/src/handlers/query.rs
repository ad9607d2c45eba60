//! Query proxy handler.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use quill_proxy::{validate, QueryResult};

use super::parse_user_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Validate a structured query and run it against the user's backend.
///
/// Validation happens before the selection is even loaded, so a rejected
/// request costs no storage or network round trip.
pub async fn run_query(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(raw): Json<serde_json::Value>,
) -> Result<Json<QueryResult>, ApiError> {
    let user_id = parse_user_id(user_id)?;

    let request = validate(&raw).inspect_err(|e| {
        tracing::debug!(user_id = %user_id, code = e.code(), error = %e, "Query rejected");
    })?;

    let selection = state.store.get_selection(&user_id).await?;
    let result = state
        .executor
        .execute(selection.as_ref(), &request)
        .await?;

    tracing::info!(
        service = %auth.service_name,
        user_id = %user_id,
        operation = %request.operation(),
        table = %request.table(),
        mutation = request.operation().is_mutation(),
        rows = result.count,
        "Query proxied"
    );
    Ok(Json(result))
}
