//! Backend selection handlers.
//!
//! The privileged key is accepted on `PUT` and never returned: every response
//! carries a [`PublicBackendSelection`].

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use quill_core::{BackendSelection, PrivilegedKey, PublicBackendSelection};

use super::parse_user_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Select backend request.
#[derive(Debug, Deserialize)]
pub struct SelectBackendRequest {
    /// Provider project reference.
    pub project_ref: String,
    /// REST endpoint base URL.
    pub public_endpoint: String,
    /// Client-safe key.
    pub public_key: String,
    /// Server-side key.
    pub privileged_key: PrivilegedKey,
}

/// Deselect response.
#[derive(Debug, Serialize)]
pub struct ClearSelectionResponse {
    /// Whether a selection existed.
    pub cleared: bool,
}

/// Current selection, public fields only.
pub async fn get_selection(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<PublicBackendSelection>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    let selection = state
        .store
        .get_selection(&user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No backend selected".into()))?;
    Ok(Json(selection.public_view()))
}

/// Select (or replace) the user's backend project.
pub async fn put_selection(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<SelectBackendRequest>,
) -> Result<Json<PublicBackendSelection>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    let selection = BackendSelection::new(
        body.project_ref,
        body.public_endpoint,
        body.public_key,
        body.privileged_key,
    )?;

    state.store.put_selection(&user_id, &selection).await?;

    tracing::info!(
        user_id = %user_id,
        project_ref = %selection.project_ref,
        key = %quill_proxy::key_fingerprint(&selection.privileged_key),
        "Backend selected"
    );
    Ok(Json(selection.public_view()))
}

/// Deselect the user's backend project.
pub async fn clear_selection(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<ClearSelectionResponse>, ApiError> {
    let user_id = parse_user_id(user_id)?;
    let cleared = state.store.clear_selection(&user_id).await?;

    tracing::info!(user_id = %user_id, cleared, "Backend deselected");
    Ok(Json(ClearSelectionResponse { cleared }))
}
