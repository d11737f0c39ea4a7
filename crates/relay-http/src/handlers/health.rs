use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{auth::Credential, router::AppState};

use super::ApiError;

/// `GET /health` → `{"name": <channel name>}`.
pub async fn health(
    State(state): State<AppState>,
    credential: Credential,
) -> Result<Json<Value>, ApiError> {
    let name = state.service.health(credential.as_deref())?;
    Ok(Json(json!({ "name": name })))
}
