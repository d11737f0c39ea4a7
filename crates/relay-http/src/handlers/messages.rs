use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::Value;

use relay_core::{domain::Message, service::Submission};

use crate::{auth::Credential, router::AppState};

use super::ApiError;

/// `GET /` → every retained message, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    credential: Credential,
) -> Result<Json<Vec<Message>>, ApiError> {
    let log = state.service.list(credential.as_deref()).await?;
    Ok(Json(log))
}

/// `POST /` → store a message and run its command, if any.
///
/// The body is read as raw bytes so clients that omit the JSON content type
/// still work; an unparsable body is reported as `No message`.
pub async fn submit_message(
    State(state): State<AppState>,
    credential: Credential,
    body: Bytes,
) -> Result<(StatusCode, String), ApiError> {
    let value: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    match state.service.submit(credential.as_deref(), &value).await? {
        Submission::Ignored | Submission::Stored { .. } => Ok((StatusCode::OK, "OK".to_string())),
        Submission::CommandFailed { error } => Ok((
            StatusCode::BAD_GATEWAY,
            format!("Command failed: {error}"),
        )),
    }
}
