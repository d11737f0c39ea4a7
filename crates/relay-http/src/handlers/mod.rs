//! HTTP handlers.
//!
//! Each handler is a thin adapter: pull the credential and body out of the
//! request, call into the `relay-core` channel service, map the outcome to a
//! status code. Auth and validation failures answer `400` with a short text
//! reason.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use relay_core::errors::Error;

mod health;
mod messages;

pub use health::health;
pub use messages::{list_messages, submit_message};

/// Core error rendered as a plain-text response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = if status.is_server_error() && !self.0.is_external() {
            tracing::error!("request failed: {}", self.0);
            "Internal error".to_string()
        } else {
            self.0.to_string()
        };
        (status, body).into_response()
    }
}

fn status_for(e: &Error) -> StatusCode {
    if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else if e.is_external() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
