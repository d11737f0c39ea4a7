use std::time::Duration;

/// Core error type for the channel.
///
/// Adapter crates map their specific errors into this type so the HTTP layer
/// can decide consistently between a client error and a server-side failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("Invalid authorization")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("external error: {0}")]
    External(String),

    #[error("external lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// True for failures caused by the request itself (answered with 400).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Validation(_))
    }

    /// True for failures of a third-party lookup.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_) | Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
