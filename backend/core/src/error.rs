use std::time::Duration;

use thiserror::Error;

/// Top-level error type for AssetLens.
#[derive(Debug, Error)]
pub enum LensError {
    /// HTTP 429 from the analysis endpoint. Recovered by a scheduled retry.
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("speech error: {0}")]
    Speech(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LensError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LensError::RateLimited { .. })
    }

    /// Message suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            LensError::Upstream { message, .. } => message.clone(),
            LensError::RateLimited { retry_after } => format!(
                "Rate limit exceeded. Please try again in {} seconds",
                retry_after.as_secs()
            ),
            other => other.to_string(),
        }
    }
}
