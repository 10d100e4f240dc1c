use thiserror::Error;

use layerio_core::StreamError;

/// Failures surfaced by harness commands.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("stream: {0}")]
    Stream(#[from] StreamError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("conflicting options: {0}")]
    ConflictingOptions(&'static str),
}
