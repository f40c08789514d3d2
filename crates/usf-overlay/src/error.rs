//! Overlay error types.

use thiserror::Error;
use usf_core::models::identity::SessionId;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("configuration file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure reported by a host broadcast primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    #[error("session {0} is not connected")]
    Disconnected(SessionId),

    #[error("broadcast failed: {0}")]
    Transport(String),
}
