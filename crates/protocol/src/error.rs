//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid color: {0:?}")]
    InvalidColor(String),

    #[error("Id {0:?} carries no chunk namespace")]
    MissingNamespace(String),

    #[error("Map index {index} is outside a {width}x{height} chunk grid")]
    MapIndexOutOfRange { index: u32, width: i32, height: i32 },
}
