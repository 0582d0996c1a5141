//! Engine error types.
//!
//! None of these are fatal to the game loop: lookups and connects are
//! retried on the next tick that still needs them.

use protocol::ChunkCoord;
use thiserror::Error;

/// Directory or map lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Request in flight; ask again next tick.
    #[error("Lookup for chunk {0} still pending")]
    Pending(ChunkCoord),

    #[error("Lookup for chunk {coord} failed: {reason}")]
    Failed { coord: ChunkCoord, reason: String },
}

impl LookupError {
    pub fn failed(coord: ChunkCoord, reason: impl Into<String>) -> Self {
        LookupError::Failed {
            coord,
            reason: reason.into(),
        }
    }
}

/// Opening a connection to a chunk server failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not connect to {address}: {reason}")]
pub struct ConnectError {
    pub address: String,
    pub reason: String,
}

impl ConnectError {
    pub fn new(address: &str, reason: impl Into<String>) -> Self {
        Self {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why a chunk transition did not complete this tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Directory: {0}")]
    Directory(LookupError),

    #[error("Map: {0}")]
    Map(LookupError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Connection to the new server is still handshaking.
    #[error("Still connecting to {0}")]
    Connecting(String),

    /// Backing off after an earlier failure.
    #[error("Waiting before the next attempt")]
    Deferred,
}

impl TransitionError {
    /// Nothing failed; the transition is just not ready yet.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            TransitionError::Directory(LookupError::Pending(_))
                | TransitionError::Map(LookupError::Pending(_))
                | TransitionError::Connecting(_)
                | TransitionError::Deferred
        )
    }
}

/// Configuration parse / validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}
