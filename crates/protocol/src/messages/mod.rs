//! Message definitions for the chunk-server protocol.
//!
//! This module contains both client->server and server->client message types,
//! plus the directory lookup bodies.

mod client;
mod directory;
mod server;

pub use client::*;
pub use directory::*;
pub use server::*;

use serde::{Deserialize, Deserializer};

/// Go marshals nil slices and maps as `null`; treat those as empty.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
