//! Directory (central server) lookup bodies.

use serde::{Deserialize, Serialize};

use crate::ChunkCoord;

/// Body of `POST /new_chunk_server`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkServerRequest {
    pub chunk_coordinates: ChunkCoord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkServerResponse {
    pub chunk_server_address: String,
}
