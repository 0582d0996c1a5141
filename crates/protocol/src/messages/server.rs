//! Server -> Client message parsing.
//!
//! Chunk servers push two shapes over the same socket:
//! - a bare combined snapshot `{ players, eatenPellets, ghosts, droppers, restoredPellets }`
//!   broadcast on a fixed interval
//! - `{ type, data }` events relayed from other players

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::{Departure, PelletEaten, PlayerStatus, null_as_default};
use crate::{ChunkCoord, Color, PelletId, ProtocolError, Vector};

/// Parsed server message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Snapshot(Snapshot),
    Event(ServerEvent),
}

impl ServerMessage {
    /// Parse one text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if value.get("type").is_some() {
            Ok(ServerMessage::Event(serde_json::from_value(value)?))
        } else {
            Ok(ServerMessage::Snapshot(serde_json::from_value(value)?))
        }
    }
}

/// Enveloped events relayed by a chunk server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A single player's state.
    Player(PlayerSnapshot),
    /// Another player ate a pellet.
    Pellet(PelletEaten),
    Disconnect(Departure),
    /// The full state rides along; only the id matters here.
    PlayerLeaving(Departure),
}

/// Periodic authoritative snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub players: HashMap<String, PlayerSnapshot>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub eaten_pellets: Vec<PelletId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ghosts: HashMap<String, GhostSnapshot>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub droppers: HashMap<String, DropperSnapshot>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub restored_pellets: HashMap<String, RestoredPellet>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
            && self.eaten_pellets.is_empty()
            && self.ghosts.is_empty()
            && self.droppers.is_empty()
            && self.restored_pellets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Present on the wire, but the snapshot map key is authoritative.
    #[serde(default)]
    pub id: String,
    pub position: Vector,
    #[serde(default)]
    pub velocity: Vector,
    /// Unparseable colors are dropped rather than failing the whole snapshot.
    #[serde(default, deserialize_with = "lenient_color")]
    pub color: Option<Color>,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub location: ChunkCoord,
    #[serde(default)]
    pub status: Option<PlayerStatus>,
}

impl PlayerSnapshot {
    pub fn has_left(&self) -> bool {
        self.status == Some(PlayerStatus::Left)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GhostSnapshot {
    pub position: Vector,
    #[serde(default)]
    pub velocity: Vector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropperSnapshot {
    pub position: Vector,
    #[serde(default)]
    pub velocity: Vector,
    /// Older servers omit this; the id namespace is used instead.
    #[serde(default)]
    pub location: Option<ChunkCoord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredPellet {
    #[serde(default)]
    pub id: Option<PelletId>,
    pub position: Vector,
    pub map_index: u32,
}

fn lenient_color<'de, D>(deserializer: D) -> Result<Option<Color>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| v.as_str().and_then(|s| s.parse().ok())))
}
