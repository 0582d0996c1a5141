//! Client -> Server messages.

use serde::{Deserialize, Serialize};

use crate::{ChunkCoord, Color, PelletId, ProtocolError, Vector};

/// Outbound envelope: `{ "type": ..., "data": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Full local-player state.
    Player(PlayerState),
    /// A pellet was consumed locally.
    Pellet(PelletEaten),
    /// The local player touched a hazard.
    GhostCollision(GhostCollision),
    /// Bare departure notice.
    Disconnect(Departure),
    /// Departure carrying the final player state.
    PlayerLeaving(PlayerState),
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Player(_) => "player",
            ClientMessage::Pellet(_) => "pellet",
            ClientMessage::GhostCollision(_) => "ghost_collision",
            ClientMessage::Disconnect(_) => "disconnect",
            ClientMessage::PlayerLeaving(_) => "player_leaving",
        }
    }
}

/// Player status as tracked by chunk servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Active,
    Left,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: String,
    pub position: Vector,
    pub velocity: Vector,
    pub color: Color,
    pub score: u32,
    pub location: ChunkCoord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PlayerStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PelletEaten {
    #[serde(rename = "pelletId")]
    pub pellet_id: PelletId,
    /// Id of the player that ate it.
    pub id: String,
    pub score: u32,
    pub location: ChunkCoord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GhostCollision {
    pub id: String,
    pub score: u32,
    pub position: Vector,
    pub location: ChunkCoord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Departure {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_uses_type_and_data_keys() {
        let msg = ClientMessage::Pellet(PelletEaten {
            pellet_id: PelletId::from_cell(3, 4),
            id: "p1".into(),
            score: 20,
            location: ChunkCoord::new(1, 2),
        });
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "pellet");
        assert_eq!(value["data"]["pelletId"], "pellet_3_4");
        assert_eq!(value["data"]["location"]["x"], 1);
        assert_eq!(value["data"]["location"]["y"], 2);
    }

    #[test]
    fn player_state_omits_absent_status() {
        let msg = ClientMessage::Player(PlayerState {
            id: "p1".into(),
            position: Vector::new(60.0, 60.0),
            velocity: Vector::ZERO,
            color: Color::new(255, 255, 0),
            score: 0,
            location: ChunkCoord::new(0, 0),
            status: None,
        });
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"player\""));
        assert!(json.contains("\"color\":\"#ffff00\""));
        assert!(!json.contains("status"));
    }
}
