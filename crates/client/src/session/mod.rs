//! Local player, the live session and session persistence.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use protocol::messages::{GhostCollision, PlayerState, PlayerStatus};
use protocol::{ChunkCoord, Color, Position};
use serde::{Deserialize, Serialize};

use crate::network::Connection;

/// The player this client simulates. Its chunk is ground truth for which
/// chunk server owns the connection.
#[derive(Debug, Clone)]
pub struct LocalPlayer {
    pub id: String,
    pub position: Position,
    pub velocity: Vec2,
    pub radius: f32,
    pub color: Color,
    pub score: u32,
    pub lives: u32,
    pub chunk: ChunkCoord,
}

impl LocalPlayer {
    pub fn state(&self, status: Option<PlayerStatus>) -> PlayerState {
        PlayerState {
            id: self.id.clone(),
            position: self.position.into(),
            velocity: self.velocity.into(),
            color: self.color,
            score: self.score,
            location: self.chunk,
            status,
        }
    }

    pub fn ghost_collision(&self) -> GhostCollision {
        GhostCollision {
            id: self.id.clone(),
            score: self.score,
            position: self.position.into(),
            location: self.chunk,
        }
    }

    pub fn saved(&self) -> SavedSession {
        SavedSession {
            id: self.id.clone(),
            color: self.color,
            score: self.score,
            x: self.chunk.x,
            y: self.chunk.y,
        }
    }
}

/// Id and color for a player with no saved session.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: String,
    pub color: Color,
}

/// One live session: the player plus exactly one connection.
pub struct Session {
    pub player: LocalPlayer,
    /// Address of the chunk server behind `connection`.
    pub address: String,
    pub connection: Box<dyn Connection>,
}

impl Session {
    pub fn chunk(&self) -> ChunkCoord {
        self.player.chunk
    }
}

/// Persisted `{id, color, score, X, Y}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub id: String,
    pub color: Color,
    #[serde(default)]
    pub score: u32,
    #[serde(rename = "X")]
    pub x: i32,
    #[serde(rename = "Y")]
    pub y: i32,
}

impl SavedSession {
    pub fn chunk(&self) -> ChunkCoord {
        ChunkCoord::new(self.x, self.y)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Corrupt entries read as "no session".
    pub fn from_json(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Where the session is persisted between page loads / runs.
pub trait SessionStore {
    fn load(&self) -> Option<SavedSession>;
    fn save(&mut self, session: &SavedSession);
    fn clear(&mut self);
}

/// In-process store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Rc<RefCell<Option<SavedSession>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(saved: SavedSession) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Some(saved))),
        }
    }

    pub fn current(&self) -> Option<SavedSession> {
        self.slot.borrow().clone()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Option<SavedSession> {
        self.current()
    }

    fn save(&mut self, session: &SavedSession) {
        *self.slot.borrow_mut() = Some(session.clone());
    }

    fn clear(&mut self) {
        *self.slot.borrow_mut() = None;
    }
}
