//! Shared protocol crate for the chunked pellet-maze client.
//!
//! This crate contains:
//! - The `{ type, data }` JSON envelope sent to chunk servers
//! - Snapshot and event types broadcast by chunk servers
//! - Directory request/response bodies
//! - Shared types (Color, Vector, ChunkCoord, PelletId)

mod chunk;
mod error;
pub mod messages;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use chunk::{ChunkCoord, ChunkExtent, PelletId, namespace_index};
pub use error::ProtocolError;

/// Raw tile symbols for one chunk, row-major, as served by `/getMap`.
pub type MapData = Vec<Vec<String>>;

/// Represents a 2D position using glam's Vec2.
pub type Position = glam::Vec2;

/// RGB color used for players. Travels as a `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ProtocolError;

    /// Accepts `#rgb` and `#rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = channel(&c.to_string())?;
                    out[i] = v * 17;
                }
                Ok(Color::new(out[0], out[1], out[2]))
            }
            6 if hex.is_ascii() => Ok(Color::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// `{x, y}` vector as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}

impl Vector {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<Position> for Vector {
    fn from(v: Position) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Vector> for Position {
    fn from(v: Vector) -> Self {
        Position::new(v.x, v.y)
    }
}
