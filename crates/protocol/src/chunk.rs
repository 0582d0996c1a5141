//! Chunk coordinates, the chunk-grid extent and derived identities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Integer coordinate of a map partition. Serialized as `{x, y}` (the
/// `location` field on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Size of the chunk grid. Valid coordinates are `0..width` by `0..height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkExtent {
    pub width: i32,
    pub height: i32,
}

impl ChunkExtent {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        coord.x >= 0 && coord.y >= 0 && coord.x < self.width && coord.y < self.height
    }

    /// Flat index used by chunk servers (`mapIndex`, `map{index}_` prefixes).
    ///
    /// Column-major: `x * height + y`.
    pub fn map_index(&self, coord: ChunkCoord) -> Option<u32> {
        if !self.contains(coord) {
            return None;
        }
        u32::try_from(coord.x * self.height + coord.y).ok()
    }

    /// Inverse of [`ChunkExtent::map_index`].
    pub fn coord_of(&self, index: u32) -> Result<ChunkCoord, ProtocolError> {
        let out_of_range = || ProtocolError::MapIndexOutOfRange {
            index,
            width: self.width,
            height: self.height,
        };
        if self.height <= 0 {
            return Err(out_of_range());
        }
        let index_i = i32::try_from(index).map_err(|_| out_of_range())?;
        let coord = ChunkCoord::new(index_i / self.height, index_i % self.height);
        if self.contains(coord) {
            Ok(coord)
        } else {
            Err(out_of_range())
        }
    }

    /// Chunk that owns a namespaced hazard/dropper id such as `map5_ghost2`.
    pub fn coord_of_id(&self, id: &str) -> Result<ChunkCoord, ProtocolError> {
        let index = namespace_index(id).ok_or_else(|| ProtocolError::MissingNamespace(id.to_string()))?;
        self.coord_of(index)
    }
}

/// Extracts the flat map index from a `map{index}_...` id.
pub fn namespace_index(id: &str) -> Option<u32> {
    let rest = id.strip_prefix("map")?;
    let (digits, _) = rest.split_once('_')?;
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Pellet identity. Derived from the pellet's grid cell so every party
/// computes the same id for the same position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PelletId(pub String);

impl PelletId {
    pub fn from_cell(col: i32, row: i32) -> Self {
        Self(format!("pellet_{}_{}", col, row))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PelletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PelletId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_index_matches_four_by_four_layout() {
        let extent = ChunkExtent::new(4, 4);
        assert_eq!(extent.map_index(ChunkCoord::new(0, 0)), Some(0));
        assert_eq!(extent.map_index(ChunkCoord::new(1, 2)), Some(6));
        assert_eq!(extent.map_index(ChunkCoord::new(3, 3)), Some(15));
        assert_eq!(extent.map_index(ChunkCoord::new(4, 0)), None);
        assert_eq!(extent.coord_of(6).unwrap(), ChunkCoord::new(1, 2));
        assert!(extent.coord_of(16).is_err());
    }

    #[test]
    fn namespaced_ids_resolve_to_chunks() {
        let extent = ChunkExtent::new(4, 4);
        assert_eq!(namespace_index("map5_ghost1"), Some(5));
        assert_eq!(namespace_index("map_ghost1"), None);
        assert_eq!(namespace_index("ghost1"), None);
        assert_eq!(extent.coord_of_id("map13_dropper").unwrap(), ChunkCoord::new(3, 1));
        assert!(matches!(
            extent.coord_of_id("player-7"),
            Err(ProtocolError::MissingNamespace(_))
        ));
    }
}
