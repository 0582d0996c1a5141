//! Pellet set of the active chunk.
//!
//! Every removal path is idempotent: a pellet eaten locally and then
//! confirmed by the server (or confirmed twice) leaves no copy behind.

use protocol::{ChunkCoord, PelletId, Position};
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub struct Pellet {
    pub id: PelletId,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct PelletLedger {
    source: ChunkCoord,
    tile_size: f32,
    radius: f32,
    /// Seed order; the first hit in this order wins in `local_consume`.
    pellets: Vec<Pellet>,
}

impl PelletLedger {
    pub fn new(source: ChunkCoord, tile_size: f32, radius: f32) -> Self {
        Self {
            source,
            tile_size,
            radius,
            pellets: Vec::new(),
        }
    }

    /// Identity of whatever pellet sits at `position`.
    pub fn id_for(&self, position: Position) -> PelletId {
        let col = (position.x / self.tile_size).floor() as i32;
        let row = (position.y / self.tile_size).floor() as i32;
        PelletId::from_cell(col, row)
    }

    /// Replace the whole set. Duplicate cells collapse to one pellet.
    pub fn seed(&mut self, source: ChunkCoord, positions: impl IntoIterator<Item = Position>) {
        self.source = source;
        self.pellets.clear();
        for position in positions {
            let id = self.id_for(position);
            if !self.contains(&id) {
                self.pellets.push(Pellet { id, position });
            }
        }
    }

    pub fn source(&self) -> ChunkCoord {
        self.source
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.pellets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pellets.is_empty()
    }

    pub fn contains(&self, id: &PelletId) -> bool {
        self.pellets.iter().any(|p| &p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pellet> {
        self.pellets.iter()
    }

    /// Remove and return the first pellet strictly within reach of a
    /// circle. At most one pellet per call.
    pub fn local_consume(&mut self, center: Position, radius: f32) -> Option<Pellet> {
        let reach = self.radius + radius;
        let index = self
            .pellets
            .iter()
            .position(|p| p.position.distance(center) < reach)?;
        Some(self.pellets.remove(index))
    }

    /// Server says the pellet is gone. No-op for other chunks or unknown ids.
    pub fn confirm_removal(&mut self, chunk: ChunkCoord, id: &PelletId) -> bool {
        if chunk != self.source {
            trace!(%chunk, active = %self.source, %id, "Ignoring removal for inactive chunk");
            return false;
        }
        let before = self.pellets.len();
        self.pellets.retain(|p| &p.id != id);
        before != self.pellets.len()
    }

    /// Server put the pellet back. Only for the active chunk and only if absent.
    pub fn restore(&mut self, chunk: ChunkCoord, position: Position) -> bool {
        if chunk != self.source {
            return false;
        }
        let id = self.id_for(position);
        if self.contains(&id) {
            return false;
        }
        self.pellets.push(Pellet { id, position });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn ledger_with(positions: &[(f32, f32)]) -> PelletLedger {
        let mut ledger = PelletLedger::new(ChunkCoord::new(0, 0), 40.0, 3.0);
        ledger.seed(
            ChunkCoord::new(0, 0),
            positions.iter().map(|&(x, y)| Vec2::new(x, y)),
        );
        ledger
    }

    #[test]
    fn seed_replaces_previous_set_and_source() {
        let mut ledger = ledger_with(&[(20.0, 20.0), (60.0, 20.0)]);
        ledger.seed(ChunkCoord::new(1, 0), [Vec2::new(100.0, 100.0)]);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.source(), ChunkCoord::new(1, 0));
    }

    #[test]
    fn local_consume_takes_at_most_one() {
        // Two pellets both inside reach of a fat circle.
        let mut ledger = ledger_with(&[(20.0, 20.0), (60.0, 20.0)]);
        let eaten = ledger.local_consume(Vec2::new(40.0, 20.0), 30.0).unwrap();
        assert_eq!(eaten.id, PelletId::from_cell(0, 0));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn local_consume_requires_strict_overlap() {
        let mut ledger = ledger_with(&[(20.0, 20.0)]);
        // Exactly radius + pellet radius away.
        assert!(ledger.local_consume(Vec2::new(38.0, 20.0), 15.0).is_none());
        assert!(ledger.local_consume(Vec2::new(37.9, 20.0), 15.0).is_some());
    }

    #[test]
    fn confirm_removal_is_idempotent_after_local_consume() {
        let mut ledger = ledger_with(&[(20.0, 20.0), (60.0, 20.0)]);
        let eaten = ledger.local_consume(Vec2::new(20.0, 20.0), 15.0).unwrap();
        assert!(!ledger.confirm_removal(ChunkCoord::new(0, 0), &eaten.id));
        assert!(!ledger.confirm_removal(ChunkCoord::new(0, 0), &eaten.id));
        assert!(!ledger.contains(&eaten.id));

        let other = PelletId::from_cell(1, 0);
        assert!(ledger.confirm_removal(ChunkCoord::new(0, 0), &other));
        assert!(!ledger.confirm_removal(ChunkCoord::new(0, 0), &other));
        assert!(ledger.is_empty());
    }

    #[test]
    fn removal_for_inactive_chunk_is_ignored() {
        let mut ledger = ledger_with(&[(20.0, 20.0)]);
        assert!(!ledger.confirm_removal(ChunkCoord::new(2, 2), &PelletId::from_cell(0, 0)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn restored_pellet_gets_seeded_identity() {
        let mut ledger = ledger_with(&[(20.0, 20.0)]);
        let seeded_id = ledger.iter().next().unwrap().id.clone();
        ledger.local_consume(Vec2::new(20.0, 20.0), 15.0).unwrap();

        assert!(ledger.restore(ChunkCoord::new(0, 0), Vec2::new(20.0, 20.0)));
        assert!(ledger.contains(&seeded_id));
        // Already present.
        assert!(!ledger.restore(ChunkCoord::new(0, 0), Vec2::new(20.0, 20.0)));
        // Wrong chunk.
        ledger.local_consume(Vec2::new(20.0, 20.0), 15.0).unwrap();
        assert!(!ledger.restore(ChunkCoord::new(0, 1), Vec2::new(20.0, 20.0)));
        assert!(ledger.is_empty());
    }
}
