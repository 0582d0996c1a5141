// Static collision structure for one chunk's map
use glam::Vec2;
use protocol::{ChunkCoord, MapData, PelletId, Position};

/// What a map symbol turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    Wall,
    /// Walkable cell that starts with a pellet.
    PelletSeed,
    /// Walkable cell with no pellet.
    Floor,
    /// Nothing drawn, still walkable.
    Empty,
}

impl Tile {
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol.trim() {
            "1" => Tile::Wall,
            "0" => Tile::PelletSeed,
            "" | "-" => Tile::Empty,
            _ => Tile::Floor,
        }
    }
}

/// Axis-aligned wall box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallBox {
    pub min: Vec2,
    pub max: Vec2,
}

impl WallBox {
    /// Circle overlap, inclusive on every side: touching counts.
    #[inline]
    pub fn touches_circle(&self, center: Vec2, radius: f32) -> bool {
        let nearest = center.clamp(self.min, self.max);
        center.distance_squared(nearest) <= radius * radius
    }
}

/// Immutable wall/pellet layout of one chunk. Rebuilt wholesale on every
/// chunk change, always together with a fresh pellet ledger.
#[derive(Debug, Clone)]
pub struct TileGrid {
    source: ChunkCoord,
    tile_size: f32,
    tiles: Vec<Vec<Tile>>,
    walls: Vec<WallBox>,
}

impl TileGrid {
    /// Rows are `y`, columns are `x`.
    pub fn build(source: ChunkCoord, map: &MapData, tile_size: f32) -> Self {
        let tiles: Vec<Vec<Tile>> = map
            .iter()
            .map(|row| row.iter().map(|s| Tile::from_symbol(s)).collect())
            .collect();

        let mut walls = Vec::new();
        for (row, line) in tiles.iter().enumerate() {
            for (col, tile) in line.iter().enumerate() {
                if *tile == Tile::Wall {
                    let min = Vec2::new(col as f32 * tile_size, row as f32 * tile_size);
                    walls.push(WallBox {
                        min,
                        max: min + Vec2::splat(tile_size),
                    });
                }
            }
        }

        Self {
            source,
            tile_size,
            tiles,
            walls,
        }
    }

    /// Chunk this grid was built for.
    pub fn source(&self) -> ChunkCoord {
        self.source
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn walls(&self) -> &[WallBox] {
        &self.walls
    }

    pub fn tile_at(&self, col: i32, row: i32) -> Option<Tile> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        self.tiles.get(row)?.get(col).copied()
    }

    pub fn collides(&self, point: Position, radius: f32) -> bool {
        self.walls.iter().any(|w| w.touches_circle(point, radius))
    }

    /// Cell containing a chunk-local point.
    pub fn cell_of(&self, point: Position) -> (i32, i32) {
        (
            (point.x / self.tile_size).floor() as i32,
            (point.y / self.tile_size).floor() as i32,
        )
    }

    /// Center of a cell.
    pub fn cell_center(&self, col: i32, row: i32) -> Position {
        Vec2::new(
            (col as f32 + 0.5) * self.tile_size,
            (row as f32 + 0.5) * self.tile_size,
        )
    }

    pub fn pellet_id_at(&self, point: Position) -> PelletId {
        let (col, row) = self.cell_of(point);
        PelletId::from_cell(col, row)
    }

    /// Starting pellet positions, one per seed cell, at the cell center.
    pub fn pellet_seeds(&self) -> Vec<Position> {
        let mut seeds = Vec::new();
        for (row, line) in self.tiles.iter().enumerate() {
            for (col, tile) in line.iter().enumerate() {
                if *tile == Tile::PelletSeed {
                    seeds.push(self.cell_center(col as i32, row as i32));
                }
            }
        }
        seeds
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds map data from compact rows such as `"1101"`.
    pub(crate) fn map_from_rows(rows: &[&str]) -> MapData {
        rows.iter()
            .map(|r| r.chars().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn symbols_map_to_exactly_one_tile_kind() {
        assert_eq!(Tile::from_symbol("1"), Tile::Wall);
        assert_eq!(Tile::from_symbol("0"), Tile::PelletSeed);
        assert_eq!(Tile::from_symbol("-"), Tile::Empty);
        assert_eq!(Tile::from_symbol("7"), Tile::Floor);
        assert_eq!(Tile::from_symbol("b"), Tile::Floor);
    }

    #[test]
    fn walls_and_seeds_follow_row_major_layout() {
        let grid = TileGrid::build(ChunkCoord::new(1, 2), &map_from_rows(&["10", "0x"]), 40.0);
        assert_eq!(grid.source(), ChunkCoord::new(1, 2));
        assert_eq!(grid.walls().len(), 1);
        assert_eq!(grid.walls()[0].max, Vec2::new(40.0, 40.0));
        assert_eq!(grid.pellet_seeds(), vec![Vec2::new(60.0, 20.0), Vec2::new(20.0, 60.0)]);
        assert_eq!(grid.tile_at(1, 1), Some(Tile::Floor));
        assert_eq!(grid.tile_at(-1, 0), None);
    }

    #[test]
    fn tangent_circle_collides() {
        let grid = TileGrid::build(ChunkCoord::default(), &map_from_rows(&["1"]), 40.0);
        // Right edge of the wall sits at x = 40.
        assert!(grid.collides(Vec2::new(55.0, 20.0), 15.0));
        assert!(!grid.collides(Vec2::new(55.01, 20.0), 15.0));
        // Corner: nearest point is (40, 40).
        assert!(!grid.collides(Vec2::new(52.0, 52.0), 15.0));
        assert!(grid.collides(Vec2::new(50.0, 50.0), 15.0));
    }

    #[test]
    fn pellet_ids_derive_from_cells() {
        let grid = TileGrid::build(ChunkCoord::default(), &map_from_rows(&["000"]), 40.0);
        assert_eq!(grid.pellet_id_at(Vec2::new(100.0, 20.0)), PelletId::from_cell(2, 0));
        assert_eq!(grid.pellet_id_at(Vec2::new(81.0, 39.0)), PelletId::from_cell(2, 0));
    }
}
