//! Local-player prediction: input intent to a collision-resolved step.

use glam::Vec2;
use protocol::Position;

use crate::grid::TileGrid;
use crate::input::Direction;

#[derive(Debug, Clone, Copy)]
pub struct LocalMotionController {
    /// Distance per tick.
    pub speed: f32,
    pub radius: f32,
}

impl LocalMotionController {
    pub fn new(speed: f32, radius: f32) -> Self {
        Self { speed, radius }
    }

    pub fn intent_velocity(&self, intent: Option<Direction>) -> Vec2 {
        intent.map_or(Vec2::ZERO, |d| d.unit() * self.speed)
    }

    /// Zero every velocity component whose move would touch a wall.
    ///
    /// Each axis is tested on its own so the player slides along walls. When
    /// both single-axis moves are free but the combined one is not (a corner
    /// hit head on), the X component is kept.
    pub fn resolve(&self, grid: &TileGrid, position: Position, velocity: Vec2) -> Vec2 {
        let mut out = Vec2::ZERO;
        if velocity.x != 0.0 && !grid.collides(position + Vec2::new(velocity.x, 0.0), self.radius) {
            out.x = velocity.x;
        }
        if velocity.y != 0.0 && !grid.collides(position + Vec2::new(0.0, velocity.y), self.radius) {
            out.y = velocity.y;
        }
        if out.x != 0.0 && out.y != 0.0 && grid.collides(position + out, self.radius) {
            out.y = 0.0;
        }
        out
    }

    /// Apply one tick of movement. Returns the velocity actually used.
    pub fn advance(&self, grid: &TileGrid, position: &mut Position, intent: Option<Direction>) -> Vec2 {
        let velocity = self.resolve(grid, *position, self.intent_velocity(intent));
        *position += velocity;
        velocity
    }
}
