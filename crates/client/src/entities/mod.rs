//! Remote entities (other players, hazards, droppers) reconciled from
//! server snapshots.

use std::collections::HashMap;

use glam::Vec2;
use protocol::{ChunkCoord, Color, Position};
use tracing::debug;

use crate::config::RemoteConfig;
use crate::utils::{elapsed_ms, lerp};

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Player { color: Option<Color>, score: u32 },
    /// Patrolling ghost; touching one costs a life.
    Hazard,
    /// Item dropper.
    Dropper,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Player { .. } => "player",
            EntityKind::Hazard => "hazard",
            EntityKind::Dropper => "dropper",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteEntity {
    pub id: String,
    pub kind: EntityKind,
    /// Chunk the entity was last reported in.
    pub chunk: ChunkCoord,
    /// Rendered position, eased toward `target_position`.
    pub position: Position,
    pub target_position: Position,
    pub velocity: Vec2,
    pub radius: f32,
    /// Timestamp (ms) of the last snapshot that mentioned this entity.
    pub last_update: f64,
}

/// Outcome of one `apply_snapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Snapped,
    Retargeted,
}

pub struct RemoteEntityReconciler {
    entities: HashMap<String, RemoteEntity>,
    snap_threshold: f32,
    smoothing: f32,
    max_frame_dt: f32,
    radius: f32,
}

impl RemoteEntityReconciler {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            entities: HashMap::new(),
            snap_threshold: config.snap_threshold,
            smoothing: config.smoothing,
            max_frame_dt: config.max_frame_dt,
            radius: config.entity_radius,
        }
    }

    /// Ingest one authoritative entity state.
    pub fn apply_snapshot(
        &mut self,
        id: &str,
        position: Position,
        velocity: Vec2,
        kind: EntityKind,
        chunk: ChunkCoord,
        now: f64,
    ) -> Applied {
        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.kind = kind;
                entity.chunk = chunk;
                entity.velocity = velocity;
                entity.last_update = now;
                if position.distance(entity.target_position) > self.snap_threshold {
                    entity.position = position;
                    entity.target_position = position;
                    Applied::Snapped
                } else {
                    entity.target_position = position;
                    Applied::Retargeted
                }
            }
            None => {
                debug!(id, kind = kind.label(), %chunk, "New remote entity");
                self.entities.insert(
                    id.to_string(),
                    RemoteEntity {
                        id: id.to_string(),
                        kind,
                        chunk,
                        position,
                        target_position: position,
                        velocity,
                        radius: self.radius,
                        last_update: now,
                    },
                );
                Applied::Created
            }
        }
    }

    /// Ease entities of the active chunk toward their targets. `dt` is in
    /// seconds and is clamped; the step never passes the target.
    pub fn tick(&mut self, dt: f32, active: ChunkCoord) {
        let dt = dt.clamp(0.0, self.max_frame_dt);
        let t = (self.smoothing * dt).min(1.0);
        for entity in self.entities.values_mut().filter(|e| e.chunk == active) {
            entity.position = lerp(entity.position, entity.target_position, t);
        }
    }

    /// Drop entities whose last update is older than `timeout_ms`.
    pub fn evict_stale(&mut self, now: f64, timeout_ms: f64) -> usize {
        let before = self.entities.len();
        self.entities.retain(|id, e| {
            let alive = elapsed_ms(now, e.last_update) <= timeout_ms;
            if !alive {
                debug!(id = id.as_str(), kind = e.kind.label(), "Evicting stale entity");
            }
            alive
        });
        before - self.entities.len()
    }

    pub fn remove(&mut self, id: &str) -> Option<RemoteEntity> {
        self.entities.remove(id)
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn get(&self, id: &str) -> Option<&RemoteEntity> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities of the active chunk, the only ones advanced and rendered.
    pub fn visible(&self, active: ChunkCoord) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values().filter(move |e| e.chunk == active)
    }

    /// First hazard of the active chunk overlapping the given circle.
    pub fn hazard_hit(&self, active: ChunkCoord, center: Position, radius: f32) -> Option<&RemoteEntity> {
        self.visible(active)
            .filter(|e| e.kind == EntityKind::Hazard)
            .find(|e| e.position.distance(center) < e.radius + radius)
    }
}
