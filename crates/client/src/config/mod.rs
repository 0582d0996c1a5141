//! Client configuration.

use protocol::{ChunkCoord, ChunkExtent};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub pellets: PelletConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

impl Config {
    /// Parse from TOML. Missing sections and fields fall back to defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> String {
        // Every field is a plain scalar or table, serialization cannot fail.
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.world;
        if w.tile_size <= 0.0 || w.chunk_width <= 0.0 || w.chunk_height <= 0.0 {
            return Err(ConfigError::Invalid("world dimensions must be positive".into()));
        }
        if w.extent_width <= 0 || w.extent_height <= 0 {
            return Err(ConfigError::Invalid("chunk grid extent must be positive".into()));
        }
        if !self.world.extent().contains(w.spawn_chunk) {
            return Err(ConfigError::Invalid(format!(
                "spawn chunk {} lies outside the {}x{} chunk grid",
                w.spawn_chunk, w.extent_width, w.extent_height
            )));
        }
        // A step longer than a wall would let the player tunnel through it.
        if self.motion.speed <= 0.0 || self.motion.speed >= w.tile_size {
            return Err(ConfigError::Invalid(format!(
                "motion.speed must be in (0, {})",
                w.tile_size
            )));
        }
        if self.remote.smoothing <= 0.0 || self.remote.max_frame_dt <= 0.0 {
            return Err(ConfigError::Invalid("remote smoothing and max_frame_dt must be positive".into()));
        }
        if self.network.lookup_retry_ms < 0.0 || self.network.handoff_settle_ms < 0.0 {
            return Err(ConfigError::Invalid("network timings must not be negative".into()));
        }
        Ok(())
    }
}

/// Chunk geometry and the chunk grid.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    /// Local bounds of one chunk, in world units.
    #[serde(default = "default_chunk_size")]
    pub chunk_width: f32,
    #[serde(default = "default_chunk_size")]
    pub chunk_height: f32,
    /// Edge length of one map tile.
    #[serde(default = "default_tile_size")]
    pub tile_size: f32,
    /// Number of chunks per axis.
    #[serde(default = "default_extent")]
    pub extent_width: i32,
    #[serde(default = "default_extent")]
    pub extent_height: i32,
    /// Chunk used when no saved session exists.
    #[serde(default)]
    pub spawn_chunk: ChunkCoord,
}

impl WorldConfig {
    pub fn extent(&self) -> ChunkExtent {
        ChunkExtent::new(self.extent_width, self.extent_height)
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_width: default_chunk_size(),
            chunk_height: default_chunk_size(),
            tile_size: default_tile_size(),
            extent_width: default_extent(),
            extent_height: default_extent(),
            spawn_chunk: ChunkCoord::default(),
        }
    }
}

fn default_chunk_size() -> f32 {
    650.0
}
fn default_tile_size() -> f32 {
    40.0
}
fn default_extent() -> i32 {
    4
}

/// Local player motion.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MotionConfig {
    /// Distance moved per tick while a direction is held.
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_player_radius")]
    pub player_radius: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            player_radius: default_player_radius(),
        }
    }
}

fn default_speed() -> f32 {
    5.0
}
fn default_player_radius() -> f32 {
    15.0
}

/// Pellet geometry and reward.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PelletConfig {
    #[serde(default = "default_pellet_radius")]
    pub radius: f32,
    #[serde(default = "default_pellet_score")]
    pub score: u32,
}

impl Default for PelletConfig {
    fn default() -> Self {
        Self {
            radius: default_pellet_radius(),
            score: default_pellet_score(),
        }
    }
}

fn default_pellet_radius() -> f32 {
    3.0
}
fn default_pellet_score() -> u32 {
    10
}

/// Remote entity interpolation and liveness.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// Corrections longer than this are applied as a teleport.
    #[serde(default = "default_snap_threshold")]
    pub snap_threshold: f32,
    /// Fraction of the remaining gap closed per second.
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// Upper bound on one tick's delta-time, in seconds.
    #[serde(default = "default_max_frame_dt")]
    pub max_frame_dt: f32,
    /// Liveness window in milliseconds.
    #[serde(default = "default_liveness_ms")]
    pub liveness_ms: f64,
    #[serde(default = "default_entity_radius")]
    pub entity_radius: f32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            snap_threshold: default_snap_threshold(),
            smoothing: default_smoothing(),
            max_frame_dt: default_max_frame_dt(),
            liveness_ms: default_liveness_ms(),
            entity_radius: default_entity_radius(),
        }
    }
}

fn default_snap_threshold() -> f32 {
    100.0
}
fn default_smoothing() -> f32 {
    10.0
}
fn default_max_frame_dt() -> f32 {
    0.1
}
fn default_liveness_ms() -> f64 {
    5000.0
}
fn default_entity_radius() -> f32 {
    15.0
}

/// Directory endpoint and outbound throttling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Base URL of the directory (central) service.
    #[serde(default = "default_directory_url")]
    pub directory_url: String,
    /// Minimum movement before an out-of-interval state update is sent.
    #[serde(default = "default_send_min_delta")]
    pub send_min_delta: f32,
    /// A state update is sent at least this often, in milliseconds.
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: f64,
    /// Wait before retrying a failed directory/map lookup or connect.
    #[serde(default = "default_lookup_retry_ms")]
    pub lookup_retry_ms: f64,
    /// After a same-server chunk move, snapshot `eatenPellets` are ignored
    /// for this long, in milliseconds. The server may still be reporting
    /// the previous chunk's removals.
    #[serde(default = "default_handoff_settle_ms")]
    pub handoff_settle_ms: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            directory_url: default_directory_url(),
            send_min_delta: default_send_min_delta(),
            send_interval_ms: default_send_interval_ms(),
            lookup_retry_ms: default_lookup_retry_ms(),
            handoff_settle_ms: default_handoff_settle_ms(),
        }
    }
}

fn default_directory_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_send_min_delta() -> f32 {
    1.0
}
fn default_send_interval_ms() -> f64 {
    50.0
}
fn default_lookup_retry_ms() -> f64 {
    250.0
}
fn default_handoff_settle_ms() -> f64 {
    250.0
}

/// Lives and respawn.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_lives")]
    pub lives: u32,
    /// Chunk-local spawn / respawn point.
    #[serde(default = "default_spawn")]
    pub spawn_x: f32,
    #[serde(default = "default_spawn")]
    pub spawn_y: f32,
    /// Hazard contact is ignored for this long after a respawn.
    #[serde(default = "default_respawn_grace_ms")]
    pub respawn_grace_ms: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            lives: default_lives(),
            spawn_x: default_spawn(),
            spawn_y: default_spawn(),
            respawn_grace_ms: default_respawn_grace_ms(),
        }
    }
}

fn default_lives() -> u32 {
    3
}
fn default_spawn() -> f32 {
    60.0
}
fn default_respawn_grace_ms() -> f64 {
    1500.0
}
