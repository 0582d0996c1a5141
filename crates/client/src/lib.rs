// World-sync and chunk-handoff engine for the pellet-maze client
// The engine is platform-free; browser bindings live in `web` (wasm32 only)

// Module structure - each module handles a specific concern
pub mod chunk;     // Boundary detection, directory lookups, connection handoff
pub mod config;    // TOML configuration with per-field defaults
pub mod entities;  // Remote players, hazards and droppers
pub mod error;     // Lookup / connect / transition / config errors
pub mod game;      // Per-tick driver and inbound dispatch
pub mod grid;      // Wall boxes and pellet seeds for one chunk
pub mod input;     // Keyboard direction state
pub mod motion;    // Local-player prediction with wall sliding
pub mod network;   // Connection seams and the inbound queue
pub mod pellets;   // Pellet ledger of the active chunk
pub mod session;   // Local player, session and persistence
pub mod utils;     // Helper functions, LERP, math utilities

#[cfg(target_arch = "wasm32")]
mod web;

pub use chunk::{Backends, ChunkSessionManager, ChunkState, Transition, World};
pub use config::Config;
pub use game::{GameLoop, View};
pub use session::{Identity, LocalPlayer, MemoryStore, SavedSession, Session, SessionStore};

#[cfg(target_arch = "wasm32")]
pub use web::ChunkClient;
