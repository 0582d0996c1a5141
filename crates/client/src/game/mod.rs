// Per-tick driver: inbound dispatch, motion, chunk handoff, pellets, remotes
use glam::Vec2;
use protocol::messages::{
    ClientMessage, PelletEaten, PlayerSnapshot, PlayerStatus, ServerEvent, ServerMessage, Snapshot,
};
use protocol::{ChunkCoord, ChunkExtent, Vector};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::chunk::{Backends, ChunkSessionManager, ChunkState, World};
use crate::config::Config;
use crate::entities::{EntityKind, RemoteEntityReconciler};
use crate::input::InputState;
use crate::motion::LocalMotionController;
use crate::network::{Inbound, InboundQueue, send_message};
use crate::pellets::PelletLedger;
use crate::session::{Identity, LocalPlayer, Session, SessionStore};
use crate::utils::elapsed_ms;

enum Phase {
    /// No map or connection yet.
    Joining(LocalPlayer),
    Playing { session: Session, world: World },
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    OutOfLives,
}

/// Drives one client. Call [`GameLoop::tick`] once per frame.
pub struct GameLoop {
    config: Config,
    backends: Backends,
    store: Box<dyn SessionStore>,
    input: InputState,
    motion: LocalMotionController,
    remotes: RemoteEntityReconciler,
    chunks: ChunkSessionManager,
    queue: InboundQueue,
    phase: Phase,
    last_tick: Option<f64>,
    /// Position and time of the last state update sent.
    last_sent: Option<(Vec2, f64)>,
    invulnerable_until: f64,
    /// Snapshot `eatenPellets` are ignored until then.
    settle_until: f64,
}

impl GameLoop {
    /// Resume the stored session if there is a usable one, otherwise start
    /// fresh at the configured spawn chunk.
    pub fn new(config: Config, backends: Backends, store: Box<dyn SessionStore>, fresh: Identity) -> Self {
        let extent = config.world.extent();
        let spawn = Vec2::new(config.player.spawn_x, config.player.spawn_y);
        let (id, color, score, chunk) = match store.load() {
            Some(saved) if extent.contains(saved.chunk()) => {
                info!("Resuming session {} in chunk {}", saved.id, saved.chunk());
                let chunk = saved.chunk();
                (saved.id, saved.color, saved.score, chunk)
            }
            Some(saved) => {
                warn!("Saved chunk {} lies outside the world, starting over", saved.chunk());
                (fresh.id, fresh.color, 0, config.world.spawn_chunk)
            }
            None => (fresh.id, fresh.color, 0, config.world.spawn_chunk),
        };

        let player = LocalPlayer {
            id,
            position: spawn,
            velocity: Vec2::ZERO,
            radius: config.motion.player_radius,
            color,
            score,
            lives: config.player.lives,
            chunk,
        };

        Self {
            motion: LocalMotionController::new(config.motion.speed, config.motion.player_radius),
            remotes: RemoteEntityReconciler::new(&config.remote),
            chunks: ChunkSessionManager::new(&config),
            input: InputState::new(),
            queue: InboundQueue::new(),
            phase: Phase::Joining(player),
            last_tick: None,
            last_sent: None,
            invulnerable_until: 0.0,
            settle_until: 0.0,
            config,
            backends,
            store,
        }
    }

    pub fn tick(&mut self, now: f64) {
        let dt = self
            .last_tick
            .map_or(0.0, |last| (elapsed_ms(now, last) / 1000.0) as f32);
        self.last_tick = Some(now);

        match self.phase {
            Phase::Over => {}
            Phase::Joining(_) => self.join(now),
            Phase::Playing { .. } => {
                if self.play(now, dt) == Flow::OutOfLives {
                    info!("Out of lives");
                    self.end(true);
                }
            }
        }
    }

    /// Leave the world: best-effort `player_leaving`, then close. The saved
    /// session is kept so the next start resumes it.
    pub fn shutdown(&mut self) {
        self.end(false);
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::Over)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.phase, Phase::Playing { .. })
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn player(&self) -> Option<&LocalPlayer> {
        match &self.phase {
            Phase::Joining(player) => Some(player),
            Phase::Playing { session, .. } => Some(&session.player),
            Phase::Over => None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.phase {
            Phase::Playing { session, .. } => Some(session),
            _ => None,
        }
    }

    pub fn world(&self) -> Option<&World> {
        match &self.phase {
            Phase::Playing { world, .. } => Some(world),
            _ => None,
        }
    }

    pub fn remotes(&self) -> &RemoteEntityReconciler {
        &self.remotes
    }

    pub fn chunk_state(&self) -> ChunkState {
        self.chunks.state()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Everything a renderer needs for the current frame.
    pub fn view(&self) -> Option<View> {
        let Phase::Playing { session, world } = &self.phase else {
            return None;
        };
        let player = &session.player;
        Some(View {
            chunk: player.chunk,
            player: EntityView {
                id: player.id.clone(),
                kind: "local",
                position: player.position.into(),
                radius: player.radius,
                color: Some(player.color.to_string()),
                score: Some(player.score),
            },
            lives: player.lives,
            entities: self
                .remotes
                .visible(player.chunk)
                .map(|e| {
                    let (color, score) = match &e.kind {
                        EntityKind::Player { color, score } => (color.map(|c| c.to_string()), Some(*score)),
                        _ => (None, None),
                    };
                    EntityView {
                        id: e.id.clone(),
                        kind: e.kind.label(),
                        position: e.position.into(),
                        radius: e.radius,
                        color,
                        score,
                    }
                })
                .collect(),
            pellets: world.ledger.iter().map(|p| p.position.into()).collect(),
            walls: world
                .grid
                .walls()
                .iter()
                .map(|w| [w.min.x, w.min.y, w.max.x - w.min.x, w.max.y - w.min.y])
                .collect(),
        })
    }

    fn join(&mut self, now: f64) {
        let Phase::Joining(player) = &self.phase else {
            return;
        };
        match self.chunks.bootstrap(player, &mut self.backends, &self.config, now) {
            Ok((address, connection, world)) => {
                let mut session = Session {
                    player: player.clone(),
                    address,
                    connection,
                };
                self.remotes.clear();
                announce(&mut session);
                self.last_sent = Some((session.player.position, now));
                self.store.save(&session.player.saved());
                self.phase = Phase::Playing { session, world };
            }
            Err(e) if e.is_pending() => trace!("Join pending: {}", e),
            Err(e) => debug!("Join attempt failed: {}", e),
        }
    }

    fn play(&mut self, now: f64, dt: f32) -> Flow {
        let Phase::Playing { session, world } = &mut self.phase else {
            return Flow::Continue;
        };
        let extent = self.chunks.extent();

        // The current world stays valid until a handoff commits, so frames
        // only wait in the queue across the swap itself.
        self.queue
            .take_from(session.connection.as_mut(), session.player.chunk);
        let mut dispatch = Dispatch {
            remotes: &mut self.remotes,
            ledger: &mut world.ledger,
            extent,
            self_id: &session.player.id,
            now,
            skip_eaten: now < self.settle_until,
        };
        dispatch.flush(&mut self.queue);

        session.player.velocity =
            self.motion
                .advance(&world.grid, &mut session.player.position, self.input.intent());

        match self.chunks.update(
            session,
            world,
            &mut self.queue,
            &mut self.backends,
            &self.config,
            now,
        ) {
            Ok(Some(transition)) => {
                if transition.is_same_server_move() {
                    self.settle_until = now + self.config.network.handoff_settle_ms;
                }
                let mut dispatch = Dispatch {
                    remotes: &mut self.remotes,
                    ledger: &mut world.ledger,
                    extent,
                    self_id: &session.player.id,
                    now,
                    skip_eaten: now < self.settle_until,
                };
                dispatch.flush(&mut self.queue);
                announce(session);
                self.last_sent = Some((session.player.position, now));
                self.store.save(&session.player.saved());
            }
            Ok(None) => {}
            Err(e) if e.is_pending() => trace!("Transition pending: {}", e),
            Err(e) => debug!("Transition will be retried: {}", e),
        }

        if self.chunks.is_stable() {
            let player = &mut session.player;
            if let Some(pellet) = world.ledger.local_consume(player.position, player.radius) {
                player.score += self.config.pellets.score;
                debug!("Ate {} (score {})", pellet.id, player.score);
                let notice = ClientMessage::Pellet(PelletEaten {
                    pellet_id: pellet.id,
                    id: player.id.clone(),
                    score: player.score,
                    location: player.chunk,
                });
                send_message(session.connection.as_mut(), &notice);
                self.store.save(&session.player.saved());
            }
        }

        if now >= self.invulnerable_until {
            let player = &session.player;
            let hit = self
                .remotes
                .hazard_hit(player.chunk, player.position, player.radius)
                .map(|h| h.id.clone());
            if let Some(hazard) = hit {
                let player = &mut session.player;
                player.lives = player.lives.saturating_sub(1);
                info!("Caught by {} ({} lives left)", hazard, player.lives);
                let collision = ClientMessage::GhostCollision(player.ghost_collision());
                send_message(session.connection.as_mut(), &collision);
                if session.player.lives == 0 {
                    return Flow::OutOfLives;
                }
                session.player.position = Vec2::new(self.config.player.spawn_x, self.config.player.spawn_y);
                session.player.velocity = Vec2::ZERO;
                self.invulnerable_until = now + self.config.player.respawn_grace_ms;
                announce(session);
                self.last_sent = Some((session.player.position, now));
            }
        }

        self.remotes.evict_stale(now, self.config.remote.liveness_ms);
        self.remotes.tick(dt, session.player.chunk);

        let due = match self.last_sent {
            None => true,
            Some((position, at)) => {
                position.distance(session.player.position) >= self.config.network.send_min_delta
                    || elapsed_ms(now, at) >= self.config.network.send_interval_ms
            }
        };
        if due {
            announce(session);
            self.last_sent = Some((session.player.position, now));
        }
        Flow::Continue
    }

    /// Terminal transition. `clear_store` is set when the player is out of
    /// lives.
    fn end(&mut self, clear_store: bool) {
        let phase = std::mem::replace(&mut self.phase, Phase::Over);
        if let Phase::Playing { mut session, .. } = phase {
            let leaving = ClientMessage::PlayerLeaving(
                session.player.state(Some(PlayerStatus::Left)),
            );
            send_message(session.connection.as_mut(), &leaving);
            session.connection.close();
            info!("Left chunk {} with score {}", session.player.chunk, session.player.score);
        }
        if clear_store {
            self.store.clear();
        }
        self.remotes.clear();
    }
}

/// Full player-state update.
fn announce(session: &mut Session) {
    let state = ClientMessage::Player(session.player.state(Some(PlayerStatus::Active)));
    send_message(session.connection.as_mut(), &state);
}

/// Routes parsed inbound frames to the reconciler and the pellet ledger.
struct Dispatch<'a> {
    remotes: &'a mut RemoteEntityReconciler,
    ledger: &'a mut PelletLedger,
    extent: ChunkExtent,
    self_id: &'a str,
    now: f64,
    /// Right after a same-server move the server may still attribute
    /// removals to the chunk we left.
    skip_eaten: bool,
}

impl Dispatch<'_> {
    fn flush(&mut self, queue: &mut InboundQueue) {
        for inbound in queue.drain() {
            self.handle(inbound);
        }
    }

    fn handle(&mut self, inbound: Inbound) {
        match ServerMessage::parse(&inbound.text) {
            Ok(ServerMessage::Snapshot(snapshot)) => self.snapshot(snapshot, inbound.origin),
            Ok(ServerMessage::Event(event)) => self.event(event),
            Err(e) => warn!("Dropping unreadable frame from {}: {}", inbound.origin, e),
        }
    }

    fn snapshot(&mut self, snapshot: Snapshot, origin: ChunkCoord) {
        for (id, p) in snapshot.players {
            self.player(&id, &p);
        }

        for (id, ghost) in snapshot.ghosts {
            let chunk = self.extent.coord_of_id(&id).unwrap_or(origin);
            self.remotes.apply_snapshot(
                &id,
                ghost.position.into(),
                ghost.velocity.into(),
                EntityKind::Hazard,
                chunk,
                self.now,
            );
        }

        for (id, dropper) in snapshot.droppers {
            let chunk = dropper
                .location
                .or_else(|| self.extent.coord_of_id(&id).ok())
                .unwrap_or(origin);
            self.remotes.apply_snapshot(
                &id,
                dropper.position.into(),
                dropper.velocity.into(),
                EntityKind::Dropper,
                chunk,
                self.now,
            );
        }

        if self.skip_eaten {
            if !snapshot.eaten_pellets.is_empty() {
                trace!("Ignoring {} eaten pellets while settling", snapshot.eaten_pellets.len());
            }
        } else {
            for id in &snapshot.eaten_pellets {
                self.ledger.confirm_removal(origin, id);
            }
        }

        for restored in snapshot.restored_pellets.values() {
            match self.extent.coord_of(restored.map_index) {
                Ok(chunk) => {
                    if self.ledger.restore(chunk, restored.position.into()) {
                        trace!("Pellet restored at {:?}", restored.position);
                    }
                }
                Err(e) => debug!("Ignoring restored pellet: {}", e),
            }
        }
    }

    fn event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Player(p) => {
                let id = p.id.clone();
                self.player(&id, &p);
            }
            ServerEvent::Pellet(eaten) => {
                self.ledger.confirm_removal(eaten.location, &eaten.pellet_id);
            }
            ServerEvent::Disconnect(d) | ServerEvent::PlayerLeaving(d) => {
                if self.remotes.remove(&d.id).is_some() {
                    debug!("Player {} left", d.id);
                }
            }
        }
    }

    fn player(&mut self, id: &str, p: &PlayerSnapshot) {
        if id.is_empty() || id == self.self_id {
            return;
        }
        if p.has_left() {
            self.remotes.remove(id);
            return;
        }
        self.remotes.apply_snapshot(
            id,
            p.position.into(),
            p.velocity.into(),
            EntityKind::Player {
                color: p.color,
                score: p.score,
            },
            p.location,
            self.now,
        );
    }
}

/// Serializable frame for renderers.
#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub chunk: ChunkCoord,
    pub player: EntityView,
    pub lives: u32,
    pub entities: Vec<EntityView>,
    pub pellets: Vec<Vector>,
    /// `[x, y, width, height]` per wall box.
    pub walls: Vec<[f32; 4]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityView {
    pub id: String,
    pub kind: &'static str,
    pub position: Vector,
    pub radius: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}
