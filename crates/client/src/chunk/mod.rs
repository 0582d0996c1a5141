//! Chunk-boundary detection and connection handoff.
//!
//! A transition either commits completely (position wrapped, chunk,
//! address, connection, grid and pellets all replaced together) or
//! leaves everything as it was so the next tick can retry. A new
//! server's connection must report open before anything is replaced.

use glam::Vec2;
use protocol::messages::{ClientMessage, PlayerStatus};
use protocol::{ChunkCoord, ChunkExtent, MapData};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ConnectError, TransitionError};
use crate::grid::TileGrid;
use crate::network::{Connection, Directory, InboundQueue, LinkState, MapSource, Transport, send_message};
use crate::pellets::PelletLedger;
use crate::session::{LocalPlayer, Session};
use crate::utils::clamp;

/// Grid and pellets of the active chunk. Always replaced as a pair.
#[derive(Debug, Clone)]
pub struct World {
    pub grid: TileGrid,
    pub ledger: PelletLedger,
}

impl World {
    pub fn build(source: ChunkCoord, map: &MapData, config: &Config) -> Self {
        let grid = TileGrid::build(source, map, config.world.tile_size);
        let mut ledger = PelletLedger::new(source, config.world.tile_size, config.pellets.radius);
        ledger.seed(source, grid.pellet_seeds());
        Self { grid, ledger }
    }

    pub fn source(&self) -> ChunkCoord {
        self.grid.source()
    }
}

/// The network side a transition needs.
pub struct Backends {
    pub directory: Box<dyn Directory>,
    pub maps: Box<dyn MapSource>,
    pub transport: Box<dyn Transport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Stable,
    /// Out of bounds; waiting on the directory, the map or a connect.
    Resolving { target: ChunkCoord },
    /// The new server's connection is handshaking. The old connection and
    /// world stay live until it opens.
    Migrating { target: ChunkCoord },
    /// The current connection dropped; looking the chunk's server up again.
    Reconnecting,
}

/// A committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ChunkCoord,
    pub to: ChunkCoord,
    /// A new connection was opened.
    pub reconnected: bool,
}

impl Transition {
    /// Same chunk server, different chunk.
    pub fn is_same_server_move(&self) -> bool {
        !self.reconnected && self.from != self.to
    }
}

/// Which neighbor a chunk-local position has walked into. X is checked
/// before Y; at most one axis is reported.
pub fn crossing(position: Vec2, bounds: Vec2) -> Option<(i32, i32)> {
    if position.x < 0.0 {
        Some((-1, 0))
    } else if position.x >= bounds.x {
        Some((1, 0))
    } else if position.y < 0.0 {
        Some((0, -1))
    } else if position.y >= bounds.y {
        Some((0, 1))
    } else {
        None
    }
}

/// Gap kept between a committed position and the far edge, and the
/// distance a held player may sit past the near edge.
const EDGE: f32 = 1e-3;

/// A connection that has been opened but has not reported open yet.
struct PendingLink {
    target: ChunkCoord,
    address: String,
    map: MapData,
    connection: Box<dyn Connection>,
}

/// Everything a committed move installs.
struct Arrival {
    target: ChunkCoord,
    address: String,
    map: MapData,
    /// `None` when the current connection already serves the target.
    connection: Option<Box<dyn Connection>>,
}

impl From<PendingLink> for Arrival {
    fn from(link: PendingLink) -> Self {
        Self {
            target: link.target,
            address: link.address,
            map: link.map,
            connection: Some(link.connection),
        }
    }
}

/// What a successful lookup produced.
enum Resolved {
    /// The target lives on the server we are already connected to.
    Same { address: String, map: MapData },
    Fresh(PendingLink),
}

pub struct ChunkSessionManager {
    state: ChunkState,
    extent: ChunkExtent,
    bounds: Vec2,
    retry_ms: f64,
    next_attempt: f64,
    pending: Option<PendingLink>,
}

impl ChunkSessionManager {
    pub fn new(config: &Config) -> Self {
        Self {
            state: ChunkState::Stable,
            extent: config.world.extent(),
            bounds: Vec2::new(config.world.chunk_width, config.world.chunk_height),
            retry_ms: config.network.lookup_retry_ms,
            next_attempt: 0.0,
            pending: None,
        }
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn is_stable(&self) -> bool {
        self.state == ChunkState::Stable
    }

    pub fn extent(&self) -> ChunkExtent {
        self.extent
    }

    /// First connection for a new or resumed player. Returns only once the
    /// connection reports open.
    pub fn bootstrap(
        &mut self,
        player: &LocalPlayer,
        backends: &mut Backends,
        config: &Config,
        now: f64,
    ) -> Result<(String, Box<dyn Connection>, World), TransitionError> {
        if self.pending.is_none() {
            if now < self.next_attempt {
                return Err(TransitionError::Deferred);
            }
            match self.open(player.chunk, backends) {
                Ok(link) => self.pending = Some(link),
                Err(e) => {
                    self.note_failure(&e, now);
                    return Err(e);
                }
            }
        }
        let Some(link) = self.settle(backends, now)? else {
            return Err(TransitionError::Deferred);
        };
        info!("Joined chunk {} at {}", player.chunk, link.address);
        let world = World::build(player.chunk, &link.map, config);
        Ok((link.address, link.connection, world))
    }

    /// Run the boundary check for this tick and, if the player is out of
    /// bounds, try to move the session to the neighboring chunk. Also
    /// replaces a connection that dropped while the player stayed put.
    ///
    /// Until a move commits the player is held on the crossed edge and the
    /// old connection and world stay in use. Frames still held by a
    /// replaced connection are moved into `queue` before it closes.
    pub fn update(
        &mut self,
        session: &mut Session,
        world: &mut World,
        queue: &mut InboundQueue,
        backends: &mut Backends,
        config: &Config,
        now: f64,
    ) -> Result<Option<Transition>, TransitionError> {
        let position = session.player.position;
        let from = session.chunk();
        let (dx, dy) = match crossing(position, self.bounds) {
            Some((dx, dy)) if self.extent.contains(from.offset(dx, dy)) => (dx, dy),
            Some(_) => {
                // World edge: behaves like a wall.
                session.player.position = self.clamp_inside(position);
                return self.stay(session, queue, backends, now);
            }
            None => return self.stay(session, queue, backends, now),
        };
        let target = from.offset(dx, dy);

        let heading = matches!(
            self.state,
            ChunkState::Resolving { target: t } | ChunkState::Migrating { target: t } if t == target
        );
        if !heading {
            debug!("Leaving chunk {} toward {}", from, target);
            self.abandon();
            self.state = ChunkState::Resolving { target };
            self.next_attempt = 0.0;
        }

        if self.pending.is_none() {
            if now < self.next_attempt {
                self.hold(session, dx, dy);
                return Err(TransitionError::Deferred);
            }
            let current = session
                .connection
                .is_open()
                .then_some(session.address.as_str());
            match self.resolve(target, current, backends) {
                Ok(Resolved::Same { address, map }) => {
                    let arrival = Arrival {
                        target,
                        address,
                        map,
                        connection: None,
                    };
                    return Ok(Some(self.commit(session, world, queue, config, arrival)));
                }
                Ok(Resolved::Fresh(link)) => {
                    debug!("Waiting for {} to open", link.address);
                    self.pending = Some(link);
                    self.state = ChunkState::Migrating { target };
                }
                Err(e) => {
                    self.note_failure(&e, now);
                    self.hold(session, dx, dy);
                    return Err(e);
                }
            }
        }

        match self.settle(backends, now) {
            Ok(Some(link)) => Ok(Some(self.commit(session, world, queue, config, link.into()))),
            Ok(None) => Ok(None),
            Err(e) => {
                if !e.is_pending() {
                    self.state = ChunkState::Resolving { target };
                }
                self.hold(session, dx, dy);
                Err(e)
            }
        }
    }

    /// The player is inside the active chunk (or against the world edge).
    fn stay(
        &mut self,
        session: &mut Session,
        queue: &mut InboundQueue,
        backends: &mut Backends,
        now: f64,
    ) -> Result<Option<Transition>, TransitionError> {
        if let ChunkState::Resolving { target } | ChunkState::Migrating { target } = self.state {
            debug!("Back inside {}, abandoning move to {}", session.chunk(), target);
            self.abandon();
            self.state = ChunkState::Stable;
        }
        if self.state == ChunkState::Reconnecting || !session.connection.is_open() {
            return self.reconnect(session, queue, backends, now);
        }
        Ok(None)
    }

    /// Swap a dropped connection for a fresh one to the same chunk. The
    /// world is kept.
    fn reconnect(
        &mut self,
        session: &mut Session,
        queue: &mut InboundQueue,
        backends: &mut Backends,
        now: f64,
    ) -> Result<Option<Transition>, TransitionError> {
        let chunk = session.chunk();
        if self.state != ChunkState::Reconnecting {
            warn!("Lost connection to {} for chunk {}", session.address, chunk);
            self.state = ChunkState::Reconnecting;
            self.next_attempt = 0.0;
            // The chunk may have been handed to another server.
            backends.directory.forget(chunk);
        }

        if self.pending.is_none() {
            if now < self.next_attempt {
                return Err(TransitionError::Deferred);
            }
            match self.open(chunk, backends) {
                Ok(link) => self.pending = Some(link),
                Err(e) => {
                    self.note_failure(&e, now);
                    return Err(e);
                }
            }
        }
        let Some(link) = self.settle(backends, now)? else {
            return Ok(None);
        };

        queue.take_from(session.connection.as_mut(), chunk);
        let mut old = std::mem::replace(&mut session.connection, link.connection);
        old.close();
        info!("Reconnected chunk {} via {}", chunk, link.address);
        session.address = link.address;
        self.state = ChunkState::Stable;
        Ok(Some(Transition {
            from: chunk,
            to: chunk,
            reconnected: true,
        }))
    }

    /// Replace position, chunk, world and (for a new server) connection in
    /// one step.
    fn commit(
        &mut self,
        session: &mut Session,
        world: &mut World,
        queue: &mut InboundQueue,
        config: &Config,
        arrival: Arrival,
    ) -> Transition {
        let from = session.chunk();
        let Arrival {
            target,
            address,
            map,
            connection,
        } = arrival;

        let reconnected = connection.is_some();
        if let Some(connection) = connection {
            let mut old = std::mem::replace(&mut session.connection, connection);
            let leaving = ClientMessage::PlayerLeaving(session.player.state(Some(PlayerStatus::Left)));
            send_message(old.as_mut(), &leaving);
            queue.take_from(old.as_mut(), from);
            old.close();
            session.address = address.clone();
        } else {
            // Whatever the server has sent so far was built for the old chunk.
            queue.take_from(session.connection.as_mut(), from);
        }

        let (dx, dy) = (target.x - from.x, target.y - from.y);
        session.player.position = self.clamp_inside(self.wrap(session.player.position, dx, dy));
        session.player.chunk = target;
        *world = World::build(target, &map, config);
        self.state = ChunkState::Stable;

        info!(
            "Moved from chunk {} to {} ({}, {})",
            from,
            target,
            address,
            if reconnected { "reconnected" } else { "same server" }
        );
        Transition {
            from,
            to: target,
            reconnected,
        }
    }

    /// Directory, map, then (unless `current` already serves the target)
    /// connect. Nothing is committed here.
    fn resolve(
        &self,
        target: ChunkCoord,
        current: Option<&str>,
        backends: &mut Backends,
    ) -> Result<Resolved, TransitionError> {
        let (address, map) = self.lookup(target, backends)?;
        if current == Some(address.as_str()) {
            return Ok(Resolved::Same { address, map });
        }
        self.connect(target, address, map, backends).map(Resolved::Fresh)
    }

    fn open(&self, coord: ChunkCoord, backends: &mut Backends) -> Result<PendingLink, TransitionError> {
        let (address, map) = self.lookup(coord, backends)?;
        self.connect(coord, address, map, backends)
    }

    fn lookup(&self, coord: ChunkCoord, backends: &mut Backends) -> Result<(String, MapData), TransitionError> {
        let address = backends
            .directory
            .resolve(coord)
            .map_err(TransitionError::Directory)?;
        let map = backends
            .maps
            .load(&address, coord)
            .map_err(TransitionError::Map)?;
        Ok((address, map))
    }

    fn connect(
        &self,
        coord: ChunkCoord,
        address: String,
        map: MapData,
        backends: &mut Backends,
    ) -> Result<PendingLink, TransitionError> {
        let connection = backends.transport.connect(&address).inspect_err(|_| {
            // The directory may have moved the chunk; ask again next time.
            backends.directory.forget(coord);
        })?;
        Ok(PendingLink {
            target: coord,
            address,
            map,
            connection,
        })
    }

    /// Check on the pending connection. Hands it back once it is open; drops
    /// it and backs off if it closed first.
    fn settle(&mut self, backends: &mut Backends, now: f64) -> Result<Option<PendingLink>, TransitionError> {
        let Some(link) = self.pending.take() else {
            return Ok(None);
        };
        match link.connection.state() {
            LinkState::Open => Ok(Some(link)),
            LinkState::Connecting => {
                let error = TransitionError::Connecting(link.address.clone());
                self.pending = Some(link);
                Err(error)
            }
            LinkState::Closed => {
                backends.directory.forget(link.target);
                let error = TransitionError::from(ConnectError::new(&link.address, "closed before opening"));
                self.note_failure(&error, now);
                Err(error)
            }
        }
    }

    fn abandon(&mut self) {
        if let Some(mut link) = self.pending.take() {
            debug!("Dropping unopened connection to {}", link.address);
            link.connection.close();
        }
    }

    fn note_failure(&mut self, error: &TransitionError, now: f64) {
        if error.is_pending() {
            return;
        }
        warn!("Chunk transition failed: {}", error);
        self.next_attempt = now + self.retry_ms;
    }

    /// Keep the player on the crossed edge while a move is pending.
    fn hold(&self, session: &mut Session, dx: i32, dy: i32) {
        let position = session.player.position;
        let inside = self.clamp_inside(position);
        let pin = |value: f32, step: i32, limit: f32, clamped: f32| match step {
            -1 => value.max(-EDGE),
            1 => value.min(limit),
            _ => clamped,
        };
        session.player.position = Vec2::new(
            pin(position.x, dx, self.bounds.x, inside.x),
            pin(position.y, dy, self.bounds.y, inside.y),
        );
    }

    fn wrap(&self, position: Vec2, dx: i32, dy: i32) -> Vec2 {
        Vec2::new(
            position.x - dx as f32 * self.bounds.x,
            position.y - dy as f32 * self.bounds.y,
        )
    }

    fn clamp_inside(&self, position: Vec2) -> Vec2 {
        // Keep strictly below the far edge so the next check stays quiet.
        Vec2::new(
            clamp(position.x, 0.0, self.bounds.x - EDGE),
            clamp(position.y, 0.0, self.bounds.y - EDGE),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_checks_x_before_y() {
        let bounds = Vec2::new(650.0, 650.0);
        assert_eq!(crossing(Vec2::new(-1.0, -1.0), bounds), Some((-1, 0)));
        assert_eq!(crossing(Vec2::new(650.0, 700.0), bounds), Some((1, 0)));
        assert_eq!(crossing(Vec2::new(10.0, -0.5), bounds), Some((0, -1)));
        assert_eq!(crossing(Vec2::new(10.0, 650.0), bounds), Some((0, 1)));
        assert_eq!(crossing(Vec2::new(0.0, 649.9), bounds), None);
    }

    #[test]
    fn wrap_lands_on_opposite_edge() {
        let manager = ChunkSessionManager::new(&Config::default());
        assert_eq!(manager.wrap(Vec2::new(-1.0, 41.0), -1, 0), Vec2::new(649.0, 41.0));
        assert_eq!(manager.wrap(Vec2::new(300.0, 652.0), 0, 1), Vec2::new(300.0, 2.0));
    }

    #[test]
    fn clamp_keeps_position_inside() {
        let manager = ChunkSessionManager::new(&Config::default());
        let p = manager.clamp_inside(Vec2::new(-3.0, 651.0));
        assert_eq!(p.x, 0.0);
        assert!(p.y < 650.0);
        assert_eq!(crossing(p, manager.bounds), None);
    }

    struct Idle;

    impl Connection for Idle {
        fn send(&mut self, _text: String) {}
        fn drain(&mut self) -> Vec<String> {
            Vec::new()
        }
        fn close(&mut self) {}
        fn state(&self) -> LinkState {
            LinkState::Open
        }
    }

    fn session_at(x: f32, y: f32) -> Session {
        Session {
            player: LocalPlayer {
                id: "me".into(),
                position: Vec2::new(x, y),
                velocity: Vec2::ZERO,
                radius: 15.0,
                color: protocol::Color::new(0, 0, 0),
                score: 0,
                lives: 3,
                chunk: ChunkCoord::new(1, 1),
            },
            address: "a:9000".into(),
            connection: Box::new(Idle),
        }
    }

    #[test]
    fn hold_pins_only_the_crossed_axis() {
        let manager = ChunkSessionManager::new(&Config::default());

        let mut west = session_at(-1159.0, 700.0);
        manager.hold(&mut west, -1, 0);
        assert_eq!(west.player.position, Vec2::new(-EDGE, 650.0 - EDGE));
        assert_eq!(crossing(west.player.position, manager.bounds), Some((-1, 0)));
        // Wrapping from the held spot lands on the far edge of the neighbor.
        let landed = manager.clamp_inside(manager.wrap(west.player.position, -1, 0));
        assert!(landed.x > 649.9);

        let mut east = session_at(900.0, 10.0);
        manager.hold(&mut east, 1, 0);
        assert_eq!(east.player.position, Vec2::new(650.0, 10.0));

        let mut north = session_at(10.0, -40.0);
        manager.hold(&mut north, 0, -1);
        assert_eq!(north.player.position, Vec2::new(10.0, -EDGE));
    }

    #[test]
    fn same_server_move_is_distinguished_from_reconnect() {
        let a = ChunkCoord::new(0, 0);
        let b = ChunkCoord::new(1, 0);
        assert!(Transition { from: a, to: b, reconnected: false }.is_same_server_move());
        assert!(!Transition { from: a, to: b, reconnected: true }.is_same_server_move());
        assert!(!Transition { from: a, to: a, reconnected: true }.is_same_server_move());
    }
}
