//! In-memory directory, map source, transport and connection fakes.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use client::error::{ConnectError, LookupError};
use client::network::{Connection, Directory, LinkState, MapSource, Transport};
use client::{Backends, Config, GameLoop, Identity, MemoryStore};
use protocol::{ChunkCoord, Color, MapData};

/// What the fake directory answers for one lookup.
#[derive(Debug, Clone)]
pub enum Answer {
    Fail,
    Pending,
}

#[derive(Default)]
pub struct Net {
    pub addresses: HashMap<ChunkCoord, String>,
    pub maps: HashMap<ChunkCoord, MapData>,
    /// Answers consumed before the directory starts succeeding.
    pub directory_script: Vec<Answer>,
    pub refuse_connects: usize,
    /// New connections stay `Connecting` until a test opens or closes them.
    pub slow_handshake: bool,
    pub directory_calls: Vec<ChunkCoord>,
    pub connections: Vec<Rc<RefCell<Wire>>>,
    /// Frame an old server pushes back when it receives `player_leaving`.
    pub reply_to_leaving: Option<String>,
}

/// Both ends of one fake socket.
#[derive(Debug, Default)]
pub struct Wire {
    pub address: String,
    /// Sent while still connecting counts as buffered, like the real sockets.
    pub sent: Vec<String>,
    pub inbox: Vec<String>,
    pub opened: bool,
    /// Closed by either side, including a refused handshake.
    pub closed: bool,
    pub reply_to_leaving: Option<String>,
}

impl Wire {
    pub fn state(&self) -> LinkState {
        if self.closed {
            LinkState::Closed
        } else if self.opened {
            LinkState::Open
        } else {
            LinkState::Connecting
        }
    }

    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .iter()
            .map(|t| serde_json::from_str(t).expect("client sent invalid JSON"))
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

pub type SharedNet = Rc<RefCell<Net>>;

struct FakeDirectory(SharedNet);

impl Directory for FakeDirectory {
    fn resolve(&mut self, coord: ChunkCoord) -> Result<String, LookupError> {
        let mut net = self.0.borrow_mut();
        net.directory_calls.push(coord);
        if !net.directory_script.is_empty() {
            return match net.directory_script.remove(0) {
                Answer::Fail => Err(LookupError::failed(coord, "directory unavailable")),
                Answer::Pending => Err(LookupError::Pending(coord)),
            };
        }
        net.addresses
            .get(&coord)
            .cloned()
            .ok_or_else(|| LookupError::failed(coord, "no owner"))
    }
}

struct FakeMaps(SharedNet);

impl MapSource for FakeMaps {
    fn load(&mut self, _address: &str, coord: ChunkCoord) -> Result<MapData, LookupError> {
        let net = self.0.borrow();
        Ok(net.maps.get(&coord).cloned().unwrap_or_else(open_map))
    }
}

struct FakeTransport(SharedNet);

impl Transport for FakeTransport {
    fn connect(&mut self, address: &str) -> Result<Box<dyn Connection>, ConnectError> {
        let mut net = self.0.borrow_mut();
        if net.refuse_connects > 0 {
            net.refuse_connects -= 1;
            return Err(ConnectError::new(address, "connection refused"));
        }
        let wire = Rc::new(RefCell::new(Wire {
            address: address.to_string(),
            opened: !net.slow_handshake,
            reply_to_leaving: net.reply_to_leaving.clone(),
            ..Wire::default()
        }));
        net.connections.push(wire.clone());
        Ok(Box::new(FakeConnection(wire)))
    }
}

struct FakeConnection(Rc<RefCell<Wire>>);

impl Connection for FakeConnection {
    fn send(&mut self, text: String) {
        let mut wire = self.0.borrow_mut();
        if wire.closed {
            return;
        }
        if text.contains("\"player_leaving\"") {
            if let Some(reply) = wire.reply_to_leaving.take() {
                wire.inbox.push(reply);
            }
        }
        wire.sent.push(text);
    }

    fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.0.borrow_mut().inbox)
    }

    fn close(&mut self) {
        self.0.borrow_mut().closed = true;
    }

    fn state(&self) -> LinkState {
        self.0.borrow().state()
    }
}

/// 16x16 with no walls and a pellet in every cell.
pub fn open_map() -> MapData {
    vec![vec!["0".to_string(); 16]; 16]
}

/// Builds map data from compact rows such as `"1101"`.
pub fn map_from_rows(rows: &[&str]) -> MapData {
    rows.iter()
        .map(|r| r.chars().map(|c| c.to_string()).collect())
        .collect()
}

pub struct Harness {
    pub net: SharedNet,
    pub store: MemoryStore,
    pub game: GameLoop,
    pub now: f64,
}

impl Harness {
    pub fn new(config: Config, store: MemoryStore, setup: impl FnOnce(&mut Net)) -> Self {
        let net: SharedNet = Rc::default();
        setup(&mut net.borrow_mut());
        let backends = Backends {
            directory: Box::new(FakeDirectory(net.clone())),
            maps: Box::new(FakeMaps(net.clone())),
            transport: Box::new(FakeTransport(net.clone())),
        };
        let identity = Identity {
            id: "me".into(),
            color: Color::new(255, 255, 0),
        };
        let game = GameLoop::new(config, backends, Box::new(store.clone()), identity);
        Self {
            net,
            store,
            game,
            now: 0.0,
        }
    }

    /// One frame at ~60 Hz.
    pub fn tick(&mut self) {
        self.now += 16.0;
        self.game.tick(self.now);
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    pub fn wire(&self, index: usize) -> Rc<RefCell<Wire>> {
        self.net.borrow().connections[index].clone()
    }

    pub fn newest_wire(&self) -> Rc<RefCell<Wire>> {
        self.net.borrow().connections.last().expect("no connection yet").clone()
    }

    pub fn connection_count(&self) -> usize {
        self.net.borrow().connections.len()
    }

    /// Deliver a frame on the newest connection.
    pub fn deliver(&self, text: &str) {
        let net = self.net.borrow();
        let wire = net.connections.last().expect("no connection yet");
        wire.borrow_mut().inbox.push(text.to_string());
    }

    pub fn chunk(&self) -> ChunkCoord {
        self.game.player().expect("game over").chunk
    }
}

/// Default config with every lookup retried immediately.
pub fn config() -> Config {
    let mut config = Config::default();
    config.network.lookup_retry_ms = 0.0;
    config
}
