// Connection seams, lookup caching and the inbound message queue
use std::collections::{HashMap, VecDeque};

use protocol::messages::ClientMessage;
use protocol::{ChunkCoord, MapData};
use tracing::{trace, warn};

use crate::error::{ConnectError, LookupError};

/// Where a connection is in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    /// Refused, dropped by the server or closed locally. Terminal.
    Closed,
}

/// A live, best-effort text connection to one chunk server.
///
/// [`Transport::connect`] may hand one back before the handshake finishes;
/// callers watch [`Connection::state`] to learn how it went.
pub trait Connection {
    /// Fire-and-forget. Implementations may buffer until the socket opens.
    fn send(&mut self, text: String);
    /// Everything received since the last call, in arrival order.
    fn drain(&mut self) -> Vec<String>;
    fn close(&mut self);
    fn state(&self) -> LinkState;

    fn is_open(&self) -> bool {
        self.state() == LinkState::Open
    }
}

/// Opens connections to chunk-server addresses.
pub trait Transport {
    fn connect(&mut self, address: &str) -> Result<Box<dyn Connection>, ConnectError>;
}

/// Chunk coordinate to owning chunk-server address.
pub trait Directory {
    fn resolve(&mut self, coord: ChunkCoord) -> Result<String, LookupError>;

    /// Drop any remembered answer for `coord`.
    fn forget(&mut self, _coord: ChunkCoord) {}
}

/// Tile data for a chunk, fetched from the chunk server that owns it.
pub trait MapSource {
    fn load(&mut self, address: &str, coord: ChunkCoord) -> Result<MapData, LookupError>;
}

/// WebSocket endpoint of a chunk server. Full URLs pass through.
pub fn ws_url(address: &str) -> String {
    if address.starts_with("ws://") || address.starts_with("wss://") {
        address.to_string()
    } else {
        format!("ws://{}/ws", address.trim_end_matches('/'))
    }
}

/// Map endpoint of a chunk server.
pub fn map_url(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        format!("{}/getMap", address.trim_end_matches('/'))
    } else {
        format!("http://{}/getMap", address.trim_end_matches('/'))
    }
}

/// Chunk-server lookup endpoint of the directory service.
pub fn directory_url(base: &str) -> String {
    format!("{}/new_chunk_server", base.trim_end_matches('/'))
}

/// Serialize and send. Encoding failures are logged and the message dropped.
pub fn send_message(connection: &mut dyn Connection, message: &ClientMessage) {
    match message.to_json() {
        Ok(text) => {
            trace!(kind = message.kind(), "Sending");
            connection.send(text);
        }
        Err(e) => warn!(kind = message.kind(), error = %e, "Failed to encode message"),
    }
}

/// Remembers addresses per coordinate. Failures are not cached.
pub struct CachedDirectory<D> {
    inner: D,
    known: HashMap<ChunkCoord, String>,
}

impl<D: Directory> CachedDirectory<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            known: HashMap::new(),
        }
    }
}

impl<D: Directory> Directory for CachedDirectory<D> {
    fn resolve(&mut self, coord: ChunkCoord) -> Result<String, LookupError> {
        if let Some(address) = self.known.get(&coord) {
            return Ok(address.clone());
        }
        let address = self.inner.resolve(coord)?;
        self.known.insert(coord, address.clone());
        Ok(address)
    }

    fn forget(&mut self, coord: ChunkCoord) {
        self.known.remove(&coord);
        self.inner.forget(coord);
    }
}

/// Remembers map data per coordinate.
pub struct CachedMaps<M> {
    inner: M,
    known: HashMap<ChunkCoord, MapData>,
}

impl<M: MapSource> CachedMaps<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            known: HashMap::new(),
        }
    }
}

impl<M: MapSource> MapSource for CachedMaps<M> {
    fn load(&mut self, address: &str, coord: ChunkCoord) -> Result<MapData, LookupError> {
        if let Some(map) = self.known.get(&coord) {
            return Ok(map.clone());
        }
        let map = self.inner.load(address, coord)?;
        self.known.insert(coord, map.clone());
        Ok(map)
    }
}

/// One received text frame, tagged with the chunk that was active when it
/// was taken off its connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub origin: ChunkCoord,
    pub text: String,
}

/// Inbound buffer. Nothing is dropped; order is arrival order.
#[derive(Debug, Default)]
pub struct InboundQueue {
    queue: VecDeque<Inbound>,
}

impl InboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move everything a connection has received into the queue.
    pub fn take_from(&mut self, connection: &mut dyn Connection, origin: ChunkCoord) -> usize {
        let frames = connection.drain();
        let count = frames.len();
        self.queue
            .extend(frames.into_iter().map(|text| Inbound { origin, text }));
        count
    }

    pub fn push(&mut self, origin: ChunkCoord, text: String) {
        self.queue.push_back(Inbound { origin, text });
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Inbound> + '_ {
        self.queue.drain(..)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingDirectory {
        calls: usize,
        fail_next: bool,
    }

    impl Directory for CountingDirectory {
        fn resolve(&mut self, coord: ChunkCoord) -> Result<String, LookupError> {
            self.calls += 1;
            if std::mem::take(&mut self.fail_next) {
                return Err(LookupError::failed(coord, "503"));
            }
            Ok(format!("chunk-{}-{}:9000", coord.x, coord.y))
        }
    }

    #[test]
    fn endpoints_are_derived_from_addresses() {
        assert_eq!(ws_url("10.0.0.2:9001"), "ws://10.0.0.2:9001/ws");
        assert_eq!(ws_url("wss://game.example/ws"), "wss://game.example/ws");
        assert_eq!(map_url("10.0.0.2:9001"), "http://10.0.0.2:9001/getMap");
        assert_eq!(directory_url("http://central:8080/"), "http://central:8080/new_chunk_server");
    }

    #[test]
    fn directory_cache_skips_failures_and_honours_forget() {
        let mut dir = CachedDirectory::new(CountingDirectory {
            calls: 0,
            fail_next: true,
        });
        let coord = ChunkCoord::new(1, 0);
        assert!(dir.resolve(coord).is_err());
        assert_eq!(dir.resolve(coord).unwrap(), "chunk-1-0:9000");
        assert_eq!(dir.resolve(coord).unwrap(), "chunk-1-0:9000");
        assert_eq!(dir.inner.calls, 2);

        dir.forget(coord);
        dir.resolve(coord).unwrap();
        assert_eq!(dir.inner.calls, 3);
    }

    #[test]
    fn queue_preserves_arrival_order_and_origin() {
        let mut queue = InboundQueue::new();
        queue.push(ChunkCoord::new(0, 0), "a".into());
        queue.push(ChunkCoord::new(1, 0), "b".into());
        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained[0].text, "a");
        assert_eq!(drained[1].origin, ChunkCoord::new(1, 0));
        assert!(queue.is_empty());
    }
}
