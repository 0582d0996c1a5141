//! Directory and map lookups over blocking HTTP.
//!
//! Requests run on tokio's blocking pool. Until one finishes the lookup
//! reports `Pending`, so the game loop keeps ticking meanwhile.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use client::error::LookupError;
use client::network::{Directory, MapSource, directory_url, map_url};
use futures_util::FutureExt;
use protocol::messages::{ChunkServerRequest, ChunkServerResponse};
use protocol::{ChunkCoord, MapData};
use tokio::task::JoinHandle;
use tracing::debug;

const TIMEOUT: Duration = Duration::from_secs(5);

fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(TIMEOUT).build()
}

/// In-flight requests keyed by what they look up.
struct Jobs<K, T> {
    running: HashMap<K, JoinHandle<Result<T, String>>>,
}

impl<K, T> Jobs<K, T>
where
    K: Eq + Hash + Clone,
    T: Send + 'static,
{
    fn new() -> Self {
        Self {
            running: HashMap::new(),
        }
    }

    /// Start `job` if nothing is running for `key`, otherwise collect the
    /// finished result.
    fn poll<F>(&mut self, key: K, coord: ChunkCoord, job: F) -> Result<T, LookupError>
    where
        F: FnOnce() -> Result<T, String> + Send + 'static,
    {
        let outcome = match self.running.get_mut(&key) {
            None => {
                self.running.insert(key, tokio::task::spawn_blocking(job));
                return Err(LookupError::Pending(coord));
            }
            Some(handle) if !handle.is_finished() => return Err(LookupError::Pending(coord)),
            Some(handle) => handle.now_or_never(),
        };
        self.running.remove(&key);
        match outcome {
            Some(Ok(Ok(value))) => Ok(value),
            Some(Ok(Err(reason))) => Err(LookupError::failed(coord, reason)),
            Some(Err(e)) => Err(LookupError::failed(coord, e.to_string())),
            None => Err(LookupError::Pending(coord)),
        }
    }
}

/// `POST {base}/new_chunk_server`.
pub struct HttpDirectory {
    base: String,
    agent: ureq::Agent,
    jobs: Jobs<ChunkCoord, String>,
}

impl HttpDirectory {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            agent: agent(),
            jobs: Jobs::new(),
        }
    }
}

impl Directory for HttpDirectory {
    fn resolve(&mut self, coord: ChunkCoord) -> Result<String, LookupError> {
        let agent = self.agent.clone();
        let url = directory_url(&self.base);
        self.jobs.poll(coord, coord, move || {
            debug!("Asking {} for chunk {}", url, coord);
            let response: ChunkServerResponse = agent
                .post(&url)
                .send_json(ChunkServerRequest {
                    chunk_coordinates: coord,
                })
                .map_err(|e| e.to_string())?
                .into_json()
                .map_err(|e| e.to_string())?;
            Ok(response.chunk_server_address)
        })
    }
}

/// `GET http://{address}/getMap`.
pub struct HttpMaps {
    agent: ureq::Agent,
    jobs: Jobs<(String, ChunkCoord), MapData>,
}

impl HttpMaps {
    pub fn new() -> Self {
        Self {
            agent: agent(),
            jobs: Jobs::new(),
        }
    }
}

impl MapSource for HttpMaps {
    fn load(&mut self, address: &str, coord: ChunkCoord) -> Result<MapData, LookupError> {
        let agent = self.agent.clone();
        let url = map_url(address);
        self.jobs.poll((address.to_string(), coord), coord, move || {
            debug!("Fetching map for chunk {} from {}", coord, url);
            agent
                .get(&url)
                .call()
                .map_err(|e| e.to_string())?
                .into_json::<MapData>()
                .map_err(|e| e.to_string())
        })
    }
}
