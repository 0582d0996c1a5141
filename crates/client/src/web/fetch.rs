// Directory and map lookups over fetch, cached per chunk coordinate
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use protocol::messages::{ChunkServerRequest, ChunkServerResponse};
use protocol::{ChunkCoord, MapData};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{Request, RequestInit, RequestMode, Response};

use crate::error::LookupError;
use crate::network::{Directory, MapSource, directory_url, map_url};

enum Slot<T> {
    Pending,
    Ready(T),
    Failed(String),
}

type Cache<T> = Rc<RefCell<HashMap<ChunkCoord, Slot<T>>>>;

/// Answers from the cache; a miss starts a request and reports `Pending`
/// until it lands. Failures are reported once and then forgotten so the
/// next ask retries.
fn lookup<T, F>(cache: &Cache<T>, coord: ChunkCoord, start: F) -> Result<T, LookupError>
where
    T: Clone + 'static,
    F: std::future::Future<Output = Result<T, String>> + 'static,
{
    {
        let mut slots = cache.borrow_mut();
        match slots.remove(&coord) {
            Some(Slot::Ready(value)) => {
                slots.insert(coord, Slot::Ready(value.clone()));
                return Ok(value);
            }
            Some(Slot::Pending) => {
                slots.insert(coord, Slot::Pending);
                return Err(LookupError::Pending(coord));
            }
            Some(Slot::Failed(reason)) => return Err(LookupError::failed(coord, reason)),
            None => {
                slots.insert(coord, Slot::Pending);
            }
        }
    }

    let cache = cache.clone();
    spawn_local(async move {
        let slot = match start.await {
            Ok(value) => Slot::Ready(value),
            Err(reason) => Slot::Failed(reason),
        };
        cache.borrow_mut().insert(coord, slot);
    });
    Err(LookupError::Pending(coord))
}

async fn fetch_text(url: String, body: Option<String>) -> Result<String, String> {
    let window = web_sys::window().ok_or("No window")?;
    let opts = RequestInit::new();
    opts.set_mode(RequestMode::Cors);
    match &body {
        Some(body) => {
            opts.set_method("POST");
            opts.set_body(&JsValue::from_str(body));
        }
        None => opts.set_method("GET"),
    }
    let request = Request::new_with_str_and_init(&url, &opts).map_err(|e| format!("{:?}", e))?;
    if body.is_some() {
        request
            .headers()
            .set("Content-Type", "application/json")
            .map_err(|e| format!("{:?}", e))?;
    }

    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| format!("{:?}", e))?
        .dyn_into()
        .map_err(|_| "Not a Response".to_string())?;
    if !response.ok() {
        return Err(format!("HTTP {} from {}", response.status(), url));
    }
    let text = JsFuture::from(response.text().map_err(|e| format!("{:?}", e))?)
        .await
        .map_err(|e| format!("{:?}", e))?;
    text.as_string().ok_or_else(|| "Body is not text".to_string())
}

pub struct FetchDirectory {
    base: String,
    cache: Cache<String>,
}

impl FetchDirectory {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            cache: Rc::default(),
        }
    }
}

impl Directory for FetchDirectory {
    fn resolve(&mut self, coord: ChunkCoord) -> Result<String, LookupError> {
        let url = directory_url(&self.base);
        lookup(&self.cache, coord, async move {
            let body = serde_json::to_string(&ChunkServerRequest {
                chunk_coordinates: coord,
            })
            .map_err(|e| e.to_string())?;
            let text = fetch_text(url, Some(body)).await?;
            let response: ChunkServerResponse = serde_json::from_str(&text).map_err(|e| e.to_string())?;
            Ok(response.chunk_server_address)
        })
    }

    fn forget(&mut self, coord: ChunkCoord) {
        self.cache.borrow_mut().remove(&coord);
    }
}

#[derive(Default)]
pub struct FetchMaps {
    cache: Cache<MapData>,
}

impl MapSource for FetchMaps {
    fn load(&mut self, address: &str, coord: ChunkCoord) -> Result<MapData, LookupError> {
        let url = map_url(address);
        lookup(&self.cache, coord, async move {
            let text = fetch_text(url, None).await?;
            serde_json::from_str::<MapData>(&text).map_err(|e| e.to_string())
        })
    }
}
