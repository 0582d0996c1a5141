// sessionStorage-backed session persistence
use web_sys::Storage;

use crate::session::{SavedSession, SessionStore};

const KEY: &str = "chunkman.session";

/// Persists the session for the lifetime of the browser tab.
pub struct SessionStorageStore {
    storage: Option<Storage>,
}

impl SessionStorageStore {
    pub fn new() -> Self {
        let storage = web_sys::window().and_then(|w| w.session_storage().ok().flatten());
        if storage.is_none() {
            tracing::warn!("sessionStorage unavailable; session will not survive a reload");
        }
        Self { storage }
    }
}

impl SessionStore for SessionStorageStore {
    fn load(&self) -> Option<SavedSession> {
        let text = self.storage.as_ref()?.get_item(KEY).ok().flatten()?;
        SavedSession::from_json(&text)
    }

    fn save(&mut self, session: &SavedSession) {
        let Some(storage) = &self.storage else { return };
        match session.to_json() {
            Ok(text) => {
                if let Err(e) = storage.set_item(KEY, &text) {
                    tracing::warn!("Failed to save session: {:?}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to encode session: {}", e),
        }
    }

    fn clear(&mut self) {
        if let Some(storage) = &self.storage {
            let _ = storage.remove_item(KEY);
        }
    }
}
