//! Session persistence in a JSON file next to the config.

use std::path::PathBuf;

use client::{SavedSession, SessionStore};
use tracing::warn;

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Option<SavedSession> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        let saved = SavedSession::from_json(&text);
        if saved.is_none() {
            warn!("Ignoring unreadable session file {}", self.path.display());
        }
        saved
    }

    fn save(&mut self, session: &SavedSession) {
        let result = session
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|text| std::fs::write(&self.path, text).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!("Failed to save session to {}: {}", self.path.display(), e);
        }
    }

    fn clear(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::Color;

    #[test]
    fn save_load_clear() {
        let path = std::env::temp_dir().join(format!("chunkman-session-{}.json", std::process::id()));
        let mut store = FileStore::new(&path);
        assert!(store.load().is_none());

        let saved = SavedSession {
            id: "bot-1".into(),
            color: Color::new(1, 2, 3),
            score: 50,
            x: 1,
            y: 2,
        };
        store.save(&saved);
        assert_eq!(store.load(), Some(saved));

        store.clear();
        assert!(!path.exists());
        assert!(store.load().is_none());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let path = std::env::temp_dir().join(format!("chunkman-corrupt-{}.json", std::process::id()));
        std::fs::write(&path, "{oops").unwrap();
        assert!(FileStore::new(&path).load().is_none());
        std::fs::remove_file(&path).unwrap();
    }
}
