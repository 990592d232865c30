//! Session persistence.
//!
//! The session snapshot is the only durable client-side state: one pretty
//! JSON file at the configured path, rewritten after every session
//! mutation. A missing file is an empty session; a corrupt one is logged
//! and treated the same rather than aborting startup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use carrel_core::session::SessionSnapshot;

pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> SessionSnapshot {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return SessionSnapshot::default();
            }
            Err(err) => {
                warn!(
                    "Failed to read session file {}: {}",
                    self.path.display(),
                    err
                );
                return SessionSnapshot::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    "Ignoring corrupt session file {}: {}",
                    self.path.display(),
                    err
                );
                SessionSnapshot::default()
            }
        }
    }

    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create session directory {}", parent.display())
                })?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)
            .context("Failed to serialize session snapshot")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write session file {}", self.path.display()))?;
        info!("Session saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrel_core::session::{ChatFilters, SessionStore};

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));

        let mut session = SessionStore::new();
        session.merge_filters(ChatFilters {
            year_min: Some(2010),
            ..Default::default()
        });
        session.append_user("what is a transformer?");

        file.save(&session.snapshot(50)).unwrap();

        let loaded = file.load();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].content, "what is a transformer?");
        assert_eq!(loaded.filters.year_min, Some(2010));
    }

    #[test]
    fn missing_file_is_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("absent.json"));
        let loaded = file.load();
        assert!(loaded.messages.is_empty());
        assert!(loaded.filters.is_empty());
    }

    #[test]
    fn corrupt_file_is_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let loaded = SessionFile::new(&path).load();
        assert!(loaded.messages.is_empty());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("state/nested/session.json"));
        file.save(&SessionSnapshot::default()).unwrap();
        assert!(file.path().exists());
    }
}
