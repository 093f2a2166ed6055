//! Persistent key-value storage used to seed state across page reloads.
//!
//! Values are strings; callers JSON-encode structured state. Concurrent
//! widget sessions writing the same store are last-writer-wins by design.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{WidgetError, WidgetResult};

/// Persisted keys. One JSON array of chatters, one JSON map of per-author
/// visit counters, one plain date string for the last active session day.
pub mod keys {
    pub const CHATTERS: &str = "chatglass.chatters";
    pub const VISITS: &str = "chatglass.visits";
    pub const SESSION_DAY: &str = "chatglass.session_day";
}

/// String-valued key-value store. Read at startup to seed state; written at
/// explicit sync points, never on a timer.
pub trait StateStore: Debug + Send + Sync {
    fn get(&self, key: &str) -> WidgetResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> WidgetResult<()>;
    fn remove(&self, key: &str) -> WidgetResult<()>;
}

/// Volatile store for tests and storage-less deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> WidgetResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> WidgetResult<()> {
        self.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> WidgetResult<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// File-backed store: the whole map is serialized as one JSON object on
/// every write. Volume is small (two keys and a date string), so rewriting
/// wholesale keeps the format trivially recoverable.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Opens the store, reading any existing file. A missing file is an
    /// empty store; a corrupt one is an error so the caller can decide to
    /// disable persistence rather than silently clobber state.
    pub fn open(path: impl Into<PathBuf>) -> WidgetResult<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|err| WidgetError::Storage(format!("{}: {err}", path.display())))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                return Err(WidgetError::Storage(format!("{}: {err}", path.display())));
            }
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, entries: &HashMap<String, String>) -> WidgetResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|err| WidgetError::Storage(err.to_string()))?;
            }
        }
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|err| WidgetError::Storage(err.to_string()))?;
        fs::write(&self.path, raw).map_err(|err| WidgetError::Storage(err.to_string()))
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> WidgetResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> WidgetResult<()> {
        let mut entries = self.lock();
        entries.insert(key.to_owned(), value.to_owned());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> WidgetResult<()> {
        let mut entries = self.lock();
        entries.remove(key);
        self.flush(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(keys::VISITS).unwrap(), None);
        store.set(keys::VISITS, r#"{"42":3}"#).unwrap();
        assert_eq!(
            store.get(keys::VISITS).unwrap().as_deref(),
            Some(r#"{"42":3}"#)
        );
        store.remove(keys::VISITS).unwrap();
        assert_eq!(store.get(keys::VISITS).unwrap(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set(keys::SESSION_DAY, "2026-08-23").unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(keys::SESSION_DAY).unwrap().as_deref(),
            Some("2026-08-23")
        );
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("absent.json")).unwrap();
        assert_eq!(store.get(keys::CHATTERS).unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_reported_not_clobbered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        let result = JsonFileStore::open(&path);
        assert!(matches!(result, Err(WidgetError::Storage(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
    }
}
