//! Durable key-value slots and the local library store
//!
//! A slot holds one whole string value per fixed key and is overwritten on
//! every write. The store keeps the library document in the `DATA_KEY` slot;
//! the sync layer keeps the GitHub token in `TOKEN_KEY`.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use crate::errors::Result;

pub mod store;

pub use store::LibraryStore;

/// Slot holding the persisted library document
pub const DATA_KEY: &str = "prompt-library-data";

/// Copy of a stored document that could not be loaded
pub const BACKUP_KEY: &str = "prompt-library-data.unreadable";

/// Slot holding the GitHub credential
pub const TOKEN_KEY: &str = "github_token";

/// A local durable key-value slot
pub trait KeyValueSlot: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Slot backed by one file per key in a directory
#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    /// Open a slot directory, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueSlot for FileSlot {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        // Write-then-rename so a crash never leaves a half-written document
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory slot for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemorySlot {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueSlot for MemorySlot {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_file_slot_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let slot = FileSlot::open(temp_dir.path().join("slots")).unwrap();

        assert_eq!(slot.get(DATA_KEY).unwrap(), None);

        slot.set(DATA_KEY, "{\"a\":1}").unwrap();
        assert_eq!(slot.get(DATA_KEY).unwrap().as_deref(), Some("{\"a\":1}"));

        // Overwrites, never appends
        slot.set(DATA_KEY, "{}").unwrap();
        assert_eq!(slot.get(DATA_KEY).unwrap().as_deref(), Some("{}"));
        assert!(slot.dir().join("prompt-library-data.json").exists());
        assert!(!slot.dir().join("prompt-library-data.json.tmp").exists());
    }

    #[test]
    fn test_file_slot_remove_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let slot = FileSlot::open(temp_dir.path()).unwrap();

        assert!(slot.remove(TOKEN_KEY).is_ok());

        slot.set(TOKEN_KEY, "ghp_x").unwrap();
        slot.remove(TOKEN_KEY).unwrap();
        assert_eq!(slot.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_memory_slot() {
        let slot = MemorySlot::new();
        slot.set("k", "v").unwrap();
        assert_eq!(slot.get("k").unwrap().as_deref(), Some("v"));
        slot.remove("k").unwrap();
        assert_eq!(slot.get("k").unwrap(), None);
    }
}
