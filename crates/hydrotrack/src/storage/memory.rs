//! In-process preference store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::KeyValueStore;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stored {
    Int(i64),
    Blob(Vec<u8>),
}

/// A [`KeyValueStore`] that lives only as long as the process.
///
/// Clones share the same entries, so a test can hand one clone to a tracker
/// and keep another to inspect or to build a second tracker from.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Stored>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, key: &str) -> Result<Option<Stored>> {
        let entries = self.entries.lock().map_err(|_| Error::StorePoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: Stored) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| Error::StorePoisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn load_int(&self, key: &str) -> Result<Option<i64>> {
        Ok(match self.get(key)? {
            Some(Stored::Int(value)) => Some(value),
            _ => None,
        })
    }

    fn save_int(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, Stored::Int(value))
    }

    fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(match self.get(key)? {
            Some(Stored::Blob(bytes)) => Some(bytes),
            _ => None,
        })
    }

    fn save_blob(&self, key: &str, value: &[u8]) -> Result<()> {
        self.put(key, Stored::Blob(value.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.load_int("dailyGoal").unwrap(), None);
    }

    #[test]
    fn test_int_and_blob_round_trip() {
        let store = MemoryStore::new();
        store.save_int("currentIntake", 500).unwrap();
        store.save_blob("cupPresets", b"[]").unwrap();

        assert_eq!(store.load_int("currentIntake").unwrap(), Some(500));
        assert_eq!(store.load_blob("cupPresets").unwrap(), Some(b"[]".to_vec()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_kind_mismatch_loads_as_none() {
        let store = MemoryStore::new();
        store.save_blob("dailyGoal", b"2000").unwrap();
        assert_eq!(store.load_int("dailyGoal").unwrap(), None);
    }

    #[test]
    fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.save_int("dailyGoal", 1800).unwrap();
        assert_eq!(other.load_int("dailyGoal").unwrap(), Some(1800));
    }
}
