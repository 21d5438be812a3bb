//! Storage layer for hydrotrack.
//!
//! The tracker persists three values through the [`KeyValueStore`] trait:
//! the daily goal and current intake as integers, and the preset list as an
//! encoded blob. [`Storage`] keeps them in `SQLite`; [`MemoryStore`] keeps them
//! in process memory.

pub mod memory;
pub mod schema;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, trace};

use crate::error::{Error, Result};

pub use memory::MemoryStore;

/// Key holding the daily goal in millilitres.
pub const DAILY_GOAL_KEY: &str = "dailyGoal";

/// Key holding the intake logged so far today in millilitres.
pub const CURRENT_INTAKE_KEY: &str = "currentIntake";

/// Key holding the encoded preset list.
pub const CUP_PRESETS_KEY: &str = "cupPresets";

/// Synchronous key-value persistence used by the tracker.
///
/// Loads return `Ok(None)` when the key is absent or holds a value of the
/// other kind (a blob read as an integer, or the reverse).
pub trait KeyValueStore: Send + fmt::Debug {
    /// Read an integer value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load_int(&self, key: &str) -> Result<Option<i64>>;

    /// Write an integer value, replacing whatever the key held.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn save_int(&self, key: &str, value: i64) -> Result<()>;

    /// Read a blob value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a blob value, replacing whatever the key held.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn save_blob(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// `SQLite`-backed preference store.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a preference database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory database, mostly useful in tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        schema::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_value(&self, key: &str) -> Result<Option<Value>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                [key],
                |row| row.get::<_, Value>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save_value(&self, key: &str, value: Value) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        trace!(key, "Saved preference");
        Ok(())
    }

    /// Get statistics about the stored preferences.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let entries: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM preferences", [], |row| row.get(0))?;

        let newest: Option<String> =
            self.conn
                .query_row("SELECT MAX(updated_at) FROM preferences", [], |row| {
                    row.get(0)
                })?;

        let last_updated = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            entries,
            last_updated,
            db_size_bytes,
        })
    }
}

impl KeyValueStore for Storage {
    fn load_int(&self, key: &str) -> Result<Option<i64>> {
        match self.load_value(key)? {
            Some(Value::Integer(value)) => Ok(Some(value)),
            Some(other) => {
                debug!(key, kind = ?other.data_type(), "Ignoring non-integer preference");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn save_int(&self, key: &str, value: i64) -> Result<()> {
        self.save_value(key, Value::Integer(value))
    }

    fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.load_value(key)? {
            Some(Value::Blob(bytes)) => Ok(Some(bytes)),
            Some(other) => {
                debug!(key, kind = ?other.data_type(), "Ignoring non-blob preference");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn save_blob(&self, key: &str, value: &[u8]) -> Result<()> {
        self.save_value(key, Value::Blob(value.to_vec()))
    }
}

/// Statistics about the preference database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of stored preference keys.
    pub entries: i64,
    /// When any preference was last written.
    pub last_updated: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_open_in_memory() {
        let storage = Storage::open_in_memory();
        assert!(storage.is_ok());
        assert_eq!(storage.unwrap().path(), Path::new(":memory:"));
    }

    #[test]
    fn test_missing_keys_load_as_none() {
        let storage = create_test_storage();
        assert_eq!(storage.load_int(DAILY_GOAL_KEY).unwrap(), None);
        assert_eq!(storage.load_blob(CUP_PRESETS_KEY).unwrap(), None);
    }

    #[test]
    fn test_save_and_load_int() {
        let storage = create_test_storage();
        storage.save_int(CURRENT_INTAKE_KEY, 850).unwrap();
        assert_eq!(storage.load_int(CURRENT_INTAKE_KEY).unwrap(), Some(850));
    }

    #[test]
    fn test_save_int_overwrites() {
        let storage = create_test_storage();
        storage.save_int(DAILY_GOAL_KEY, 2000).unwrap();
        storage.save_int(DAILY_GOAL_KEY, 2500).unwrap();
        assert_eq!(storage.load_int(DAILY_GOAL_KEY).unwrap(), Some(2500));
        assert_eq!(storage.stats().unwrap().entries, 1);
    }

    #[test]
    fn test_save_and_load_blob() {
        let storage = create_test_storage();
        storage.save_blob(CUP_PRESETS_KEY, b"[1,2,3]").unwrap();
        assert_eq!(
            storage.load_blob(CUP_PRESETS_KEY).unwrap(),
            Some(b"[1,2,3]".to_vec())
        );
    }

    #[test]
    fn test_kind_mismatch_loads_as_none() {
        let storage = create_test_storage();
        storage.save_blob(DAILY_GOAL_KEY, b"2000").unwrap();
        storage.save_int(CUP_PRESETS_KEY, 3).unwrap();

        assert_eq!(storage.load_int(DAILY_GOAL_KEY).unwrap(), None);
        assert_eq!(storage.load_blob(CUP_PRESETS_KEY).unwrap(), None);
    }

    #[test]
    fn test_stats_empty() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();

        assert_eq!(stats.entries, 0);
        assert!(stats.last_updated.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_tracks_last_update() {
        let storage = create_test_storage();
        let before = Utc::now() - chrono::Duration::seconds(1);
        storage.save_int(DAILY_GOAL_KEY, 2000).unwrap();
        storage.save_int(CURRENT_INTAKE_KEY, 0).unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert!(stats.last_updated.unwrap() >= before);
    }

    #[test]
    fn test_open_creates_parent_dirs_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tracker.db");

        {
            let storage = Storage::open(&path).unwrap();
            storage.save_int(DAILY_GOAL_KEY, 3000).unwrap();
            storage.save_blob(CUP_PRESETS_KEY, b"[]").unwrap();
        }

        let reopened = Storage::open(&path).unwrap();
        assert_eq!(reopened.load_int(DAILY_GOAL_KEY).unwrap(), Some(3000));
        assert_eq!(
            reopened.load_blob(CUP_PRESETS_KEY).unwrap(),
            Some(b"[]".to_vec())
        );
        assert!(reopened.stats().unwrap().db_size_bytes > 0);
    }
}
