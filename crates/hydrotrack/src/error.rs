//! Error types for hydrotrack.
//!
//! Adapters (storage, replication) and the configuration layer report failures
//! through [`Error`]. The tracker itself never hands these to its callers: it
//! logs them and carries on with whatever state it already holds.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for hydrotrack operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// The database was written by a newer schema than this build knows.
    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaVersion {
        /// Version stamped in the database.
        found: i64,
        /// Highest version this build can use.
        supported: i64,
    },

    /// The stored schema version is not a number.
    #[error("unreadable schema version: {value}")]
    SchemaVersionUnreadable {
        /// The stored value.
        value: String,
    },

    /// The in-memory store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    StorePoisoned,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Replication Errors ===
    /// A replication channel failed to activate its session.
    #[error("failed to activate replication channel '{name}': {message}")]
    SessionActivate {
        /// Name of the replication channel.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// A snapshot could not be handed to the peer.
    #[error("failed to send snapshot over '{name}': {message}")]
    SnapshotSend {
        /// Name of the replication channel.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// An inbound snapshot payload was not a JSON object.
    #[error("malformed snapshot: {reason}")]
    MalformedSnapshot {
        /// Why the payload was rejected.
        reason: String,
    },

    // === Preset Errors ===
    /// No preset matched the given selector.
    #[error("no preset matches '{selector}'")]
    PresetNotFound {
        /// The index or name that was looked up.
        selector: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for hydrotrack operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a session activation error.
    #[must_use]
    pub fn session_activate(name: &'static str, message: impl Into<String>) -> Self {
        Self::SessionActivate {
            name,
            message: message.into(),
        }
    }

    /// Create a snapshot send error.
    #[must_use]
    pub fn snapshot_send(name: &'static str, message: impl Into<String>) -> Self {
        Self::SnapshotSend {
            name,
            message: message.into(),
        }
    }

    /// Create a malformed snapshot error.
    #[must_use]
    pub fn malformed_snapshot(reason: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            reason: reason.into(),
        }
    }

    /// Create a preset lookup error.
    #[must_use]
    pub fn preset_not_found(selector: impl Into<String>) -> Self {
        Self::PresetNotFound {
            selector: selector.into(),
        }
    }

    /// Check if this error came from the replication layer.
    #[must_use]
    pub fn is_replication_error(&self) -> bool {
        matches!(
            self,
            Self::SessionActivate { .. } | Self::SnapshotSend { .. } | Self::MalformedSnapshot { .. }
        )
    }
}
