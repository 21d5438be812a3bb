//! `hydrotrack` - A personal hydration tracker
//!
//! This library holds the tracking core: a daily intake goal, the water logged
//! so far and a list of quick-add cup presets. State is persisted locally and
//! mirrored, best-effort, to a single paired device.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod preset;
pub mod replication;
pub mod storage;
pub mod tracker;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use preset::CupPreset;
pub use replication::{paired, Offline, ReplicationChannel, Snapshot, SpoolChannel};
pub use storage::{KeyValueStore, MemoryStore, Storage, StorageStats};
pub use tracker::{Tracker, TrackerView};
