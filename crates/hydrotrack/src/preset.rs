//! Cup presets: named, reusable quick-add volumes.
//!
//! Presets are persisted as a JSON array of `{id, name, volume}` records under
//! a single key. Replication carries only `{name, volume}`; a receiving device
//! mints fresh identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// A named quick-add volume in millilitres.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CupPreset {
    /// Identifier, unique within the owning preset list.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Volume in millilitres.
    pub volume: i64,
}

impl CupPreset {
    /// Create a preset with a freshly generated identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, volume: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            volume,
        }
    }

    /// Build a preset from raw form input.
    ///
    /// Returns `None` when `name` is empty or `volume_text` is not an integer.
    /// The text is parsed as-is: surrounding whitespace makes it invalid,
    /// while a leading sign is accepted.
    #[must_use]
    pub fn from_input(name: &str, volume_text: &str) -> Option<Self> {
        if name.is_empty() {
            return None;
        }
        let volume = volume_text.parse::<i64>().ok()?;
        Some(Self::new(name, volume))
    }

    /// Short label used in listings, e.g. `Medium (350 mL)`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} ({} mL)", self.name, self.volume)
    }
}

/// The presets a fresh install starts with.
#[must_use]
pub fn seed_presets() -> Vec<CupPreset> {
    vec![
        CupPreset::new("Small", 200),
        CupPreset::new("Medium", 350),
        CupPreset::new("Large", 500),
    ]
}

/// Encode a preset list into the persisted blob format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode_presets(presets: &[CupPreset]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(presets)?)
}

/// Decode a persisted preset blob.
///
/// # Errors
///
/// Returns an error if the blob is not a JSON array of preset records.
pub fn decode_presets(blob: &[u8]) -> Result<Vec<CupPreset>> {
    Ok(serde_json::from_slice(blob)?)
}
