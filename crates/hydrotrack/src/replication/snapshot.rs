//! The snapshot exchanged between paired devices.
//!
//! On the wire a snapshot is a JSON object with optional keys
//! `currentIntake`, `dailyGoal` and `cupPresets`. Decoding is lenient: a key
//! holding the wrong type is treated as absent, and preset entries without a
//! string `name` or integer `volume` are skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::preset::CupPreset;

/// A preset as transmitted to the peer. Identifiers stay local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetPayload {
    /// Display name.
    pub name: String,
    /// Volume in millilitres.
    pub volume: i64,
}

impl PresetPayload {
    /// Turn the payload into a local preset with a fresh identifier.
    #[must_use]
    pub fn into_preset(self) -> CupPreset {
        CupPreset::new(self.name, self.volume)
    }
}

impl From<&CupPreset> for PresetPayload {
    fn from(preset: &CupPreset) -> Self {
        Self {
            name: preset.name.clone(),
            volume: preset.volume,
        }
    }
}

/// A partial record of tracker fields pushed to or received from a peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Intake logged so far today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_intake: Option<i64>,
    /// Daily goal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_goal: Option<i64>,
    /// Full preset list, in display order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cup_presets: Option<Vec<PresetPayload>>,
}

impl Snapshot {
    /// Snapshot carrying every field.
    #[must_use]
    pub fn full(current_intake: i64, daily_goal: i64, presets: &[CupPreset]) -> Self {
        Self {
            current_intake: Some(current_intake),
            daily_goal: Some(daily_goal),
            cup_presets: Some(presets.iter().map(PresetPayload::from).collect()),
        }
    }

    /// Whether no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current_intake.is_none() && self.daily_goal.is_none() && self.cup_presets.is_none()
    }

    /// Encode as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a JSON payload leniently.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not JSON or not a JSON object.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(&value)
    }

    /// Pick the recognised fields out of an arbitrary JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not a JSON object.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::malformed_snapshot("expected a JSON object"))?;

        let cup_presets = object
            .get("cupPresets")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let name = entry.get("name")?.as_str()?;
                        let volume = entry.get("volume")?.as_i64()?;
                        Some(PresetPayload {
                            name: name.to_string(),
                            volume,
                        })
                    })
                    .collect()
            });

        Ok(Self {
            current_intake: object.get("currentIntake").and_then(Value::as_i64),
            daily_goal: object.get("dailyGoal").and_then(Value::as_i64),
            cup_presets,
        })
    }
}
