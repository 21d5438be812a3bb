//! The hydration tracker.
//!
//! [`Tracker`] is the single owner of the daily goal, the intake logged so far
//! and the preset list. Every local mutation ends with one commit step:
//! persist the keys that changed, recompute the goal flag, publish the new
//! [`TrackerView`] to observers, then push a full [`Snapshot`] to the paired
//! device if a session is active. Snapshots received from the peer go through
//! the same step minus the push, so two devices never echo each other.
//!
//! Persistence and replication failures are logged and otherwise ignored.

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::preset::{decode_presets, encode_presets, seed_presets, CupPreset};
use crate::replication::{ReplicationChannel, SessionStatus, Snapshot};
use crate::storage::{KeyValueStore, CUP_PRESETS_KEY, CURRENT_INTAKE_KEY, DAILY_GOAL_KEY};

/// Goal used when none is stored, or the stored goal is zero.
pub const DEFAULT_DAILY_GOAL: i64 = 2000;

/// Amount offered by the custom-add entry before the user changes it.
pub const DEFAULT_CUSTOM_VOLUME: i64 = 250;

/// Inbound snapshots that may wait for the tracker by default.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// The observable state of a tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerView {
    /// Target intake for the day, in millilitres.
    pub daily_goal: i64,
    /// Intake logged so far, in millilitres.
    pub current_intake: i64,
    /// Quick-add presets in display order.
    pub presets: Vec<CupPreset>,
    /// Whether the goal has been met with a non-zero intake.
    pub goal_reached: bool,
}

impl TrackerView {
    /// Fraction of the goal met, clamped to `0.0..=1.0`.
    ///
    /// A non-positive goal reports no progress.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        if self.daily_goal <= 0 {
            return 0.0;
        }
        (self.current_intake as f64 / self.daily_goal as f64).clamp(0.0, 1.0)
    }

    /// Millilitres still to drink today, never negative.
    #[must_use]
    pub fn remaining(&self) -> i64 {
        self.daily_goal.saturating_sub(self.current_intake).max(0)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::full(self.current_intake, self.daily_goal, &self.presets)
    }
}

/// Which persisted fields a mutation touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Changed {
    intake: bool,
    goal: bool,
    presets: bool,
}

impl Changed {
    const INTAKE: Self = Self {
        intake: true,
        goal: false,
        presets: false,
    };
    const GOAL: Self = Self {
        intake: false,
        goal: true,
        presets: false,
    };
    const PRESETS: Self = Self {
        intake: false,
        goal: false,
        presets: true,
    };

    fn is_empty(self) -> bool {
        !(self.intake || self.goal || self.presets)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Local,
    Remote,
}

/// Owner of the hydration state.
#[derive(Debug)]
pub struct Tracker {
    view: TrackerView,
    goal_alert: bool,
    store: Box<dyn KeyValueStore>,
    channel: Box<dyn ReplicationChannel>,
    inbound_tx: mpsc::Sender<Snapshot>,
    inbound_rx: mpsc::Receiver<Snapshot>,
    publisher: watch::Sender<TrackerView>,
}

impl Tracker {
    /// Load state from `store` and activate `channel`.
    ///
    /// Missing or unreadable values fall back to defaults: a goal of 2000 mL
    /// (also when the stored goal is 0), no intake, and the seed presets.
    /// A channel that fails to activate is logged and left inactive.
    pub async fn initialize(
        store: Box<dyn KeyValueStore>,
        mut channel: Box<dyn ReplicationChannel>,
        queue_capacity: usize,
    ) -> Self {
        let daily_goal = match store.load_int(DAILY_GOAL_KEY) {
            Ok(Some(goal)) if goal != 0 => goal,
            Ok(_) => DEFAULT_DAILY_GOAL,
            Err(err) => {
                warn!(error = %err, "Failed to load daily goal; using default");
                DEFAULT_DAILY_GOAL
            }
        };

        let current_intake = match store.load_int(CURRENT_INTAKE_KEY) {
            Ok(intake) => intake.unwrap_or(0),
            Err(err) => {
                warn!(error = %err, "Failed to load current intake; starting from zero");
                0
            }
        };

        let presets = match store.load_blob(CUP_PRESETS_KEY) {
            Ok(Some(blob)) => decode_presets(&blob).unwrap_or_else(|err| {
                warn!(error = %err, "Stored presets are unreadable; using seed presets");
                seed_presets()
            }),
            Ok(None) => seed_presets(),
            Err(err) => {
                warn!(error = %err, "Failed to load presets; using seed presets");
                seed_presets()
            }
        };

        let view = TrackerView {
            daily_goal,
            current_intake,
            presets,
            goal_reached: is_goal_reached(current_intake, daily_goal),
        };
        debug!(
            daily_goal,
            current_intake,
            presets = view.presets.len(),
            "Tracker state loaded"
        );

        let (inbound_tx, inbound_rx) = mpsc::channel(queue_capacity.max(1));
        match channel.activate(inbound_tx.clone()).await {
            Ok(()) if channel.is_session_active() => {
                info!(channel = channel.name(), "Replication session active");
            }
            Ok(()) => debug!(channel = channel.name(), "Replication session not active"),
            Err(err) => warn!(channel = channel.name(), error = %err, "Replication unavailable"),
        }

        let (publisher, _) = watch::channel(view.clone());
        Self {
            view,
            goal_alert: false,
            store,
            channel,
            inbound_tx,
            inbound_rx,
            publisher,
        }
    }

    /// Current state.
    #[must_use]
    pub fn view(&self) -> &TrackerView {
        &self.view
    }

    /// Target intake for the day.
    #[must_use]
    pub fn daily_goal(&self) -> i64 {
        self.view.daily_goal
    }

    /// Intake logged so far.
    #[must_use]
    pub fn current_intake(&self) -> i64 {
        self.view.current_intake
    }

    /// Presets in display order.
    #[must_use]
    pub fn presets(&self) -> &[CupPreset] {
        &self.view.presets
    }

    /// Whether the goal has been met.
    #[must_use]
    pub fn goal_reached(&self) -> bool {
        self.view.goal_reached
    }

    /// Observe state changes. The receiver starts at the current state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrackerView> {
        self.publisher.subscribe()
    }

    /// Returns `true` once after each time the goal becomes reached.
    pub fn take_goal_alert(&mut self) -> bool {
        std::mem::take(&mut self.goal_alert)
    }

    /// Whether snapshots currently reach the paired device.
    #[must_use]
    pub fn is_session_active(&self) -> bool {
        self.channel.is_session_active()
    }

    /// Status of the replication session.
    #[must_use]
    pub fn session_status(&self) -> SessionStatus {
        self.channel.status()
    }

    /// Log `volume` millilitres.
    ///
    /// The result is capped at the daily goal (the excess is discarded) and
    /// floored at zero.
    pub fn add_water(&mut self, volume: i64) {
        let before = self.view.current_intake;
        self.view.current_intake = before
            .saturating_add(volume)
            .min(self.view.daily_goal)
            .max(0);
        debug!(volume, before, after = self.view.current_intake, "Water added");
        self.commit(Changed::INTAKE, Origin::Local);
    }

    /// Log the volume of the preset at `index`.
    ///
    /// Returns `false` without touching state if there is no such preset.
    pub fn drink_preset(&mut self, index: usize) -> bool {
        let Some(volume) = self.view.presets.get(index).map(|p| p.volume) else {
            return false;
        };
        self.add_water(volume);
        true
    }

    /// Start the day over.
    pub fn reset_daily(&mut self) {
        self.view.current_intake = 0;
        debug!("Daily intake reset");
        self.commit(Changed::INTAKE, Origin::Local);
    }

    /// Replace the daily goal. Any value is accepted.
    pub fn set_daily_goal(&mut self, goal: i64) {
        self.view.daily_goal = goal;
        debug!(goal, "Daily goal set");
        self.commit(Changed::GOAL, Origin::Local);
    }

    /// Append a preset built from form input.
    ///
    /// Returns the new preset's id, or `None` (leaving the list untouched) if
    /// `name` is empty or `volume_text` is not an integer.
    pub fn add_preset(&mut self, name: &str, volume_text: &str) -> Option<Uuid> {
        let Some(preset) = CupPreset::from_input(name, volume_text) else {
            debug!(name, volume_text, "Ignoring invalid preset input");
            return None;
        };
        let id = preset.id;
        debug!(%id, name, volume = preset.volume, "Preset added");
        self.view.presets.push(preset);
        self.commit(Changed::PRESETS, Origin::Local);
        Some(id)
    }

    /// Remove the presets at `indices`.
    ///
    /// Duplicate and out-of-range indices are ignored. Returns how many
    /// presets were removed; when that is zero nothing is persisted or sent.
    pub fn remove_presets(&mut self, indices: &[usize]) -> usize {
        let before = self.view.presets.len();
        let mut position = 0;
        self.view.presets.retain(|_| {
            let keep = !indices.contains(&position);
            position += 1;
            keep
        });

        let removed = before - self.view.presets.len();
        if removed > 0 {
            debug!(removed, "Presets removed");
            self.commit(Changed::PRESETS, Origin::Local);
        }
        removed
    }

    /// Overwrite local fields with those present in a peer's snapshot.
    ///
    /// Last writer wins: values are taken as-is, without clamping or merging.
    /// Received presets get fresh identifiers. The overwritten keys are
    /// persisted but not sent back to the peer.
    pub fn receive_remote_snapshot(&mut self, snapshot: Snapshot) {
        let Snapshot {
            current_intake,
            daily_goal,
            cup_presets,
        } = snapshot;

        let mut changed = Changed::default();
        if let Some(intake) = current_intake {
            self.view.current_intake = intake;
            changed.intake = true;
        }
        if let Some(goal) = daily_goal {
            self.view.daily_goal = goal;
            changed.goal = true;
        }
        if let Some(payloads) = cup_presets {
            self.view.presets = payloads.into_iter().map(|p| p.into_preset()).collect();
            changed.presets = true;
        }

        if changed.is_empty() {
            trace!("Ignoring empty snapshot");
            return;
        }
        debug!(
            current_intake = self.view.current_intake,
            daily_goal = self.view.daily_goal,
            presets = self.view.presets.len(),
            "Applied snapshot from paired device"
        );
        self.commit(changed, Origin::Remote);
    }

    /// Apply every snapshot already waiting in the inbound queue.
    ///
    /// Returns the number applied.
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(snapshot) = self.inbound_rx.try_recv() {
            self.receive_remote_snapshot(snapshot);
            applied += 1;
        }
        applied
    }

    /// Wait for the next inbound snapshot and apply it.
    ///
    /// The queue stays open for the tracker's lifetime, so this only returns
    /// once a snapshot has been applied. Deactivating the channel leaves it
    /// waiting; race it against a shutdown signal to stop.
    pub async fn next_inbound(&mut self) {
        // The tracker holds a sender for reactivation, so `recv` never sees a
        // closed queue.
        if let Some(snapshot) = self.inbound_rx.recv().await {
            self.receive_remote_snapshot(snapshot);
        }
    }

    /// Reactivate the replication session if it has gone inactive.
    ///
    /// Returns whether the session is active afterwards.
    pub async fn ensure_session(&mut self) -> bool {
        if self.channel.is_session_active() {
            return true;
        }
        if let Err(err) = self.channel.activate(self.inbound_tx.clone()).await {
            warn!(channel = self.channel.name(), error = %err, "Replication unavailable");
        }
        self.channel.is_session_active()
    }

    /// Tear down the replication session.
    pub fn deactivate(&mut self) {
        self.channel.deactivate();
        debug!(channel = self.channel.name(), "Replication session deactivated");
    }

    fn commit(&mut self, changed: Changed, origin: Origin) {
        self.persist(changed);
        self.refresh_goal_flag();
        self.publisher.send_replace(self.view.clone());
        if origin == Origin::Local {
            self.replicate();
        }
    }

    fn persist(&self, changed: Changed) {
        if changed.goal {
            self.save_int(DAILY_GOAL_KEY, self.view.daily_goal);
        }
        if changed.intake {
            self.save_int(CURRENT_INTAKE_KEY, self.view.current_intake);
        }
        if changed.presets {
            match encode_presets(&self.view.presets) {
                Ok(blob) => {
                    if let Err(err) = self.store.save_blob(CUP_PRESETS_KEY, &blob) {
                        warn!(key = CUP_PRESETS_KEY, error = %err, "Failed to persist preference");
                    }
                }
                Err(err) => warn!(error = %err, "Failed to encode presets"),
            }
        }
    }

    fn save_int(&self, key: &str, value: i64) {
        if let Err(err) = self.store.save_int(key, value) {
            warn!(key, error = %err, "Failed to persist preference");
        }
    }

    fn refresh_goal_flag(&mut self) {
        let reached = is_goal_reached(self.view.current_intake, self.view.daily_goal);
        if reached && !self.view.goal_reached {
            info!(
                current_intake = self.view.current_intake,
                daily_goal = self.view.daily_goal,
                "Daily goal reached"
            );
            self.goal_alert = true;
        } else if !reached {
            self.goal_alert = false;
        }
        self.view.goal_reached = reached;
    }

    fn replicate(&self) {
        if !self.channel.is_session_active() {
            trace!(channel = self.channel.name(), "No active session; snapshot not sent");
            return;
        }
        if let Err(err) = self.channel.send_snapshot(&self.view.snapshot()) {
            warn!(channel = self.channel.name(), error = %err, "Snapshot dropped");
        }
    }
}

fn is_goal_reached(current_intake: i64, daily_goal: i64) -> bool {
    current_intake >= daily_goal && current_intake > 0
}
