//! Best-effort replication of tracker state to a paired device.
//!
//! A [`ReplicationChannel`] carries [`Snapshot`]s between two devices. Sending
//! is fire-and-forget: there is no acknowledgement, retry or ordering
//! guarantee, and a snapshot sent while the peer is unreachable is lost.
//! Inbound snapshots are pushed into the `mpsc` queue handed over at
//! activation; the owner of the tracker drains that queue on its own task.

pub mod paired;
pub mod session;
pub mod snapshot;
pub mod spool;

use std::fmt;

use tokio::sync::mpsc;

use crate::error::Result;

pub use paired::{paired, LinkHandle, PairedChannel};
pub use session::{SessionHandle, SessionStatus};
pub use snapshot::{PresetPayload, Snapshot};
pub use spool::SpoolChannel;

/// A messaging channel to a paired device.
#[async_trait::async_trait]
pub trait ReplicationChannel: Send + Sync + fmt::Debug {
    /// The name of this channel (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Establish the session and register where inbound snapshots go.
    ///
    /// Activating an already active channel replaces the inbound queue and
    /// otherwise leaves the session as it is.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be established.
    async fn activate(&mut self, inbound: mpsc::Sender<Snapshot>) -> Result<()>;

    /// Whether a snapshot sent now could reach the peer.
    fn is_session_active(&self) -> bool;

    /// Push a snapshot to the peer without waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot could not be handed off.
    fn send_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Tear the session down and stop any background work.
    fn deactivate(&mut self);

    /// Current session status.
    fn status(&self) -> SessionStatus;
}

/// A channel with nothing on the other end.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

#[async_trait::async_trait]
impl ReplicationChannel for Offline {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn activate(&mut self, _inbound: mpsc::Sender<Snapshot>) -> Result<()> {
        Ok(())
    }

    fn is_session_active(&self) -> bool {
        false
    }

    fn send_snapshot(&self, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }

    fn deactivate(&mut self) {}

    fn status(&self) -> SessionStatus {
        SessionStatus::unpaired(self.name())
    }
}
