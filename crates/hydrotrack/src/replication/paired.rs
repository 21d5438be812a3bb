//! In-process pairing of two replication endpoints.
//!
//! [`paired`] returns two connected [`PairedChannel`]s, typically one per
//! tracker, plus a [`LinkHandle`] that can sever and restore the connection
//! to simulate the companion device going out of range.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

use super::{ReplicationChannel, SessionStatus, Snapshot};
use crate::error::{Error, Result};

const CHANNEL_NAME: &str = "paired";

#[derive(Debug, Default)]
struct Endpoint {
    inbound: Mutex<Option<mpsc::Sender<Snapshot>>>,
    received: AtomicU64,
}

impl Endpoint {
    fn is_registered(&self) -> bool {
        self.inbound.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn set(&self, inbound: Option<mpsc::Sender<Snapshot>>) {
        if let Ok(mut slot) = self.inbound.lock() {
            *slot = inbound;
        }
    }
}

/// Shared connectivity switch for a pair of endpoints.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    connected: Arc<AtomicBool>,
}

impl LinkHandle {
    /// Restore connectivity.
    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Drop connectivity; snapshots sent meanwhile are lost.
    pub fn sever(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Whether the endpoints can currently reach each other.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// One side of an in-process device pairing.
#[derive(Debug)]
pub struct PairedChannel {
    local: Arc<Endpoint>,
    remote: Arc<Endpoint>,
    link: LinkHandle,
    activated_at: Option<DateTime<Utc>>,
    sent: AtomicU64,
}

/// Create two endpoints linked to each other, initially connected.
#[must_use]
pub fn paired() -> (PairedChannel, PairedChannel, LinkHandle) {
    let link = LinkHandle {
        connected: Arc::new(AtomicBool::new(true)),
    };
    let a = Arc::new(Endpoint::default());
    let b = Arc::new(Endpoint::default());

    let first = PairedChannel {
        local: Arc::clone(&a),
        remote: Arc::clone(&b),
        link: link.clone(),
        activated_at: None,
        sent: AtomicU64::new(0),
    };
    let second = PairedChannel {
        local: b,
        remote: a,
        link: link.clone(),
        activated_at: None,
        sent: AtomicU64::new(0),
    };
    (first, second, link)
}

#[async_trait::async_trait]
impl ReplicationChannel for PairedChannel {
    fn name(&self) -> &'static str {
        CHANNEL_NAME
    }

    async fn activate(&mut self, inbound: mpsc::Sender<Snapshot>) -> Result<()> {
        self.local.set(Some(inbound));
        if self.activated_at.is_none() {
            self.activated_at = Some(Utc::now());
        }
        Ok(())
    }

    fn is_session_active(&self) -> bool {
        self.activated_at.is_some() && self.link.is_connected() && self.remote.is_registered()
    }

    fn send_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        if !self.link.is_connected() {
            return Err(Error::snapshot_send(CHANNEL_NAME, "peer unreachable"));
        }

        let slot = self
            .remote
            .inbound
            .lock()
            .map_err(|_| Error::internal("paired endpoint lock poisoned"))?;
        let Some(peer) = slot.as_ref() else {
            return Err(Error::snapshot_send(CHANNEL_NAME, "peer not activated"));
        };

        match peer.try_send(snapshot.clone()) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::SeqCst);
                self.remote.received.fetch_add(1, Ordering::SeqCst);
                trace!("Snapshot handed to paired endpoint");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                Err(Error::snapshot_send(CHANNEL_NAME, "peer queue full"))
            }
            Err(TrySendError::Closed(_)) => {
                Err(Error::snapshot_send(CHANNEL_NAME, "peer queue closed"))
            }
        }
    }

    fn deactivate(&mut self) {
        self.local.set(None);
        self.activated_at = None;
    }

    fn status(&self) -> SessionStatus {
        let active = self.is_session_active();
        let message = if active {
            "Paired device reachable"
        } else if !self.link.is_connected() {
            "Paired device out of reach"
        } else {
            "Waiting for paired device"
        };
        SessionStatus {
            channel: CHANNEL_NAME,
            active,
            activated_at: self.activated_at,
            sent: self.sent.load(Ordering::SeqCst),
            received: self.local.received.load(Ordering::SeqCst),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake(value: i64) -> Snapshot {
        Snapshot {
            current_intake: Some(value),
            ..Snapshot::default()
        }
    }

    #[tokio::test]
    async fn test_inactive_until_both_sides_activate() {
        let (mut phone, mut watch, _link) = paired();
        let (phone_tx, _phone_rx) = mpsc::channel(4);
        let (watch_tx, _watch_rx) = mpsc::channel(4);

        assert!(!phone.is_session_active());
        phone.activate(phone_tx).await.unwrap();
        assert!(!phone.is_session_active());

        watch.activate(watch_tx).await.unwrap();
        assert!(phone.is_session_active());
        assert!(watch.is_session_active());
    }

    #[tokio::test]
    async fn test_send_delivers_to_peer_queue() {
        let (mut phone, mut watch, _link) = paired();
        let (phone_tx, _phone_rx) = mpsc::channel(4);
        let (watch_tx, mut watch_rx) = mpsc::channel(4);
        phone.activate(phone_tx).await.unwrap();
        watch.activate(watch_tx).await.unwrap();

        phone.send_snapshot(&intake(500)).unwrap();

        assert_eq!(watch_rx.try_recv().unwrap(), intake(500));
        assert_eq!(phone.status().sent, 1);
        assert_eq!(watch.status().received, 1);
    }

    #[tokio::test]
    async fn test_severed_link_drops_snapshots() {
        let (mut phone, mut watch, link) = paired();
        let (phone_tx, _phone_rx) = mpsc::channel(4);
        let (watch_tx, mut watch_rx) = mpsc::channel(4);
        phone.activate(phone_tx).await.unwrap();
        watch.activate(watch_tx).await.unwrap();

        link.sever();
        assert!(!phone.is_session_active());
        assert!(phone.send_snapshot(&intake(1)).is_err());
        assert!(watch_rx.try_recv().is_err());
        assert!(phone.status().message.contains("out of reach"));

        link.connect();
        assert!(phone.is_session_active());
    }

    #[tokio::test]
    async fn test_full_peer_queue_drops_snapshot() {
        let (mut phone, mut watch, _link) = paired();
        let (phone_tx, _phone_rx) = mpsc::channel(4);
        let (watch_tx, mut watch_rx) = mpsc::channel(1);
        phone.activate(phone_tx).await.unwrap();
        watch.activate(watch_tx).await.unwrap();

        phone.send_snapshot(&intake(1)).unwrap();
        let err = phone.send_snapshot(&intake(2)).unwrap_err();
        assert!(err.to_string().contains("queue full"));
        assert_eq!(watch_rx.try_recv().unwrap(), intake(1));
    }

    #[tokio::test]
    async fn test_deactivate_unregisters_endpoint() {
        let (mut phone, mut watch, _link) = paired();
        let (phone_tx, _phone_rx) = mpsc::channel(4);
        let (watch_tx, _watch_rx) = mpsc::channel(4);
        phone.activate(phone_tx).await.unwrap();
        watch.activate(watch_tx).await.unwrap();

        watch.deactivate();
        assert!(!phone.is_session_active());
        assert!(watch.status().activated_at.is_none());
        assert!(phone.status().message.contains("Waiting"));
    }
}
