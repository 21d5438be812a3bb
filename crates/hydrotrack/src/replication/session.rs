//! Session bookkeeping shared by the replication channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time description of a replication session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    /// Name of the channel carrying the session.
    pub channel: &'static str,
    /// Whether snapshots would currently be sent.
    pub active: bool,
    /// When the session was last activated.
    pub activated_at: Option<DateTime<Utc>>,
    /// Snapshots handed to the peer since activation.
    pub sent: u64,
    /// Snapshots received from the peer since activation.
    pub received: u64,
    /// Human-readable status message.
    pub message: String,
}

impl SessionStatus {
    /// Status for a channel that has nothing paired.
    #[must_use]
    pub fn unpaired(channel: &'static str) -> Self {
        Self {
            channel,
            active: false,
            activated_at: None,
            sent: 0,
            received: 0,
            message: "No paired device".to_string(),
        }
    }
}

/// Cloneable stop signal for a channel's background work.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    channel: &'static str,
    stop_signal: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Create a new session handle.
    #[must_use]
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            stop_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Name of the channel this handle belongs to.
    #[must_use]
    pub fn channel(&self) -> &'static str {
        self.channel
    }

    /// Signal the background work to stop.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpaired_status() {
        let status = SessionStatus::unpaired("offline");
        assert_eq!(status.channel, "offline");
        assert!(!status.active);
        assert!(status.activated_at.is_none());
        assert_eq!(status.sent, 0);
        assert!(status.message.contains("No paired device"));
    }

    #[test]
    fn test_session_handle_stop() {
        let handle = SessionHandle::new("spool");
        assert_eq!(handle.channel(), "spool");
        assert!(!handle.should_stop());

        handle.stop();
        assert!(handle.should_stop());
    }

    #[test]
    fn test_session_handle_clone_shares_signal() {
        let handle1 = SessionHandle::new("spool");
        let handle2 = handle1.clone();

        handle1.stop();
        assert!(handle2.should_stop());
    }
}
