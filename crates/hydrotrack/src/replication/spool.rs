//! Directory-based replication between two processes on one host.
//!
//! Each device owns an inbox directory. Sending writes the snapshot as a JSON
//! file into the peer's inbox; the receiving side sweeps its own inbox on an
//! interval and forwards what it finds to the tracker's inbound queue. Like a
//! queued user-info transfer, a snapshot written while the peer is not
//! running waits in its inbox until the peer next activates.
//!
//! File names start with a UTC timestamp so a lexical sort is delivery order.
//! Files are written under a dot-prefixed temporary name and renamed into
//! place, so a sweep never reads a half-written snapshot.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::{ReplicationChannel, SessionHandle, SessionStatus, Snapshot};
use crate::config::Config;
use crate::error::{Error, Result};

const CHANNEL_NAME: &str = "spool";

/// Extension of delivered snapshot files.
const SNAPSHOT_EXTENSION: &str = "json";

/// Suffix appended to files that could not be decoded.
const REJECTED_SUFFIX: &str = "rejected";

/// Replication through a pair of inbox directories.
#[derive(Debug)]
pub struct SpoolChannel {
    inbox: PathBuf,
    peer_inbox: Option<PathBuf>,
    poll_interval: Duration,
    handle: Option<SessionHandle>,
    activated_at: Option<DateTime<Utc>>,
    sent: AtomicU64,
    received: Arc<AtomicU64>,
}

impl SpoolChannel {
    /// Create a channel reading from `inbox` and writing to `peer_inbox`.
    #[must_use]
    pub fn new(
        inbox: impl Into<PathBuf>,
        peer_inbox: Option<PathBuf>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inbox: inbox.into(),
            peer_inbox,
            poll_interval,
            handle: None,
            activated_at: None,
            sent: AtomicU64::new(0),
            received: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a channel from the `[replication]` configuration section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.inbox_dir(),
            config.replication.peer_inbox_dir.clone(),
            config.poll_interval(),
        )
    }

    /// The directory this channel receives snapshots in.
    #[must_use]
    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    /// Forward waiting snapshots from `inbox` into `inbound`.
    ///
    /// Files are removed only once enqueued. When the queue is full the sweep
    /// stops and the remaining files wait for the next one. Files that do not
    /// decode are renamed with a `.rejected` suffix and skipped.
    ///
    /// Returns the number of snapshots enqueued.
    ///
    /// # Errors
    ///
    /// Returns an error if the inbox cannot be listed.
    pub fn sweep(inbox: &Path, inbound: &mpsc::Sender<Snapshot>) -> Result<usize> {
        let mut pending: Vec<PathBuf> = std::fs::read_dir(inbox)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_snapshot_file(path))
            .collect();
        pending.sort();

        let mut delivered = 0;
        for path in pending {
            let snapshot = match std::fs::read(&path)
                .map_err(Error::from)
                .and_then(|bytes| Snapshot::from_json(&bytes))
            {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "Rejecting undecodable snapshot");
                    let mut rejected = path.clone().into_os_string();
                    rejected.push(".");
                    rejected.push(REJECTED_SUFFIX);
                    std::fs::rename(&path, rejected)?;
                    continue;
                }
            };

            match inbound.try_send(snapshot) {
                Ok(()) => {
                    std::fs::remove_file(&path)?;
                    delivered += 1;
                }
                Err(TrySendError::Full(_)) => {
                    debug!("Inbound queue full; leaving remaining snapshots for the next sweep");
                    break;
                }
                Err(TrySendError::Closed(_)) => break,
            }
        }

        if delivered > 0 {
            trace!(delivered, "Swept snapshots from inbox");
        }
        Ok(delivered)
    }

    fn write_to_peer(peer_inbox: &Path, snapshot: &Snapshot) -> Result<PathBuf> {
        let file_name = format!(
            "{}-{}.{SNAPSHOT_EXTENSION}",
            Utc::now().format("%Y%m%dT%H%M%S%.6fZ"),
            Uuid::new_v4().simple()
        );
        let staging = peer_inbox.join(format!(".{file_name}.tmp"));
        let target = peer_inbox.join(file_name);

        std::fs::write(&staging, snapshot.to_json()?)?;
        std::fs::rename(&staging, &target)?;
        Ok(target)
    }

    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.should_stop())
    }
}

/// Run [`SpoolChannel::sweep`] on the blocking pool.
async fn sweep_blocking(inbox: PathBuf, inbound: mpsc::Sender<Snapshot>) -> Result<usize> {
    tokio::task::spawn_blocking(move || SpoolChannel::sweep(&inbox, &inbound))
        .await
        .map_err(|err| Error::internal(format!("inbox sweep task failed: {err}")))?
}

fn is_snapshot_file(path: &Path) -> bool {
    let visible = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| !name.starts_with('.'));
    visible && path.extension().is_some_and(|ext| ext == SNAPSHOT_EXTENSION)
}

#[async_trait::async_trait]
impl ReplicationChannel for SpoolChannel {
    fn name(&self) -> &'static str {
        CHANNEL_NAME
    }

    async fn activate(&mut self, inbound: mpsc::Sender<Snapshot>) -> Result<()> {
        if !self.inbox.exists() {
            std::fs::create_dir_all(&self.inbox).map_err(|source| Error::DirectoryCreate {
                path: self.inbox.clone(),
                source,
            })?;
        }

        if let Some(handle) = self.handle.take() {
            handle.stop();
        }

        let swept = sweep_blocking(self.inbox.clone(), inbound.clone())
            .await
            .map_err(|err| Error::session_activate(CHANNEL_NAME, err.to_string()))?;
        self.received.fetch_add(swept as u64, Ordering::SeqCst);

        let handle = SessionHandle::new(CHANNEL_NAME);
        let task_handle = handle.clone();
        let inbox = self.inbox.clone();
        let received = Arc::clone(&self.received);
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if task_handle.should_stop() || inbound.is_closed() {
                    break;
                }
                match sweep_blocking(inbox.clone(), inbound.clone()).await {
                    Ok(count) => {
                        received.fetch_add(count as u64, Ordering::SeqCst);
                    }
                    Err(err) => warn!(error = %err, "Inbox sweep failed"),
                }
            }
            debug!(inbox = %inbox.display(), "Inbox polling stopped");
        });

        self.handle = Some(handle);
        self.activated_at = Some(Utc::now());
        info!(
            inbox = %self.inbox.display(),
            swept,
            "Spool session activated"
        );
        Ok(())
    }

    fn is_session_active(&self) -> bool {
        self.is_running() && self.peer_inbox.as_ref().is_some_and(|peer| peer.is_dir())
    }

    fn send_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let peer_inbox = self
            .peer_inbox
            .as_deref()
            .ok_or_else(|| Error::snapshot_send(CHANNEL_NAME, "no peer inbox configured"))?;

        let path = Self::write_to_peer(peer_inbox, snapshot)
            .map_err(|err| Error::snapshot_send(CHANNEL_NAME, err.to_string()))?;
        self.sent.fetch_add(1, Ordering::SeqCst);
        trace!(file = %path.display(), "Snapshot spooled to peer");
        Ok(())
    }

    fn deactivate(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
        self.activated_at = None;
    }

    fn status(&self) -> SessionStatus {
        if self.peer_inbox.is_none() {
            return SessionStatus::unpaired(CHANNEL_NAME);
        }
        let active = self.is_session_active();
        let message = if active {
            "Peer inbox reachable".to_string()
        } else if self.is_running() {
            "Peer inbox missing".to_string()
        } else {
            "Session not activated".to_string()
        };
        SessionStatus {
            channel: CHANNEL_NAME,
            active,
            activated_at: self.activated_at,
            sent: self.sent.load(Ordering::SeqCst),
            received: self.received.load(Ordering::SeqCst),
            message,
        }
    }
}

impl Drop for SpoolChannel {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
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

    fn inbox_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_is_snapshot_file() {
        assert!(is_snapshot_file(Path::new("/in/20240721T101500.000000Z-ab.json")));
        assert!(!is_snapshot_file(Path::new("/in/.20240721T101500Z-ab.json.tmp")));
        assert!(!is_snapshot_file(Path::new("/in/.hidden.json")));
        assert!(!is_snapshot_file(Path::new("/in/x.json.rejected")));
    }

    #[test]
    fn test_send_writes_file_into_peer_inbox() {
        let dir = tempfile::tempdir().unwrap();
        let channel = SpoolChannel::new(
            dir.path().join("mine"),
            Some(dir.path().to_path_buf()),
            Duration::from_secs(1),
        );

        channel.send_snapshot(&intake(700)).unwrap();

        let files = inbox_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with(".json"));
        let bytes = std::fs::read(dir.path().join(&files[0])).unwrap();
        assert_eq!(Snapshot::from_json(&bytes).unwrap(), intake(700));
        assert_eq!(channel.status().sent, 1);
    }

    #[test]
    fn test_send_without_peer_fails() {
        let channel = SpoolChannel::new("/tmp/unused", None, Duration::from_secs(1));
        let err = channel.send_snapshot(&intake(1)).unwrap_err();
        assert!(err.is_replication_error());
        assert_eq!(channel.status(), SessionStatus::unpaired("spool"));
    }

    #[test]
    fn test_sweep_delivers_in_order_and_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("20240101T000002Z-b.json"), br#"{"currentIntake":2}"#)
            .unwrap();
        std::fs::write(dir.path().join("20240101T000001Z-a.json"), br#"{"currentIntake":1}"#)
            .unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let delivered = SpoolChannel::sweep(dir.path(), &tx).unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(rx.try_recv().unwrap(), intake(1));
        assert_eq!(rx.try_recv().unwrap(), intake(2));
        assert!(inbox_files(dir.path()).is_empty());
    }

    #[test]
    fn test_sweep_rejects_undecodable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("20240101T000001Z-a.json"), b"[not an object]").unwrap();
        std::fs::write(dir.path().join("20240101T000002Z-b.json"), br#"{"dailyGoal":2400}"#)
            .unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let delivered = SpoolChannel::sweep(dir.path(), &tx).unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(rx.try_recv().unwrap().daily_goal, Some(2400));
        assert_eq!(
            inbox_files(dir.path()),
            vec!["20240101T000001Z-a.json.rejected".to_string()]
        );
    }

    #[test]
    fn test_sweep_leaves_files_when_queue_full() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=3 {
            std::fs::write(
                dir.path().join(format!("20240101T00000{i}Z.json")),
                format!(r#"{{"currentIntake":{i}}}"#),
            )
            .unwrap();
        }
        let (tx, mut rx) = mpsc::channel(1);

        assert_eq!(SpoolChannel::sweep(dir.path(), &tx).unwrap(), 1);
        assert_eq!(inbox_files(dir.path()).len(), 2);

        assert_eq!(rx.try_recv().unwrap(), intake(1));
        assert_eq!(SpoolChannel::sweep(dir.path(), &tx).unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), intake(2));
    }

    #[tokio::test]
    async fn test_activate_creates_inbox_and_sweeps_backlog() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("phone");
        std::fs::create_dir_all(&inbox).unwrap();
        std::fs::write(inbox.join("20240101T000001Z.json"), br#"{"currentIntake":900}"#).unwrap();

        let mut channel = SpoolChannel::new(&inbox, None, Duration::from_millis(20));
        let (tx, mut rx) = mpsc::channel(8);
        channel.activate(tx).await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), intake(900));
        assert!(!channel.is_session_active());
        channel.deactivate();
    }

    #[tokio::test]
    async fn test_session_active_requires_peer_inbox() {
        let dir = tempfile::tempdir().unwrap();
        let peer = dir.path().join("watch");
        let mut channel = SpoolChannel::new(
            dir.path().join("phone"),
            Some(peer.clone()),
            Duration::from_millis(20),
        );
        let (tx, _rx) = mpsc::channel(8);
        channel.activate(tx).await.unwrap();

        assert!(!channel.is_session_active());
        assert!(channel.status().message.contains("missing"));

        std::fs::create_dir_all(&peer).unwrap();
        assert!(channel.is_session_active());

        channel.deactivate();
        assert!(!channel.is_session_active());
        assert!(channel.status().message.contains("not activated"));
    }

    #[tokio::test]
    async fn test_sweep_blocking_forwards_backlog() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=5 {
            std::fs::write(
                dir.path().join(format!("20240101T00000{i}Z.json")),
                format!(r#"{{"currentIntake":{i}}}"#),
            )
            .unwrap();
        }
        let (tx, mut rx) = mpsc::channel(8);

        let delivered = sweep_blocking(dir.path().to_path_buf(), tx).await.unwrap();

        assert_eq!(delivered, 5);
        for i in 1..=5 {
            assert_eq!(rx.try_recv().unwrap(), intake(i));
        }
        assert!(inbox_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_sweep_blocking_reports_missing_inbox() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);

        let result = sweep_blocking(dir.path().join("absent"), tx).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_polling_picks_up_later_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let phone_inbox = dir.path().join("phone");
        let watch_inbox = dir.path().join("watch");
        std::fs::create_dir_all(&phone_inbox).unwrap();

        let mut phone = SpoolChannel::new(&phone_inbox, None, Duration::from_millis(10));
        let (tx, mut rx) = mpsc::channel(8);
        phone.activate(tx).await.unwrap();

        let watch = SpoolChannel::new(
            &watch_inbox,
            Some(phone_inbox.clone()),
            Duration::from_millis(10),
        );
        watch.send_snapshot(&intake(1500)).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(intake(1500)));
        phone.deactivate();
    }
}
