//! Session Registry
//!
//! Owns every live session. A single mutex guards creation, closing,
//! termination and broadcast traversal, so a broadcast never races a
//! concurrent create or expiry.

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::connection::Connection;
use super::state::{Session, SessionId, SessionInfo};
use crate::messaging::DomainMessage;

/// Fixed session lifetime, not renewed by activity
pub const SESSION_TTL: Duration = Duration::from_secs(10 * 60);

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Registry of live listener sessions
pub struct SessionRegistry {
    /// Live sessions (session_id -> Session)
    sessions: Mutex<BTreeMap<SessionId, Session>>,
    /// Next id to hand out
    next_id: AtomicU64,
    /// Expiry timers still waiting
    pending_expiries: AtomicUsize,
    /// Session lifetime
    ttl: Duration,
}

impl SessionRegistry {
    /// Create a registry with the standard ten minute lifetime
    pub fn new() -> Self {
        Self::with_ttl(SESSION_TTL)
    }

    /// Create with a custom session lifetime
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            pending_expiries: AtomicUsize::new(0),
            ttl,
        }
    }

    /// Register a connection and schedule its expiry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(self: &Arc<Self>, key: impl Into<String>, connection: Arc<dyn Connection>) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::days(365));

        let session = Session::new(id, key, connection, ttl).with_expiry_cancel(cancel_tx);
        let key = session.key.clone();
        self.sessions.lock().insert(id, session);

        self.pending_expiries.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(expire_after(Arc::downgrade(self), id, self.ttl, cancel_rx));

        info!("Created session, session={} connection={}", id, key);
        id
    }

    /// Close a session's connection and remove it.
    ///
    /// Returns false when the session is already gone.
    pub fn close(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.lock();
        let Some(mut session) = sessions.remove(&id) else {
            debug!("Session already closed, session={}", id);
            return false;
        };

        if let Err(e) = session.close() {
            warn!("Error closing connection, session={} connection={}: {}", id, session.key, e);
        }
        info!(
            "Session terminated and connection closed, session={} connection={}",
            id, session.key
        );
        true
    }

    /// Close every session, returns how many were terminated
    pub fn terminate_all(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let count = sessions.len();

        for (id, mut session) in std::mem::take(&mut *sessions) {
            if let Err(e) = session.close() {
                warn!("Error closing connection, session={} connection={}: {}", id, session.key, e);
            }
        }

        info!("All sessions terminated, count={}", count);
        count
    }

    /// Send a message to every live session.
    ///
    /// The message is encoded once. A failing session is logged and skipped;
    /// the remaining sessions still receive the message.
    pub fn broadcast(&self, message: &DomainMessage) -> BroadcastReport {
        let payload: Arc<str> = match message.encode() {
            Ok(text) => Arc::from(text),
            Err(e) => {
                error!("Failed to encode {} message: {}", message.kind(), e);
                return BroadcastReport::default();
            }
        };

        let sessions = self.sessions.lock();
        let mut report = BroadcastReport::default();

        for session in sessions.values() {
            match session.connection.send(Arc::clone(&payload)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        "Error broadcasting to session, session={} connection={}: {}",
                        session.id, session.key, e
                    );
                }
            }
        }

        debug!(
            "Broadcast {}, delivered={} failed={}",
            message.kind(),
            report.delivered,
            report.failed
        );
        report
    }

    /// Check if a session is live
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.lock().contains_key(&id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Number of expiry timers that have neither fired nor been released
    pub fn pending_expiries(&self) -> usize {
        self.pending_expiries.load(Ordering::SeqCst)
    }

    /// Snapshot of live sessions, ordered by id
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.lock().values().map(SessionInfo::from).collect()
    }

    /// Periodically log the live session count.
    ///
    /// Stops on its own once the registry is dropped.
    pub fn spawn_status_ticker(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else { break };
                debug!(
                    "Live sessions: {}, pending expiries: {}",
                    registry.len(),
                    registry.pending_expiries()
                );
            }
        })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot expiry timer, released early when the session closes
async fn expire_after(
    registry: Weak<SessionRegistry>,
    id: SessionId,
    ttl: Duration,
    cancel_rx: oneshot::Receiver<()>,
) {
    tokio::select! {
        _ = tokio::time::sleep(ttl) => {
            if let Some(registry) = registry.upgrade() {
                if registry.contains(id) {
                    info!("Session expired, session={}", id);
                    registry.close(id);
                }
            }
        }
        _ = cancel_rx => {
            debug!("Expiry timer released, session={}", id);
        }
    }

    if let Some(registry) = registry.upgrade() {
        registry.pending_expiries.fetch_sub(1, Ordering::SeqCst);
    }
}
