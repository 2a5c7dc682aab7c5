//! Session State
//!
//! A session is the server-side record of one live WebSocket listener.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;

use super::connection::{Connection, LifecycleError};

/// Unique, strictly increasing session identifier
pub type SessionId = u64;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Registered and receiving broadcasts
    Active,
    /// Connection closed, timer released
    Closed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// One live listener
pub struct Session {
    /// Unique session identifier
    pub id: SessionId,
    /// Client supplied `Sec-WebSocket-Key`, used to identify the connection in logs
    pub key: String,
    /// Outbound handle
    pub connection: Arc<dyn Connection>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Expiry timer cancel switch
    expiry_cancel: Option<oneshot::Sender<()>>,
}

impl Session {
    pub fn new(
        id: SessionId,
        key: impl Into<String>,
        connection: Arc<dyn Connection>,
        ttl: chrono::Duration,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id,
            key: key.into(),
            connection,
            created_at,
            expires_at: created_at + ttl,
            status: SessionStatus::Active,
            expiry_cancel: None,
        }
    }

    /// Attach the cancel switch of the session's expiry timer
    pub fn with_expiry_cancel(mut self, cancel: oneshot::Sender<()>) -> Self {
        self.expiry_cancel = Some(cancel);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Release the expiry timer and close the connection.
    ///
    /// The session is `Closed` afterwards even when the connection fails to
    /// close; closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), LifecycleError> {
        if self.status == SessionStatus::Closed {
            return Ok(());
        }
        self.status = SessionStatus::Closed;

        if let Some(cancel) = self.expiry_cancel.take() {
            let _ = cancel.send(());
        }

        self.connection.close()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("status", &self.status)
            .finish()
    }
}

/// Serializable session info for status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub key: String,
    pub status: SessionStatus,
    pub created_at: String,
    pub expires_at: String,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            key: session.key.clone(),
            status: session.status,
            created_at: session.created_at.to_rfc3339(),
            expires_at: session.expires_at.to_rfc3339(),
        }
    }
}
