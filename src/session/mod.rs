//! Payment-gated session lifecycle.
//!
//! A session is admitted by the [`SessionManager`] only against the proposal
//! the node currently advertises. Each admitted session gets:
//!
//! - an opaque ID from an injected generator,
//! - its own single-slot NAT-signaling queue,
//! - a [`BalanceTracker`] running as an independent task,
//! - a [`Done`] signal that fires exactly once when the session ends.
//!
//! ```text
//! create(consumer, issuer, proposal)
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ proposal current?   │── no ──▶ InvalidProposal
//! └─────────┬───────────┘
//!           │ yes
//!           ▼
//!   generate ID, build tracker,
//!   allocate NAT queue
//!           │
//!           ▼
//!   signal last-session shutdown
//!           │
//!           ▼
//!   store record, spawn tracker
//!           │
//!           ▼
//!        Session ──▶ Done fires on tracker failure or destroy
//! ```

mod balance;
mod manager;
mod nat;
mod storage;

pub use balance::{noop_tracker_factory, BalanceTracker, BalanceTrackerFactory, NoopBalanceTracker};
pub use manager::{LastSessionShutdown, SessionManager};
pub use nat::{NatQueueFactory, NatSignalQueue};
pub use storage::{MemorySessionStore, SessionStore};

use crate::error::Result;
use crate::identity::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Opaque session identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create an ID from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Service-specific connection parameters, opaque to the session core.
pub type ServiceConfiguration = serde_json::Value;

/// Source of fresh session IDs.
pub type IdGenerator = Arc<dyn Fn() -> Result<SessionId> + Send + Sync>;

/// Generate a random (UUID v4) session ID.
///
/// # Errors
///
/// Never fails; the signature matches [`IdGenerator`].
pub fn generate_session_id() -> Result<SessionId> {
    Ok(SessionId(uuid::Uuid::new_v4().to_string()))
}

/// One-shot completion signal of a session.
///
/// Cloning shares the signal. It transitions from pending to closed exactly
/// once; any number of tasks may wait on it.
#[derive(Debug, Clone)]
pub struct Done {
    tx: Arc<watch::Sender<bool>>,
}

impl Done {
    /// Create a pending signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the signal.
    ///
    /// Returns `true` if this call performed the transition, `false` if it was
    /// already closed.
    pub fn close(&self) -> bool {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            let closed = *rx.borrow_and_update();
            if closed {
                return;
            }
            // The sender lives as long as `self`, so this cannot observe a drop.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Done {
    fn default() -> Self {
        Self::new()
    }
}

/// A live session record.
///
/// Immutable after creation except for its [`Done`] signal.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Consumer served by this session.
    pub consumer_id: Identity,
    /// When the session was admitted.
    pub created_at: DateTime<Utc>,
    /// Connection parameters handed to the service.
    pub config: ServiceConfiguration,
    /// Raw request parameters sent by the consumer.
    pub request_config: serde_json::Value,
    /// Queue carrying NAT-traversal handshake payloads for this session.
    pub nat_signals: NatSignalQueue,
    /// Fires when the session terminates.
    pub done: Done,
}
