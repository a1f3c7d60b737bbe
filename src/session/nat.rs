//! Per-session NAT-traversal signaling queue.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Slots in a session's signaling queue.
const SINGLE_SLOT: usize = 1;

/// Produces a fresh signaling queue for each session.
pub type NatQueueFactory = Arc<dyn Fn() -> NatSignalQueue + Send + Sync>;

/// Asynchronous queue of raw hole-punching handshake payloads.
///
/// The sending side is cloneable. The receiving side is handed out once to
/// whichever component runs the handshake.
#[derive(Debug, Clone)]
pub struct NatSignalQueue {
    tx: mpsc::Sender<Bytes>,
    rx: Arc<Mutex<Option<mpsc::Receiver<Bytes>>>>,
}

impl NatSignalQueue {
    /// Create a queue holding at most one pending payload.
    #[must_use]
    pub fn single_slot() -> Self {
        let (tx, rx) = mpsc::channel(SINGLE_SLOT);
        Self {
            tx,
            rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Factory producing single-slot queues.
    #[must_use]
    pub fn single_slot_factory() -> NatQueueFactory {
        Arc::new(Self::single_slot)
    }

    /// Send a payload, waiting for the slot to free up.
    ///
    /// Returns the payload back if the receiver is gone.
    pub async fn send(&self, payload: Bytes) -> std::result::Result<(), Bytes> {
        self.tx.send(payload).await.map_err(|e| e.0)
    }

    /// Send a payload without waiting.
    ///
    /// Returns the payload back if the slot is occupied or the receiver is gone.
    pub fn try_send(&self, payload: Bytes) -> std::result::Result<(), Bytes> {
        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(p) | mpsc::error::TrySendError::Closed(p) => p,
        })
    }

    /// Take the receiving side. Only the first call gets it.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<Bytes>> {
        self.rx.lock().take()
    }

    /// Returns true if both handles refer to the same queue.
    #[must_use]
    pub fn same_queue(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }
}
