//! Node event system.

use crate::identity::Identity;
use crate::session::SessionId;
use tokio::sync::broadcast;

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Earnings snapshot for one (identity, hermes) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Earnings {
    /// Channel balance net of the latest promise.
    pub lifetime_balance: u128,
    /// Gross channel entitlement, promise-independent.
    pub unsettled_balance: u128,
}

/// Earnings before and after a channel refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarningsChanged {
    /// Identity whose earnings were refreshed.
    pub identity: Identity,
    /// Value published by the previous refresh, zero on the first one.
    pub previous: Earnings,
    /// Value computed by this refresh.
    pub current: Earnings,
}

/// Events emitted by the node.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Node has started successfully.
    Started,

    /// Node is shutting down.
    ShuttingDown,

    /// A session was admitted.
    SessionCreated {
        /// Session identifier.
        session_id: SessionId,
        /// Consumer the session serves.
        consumer_id: Identity,
    },

    /// A session terminated.
    SessionClosed {
        /// Session identifier.
        session_id: SessionId,
    },

    /// A hermes channel was reconciled.
    EarningsChanged(EarningsChanged),

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving node events.
pub type NodeEventsChannel = broadcast::Receiver<NodeEvent>;

/// Sender for node events.
pub type NodeEventsSender = broadcast::Sender<NodeEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (NodeEventsSender, NodeEventsChannel) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}

/// Fire-and-forget sink for node events.
pub trait Publisher: Send + Sync {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: NodeEvent);
}

/// Ordered fan-out of node events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: NodeEventsSender,
}

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = create_event_channel();
        Self { sender }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> NodeEventsChannel {
        self.sender.subscribe()
    }

    /// Underlying sender, for components that publish directly.
    #[must_use]
    pub fn sender(&self) -> &NodeEventsSender {
        &self.sender
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for EventBus {
    fn publish(&self, event: NodeEvent) {
        // No subscribers is not an error for a fire-and-forget bus.
        let _ = self.sender.send(event);
    }
}
