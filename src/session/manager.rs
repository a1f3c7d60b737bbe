//! Session admission and termination.

use super::balance::{BalanceTracker, BalanceTrackerFactory};
use super::nat::NatQueueFactory;
use super::storage::SessionStore;
use super::{Done, IdGenerator, ServiceConfiguration, Session, SessionId};
use crate::error::{Error, Result};
use crate::event::{NodeEvent, Publisher};
use crate::identity::Identity;
use crate::market::{ProposalId, ServiceProposal};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Pending shutdown notices kept for slow listeners.
const SHUTDOWN_CHANNEL_CAPACITY: usize = 16;

/// Broadcast telling the owner of the previous session's tunnel to let go.
///
/// Each notice carries the ID of the session that supersedes it. Listeners
/// that subscribe later only see notices sent after they subscribed.
#[derive(Debug, Clone)]
pub struct LastSessionShutdown {
    tx: broadcast::Sender<SessionId>,
}

impl LastSessionShutdown {
    /// Create a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SHUTDOWN_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Listen for shutdown notices.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionId> {
        self.tx.subscribe()
    }

    /// Notify all listeners that `superseded_by` is taking over.
    ///
    /// Returns the number of listeners reached.
    pub fn signal(&self, superseded_by: &SessionId) -> usize {
        self.tx.send(superseded_by.clone()).unwrap_or(0)
    }
}

impl Default for LastSessionShutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Admits consumers into sessions and owns their lifecycle.
pub struct SessionManager {
    current_proposal: ServiceProposal,
    generate_id: IdGenerator,
    store: Arc<dyn SessionStore>,
    tracker_factory: BalanceTrackerFactory,
    nat_queue_factory: NatQueueFactory,
    last_session_shutdown: LastSessionShutdown,
    publisher: Option<Arc<dyn Publisher>>,
    creation_lock: Mutex<()>,
}

impl SessionManager {
    /// Create a manager serving `current_proposal`.
    #[must_use]
    pub fn new(
        current_proposal: ServiceProposal,
        generate_id: IdGenerator,
        store: Arc<dyn SessionStore>,
        tracker_factory: BalanceTrackerFactory,
        nat_queue_factory: NatQueueFactory,
        last_session_shutdown: LastSessionShutdown,
    ) -> Self {
        Self {
            current_proposal,
            generate_id,
            store,
            tracker_factory,
            nat_queue_factory,
            last_session_shutdown,
            publisher: None,
            creation_lock: Mutex::new(()),
        }
    }

    /// Publish session lifecycle events to `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// The proposal sessions are admitted against.
    #[must_use]
    pub fn current_proposal(&self) -> &ServiceProposal {
        &self.current_proposal
    }

    /// Admit `consumer_id` into a new session.
    ///
    /// `issuer_id` is the identity issuing payment promises for the session;
    /// the provider handed to the tracker factory is the current proposal's.
    ///
    /// The returned session is already live: its balance tracker runs as a
    /// separate task. If the tracker fails, the session's [`Done`] fires and
    /// the record is dropped; that failure is not reported here.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidProposal`] if `proposal_id` is not the current one
    /// - any error from the ID generator or the tracker factory, unchanged
    ///
    /// Nothing is stored on any error path.
    pub async fn create(
        &self,
        consumer_id: Identity,
        issuer_id: Identity,
        proposal_id: ProposalId,
        config: ServiceConfiguration,
        request_config: serde_json::Value,
    ) -> Result<Session> {
        let _guard = self.creation_lock.lock();

        if proposal_id != self.current_proposal.id {
            debug!(
                "Rejecting session for {}: proposal {} is not current ({})",
                consumer_id, proposal_id, self.current_proposal.id
            );
            return Err(Error::InvalidProposal);
        }

        let id = (self.generate_id)()?;
        let tracker =
            (self.tracker_factory)(&consumer_id, &self.current_proposal.provider_id, &issuer_id)?;

        let session = Session {
            id,
            consumer_id,
            created_at: chrono::Utc::now(),
            config,
            request_config,
            nat_signals: (self.nat_queue_factory)(),
            done: Done::new(),
        };

        // The previous tunnel owner must hear this before the new session is visible.
        let listeners = self.last_session_shutdown.signal(&session.id);
        debug!(
            "Last session shutdown signalled to {} listener(s) for {}",
            listeners, session.id
        );

        self.store.add(session.clone());
        info!(
            "Session {} created for consumer {} (issuer {})",
            session.id, session.consumer_id, issuer_id
        );
        if let Some(publisher) = &self.publisher {
            publisher.publish(NodeEvent::SessionCreated {
                session_id: session.id.clone(),
                consumer_id: session.consumer_id.clone(),
            });
        }

        self.spawn_tracker(&session, tracker);
        Ok(session)
    }

    fn spawn_tracker(&self, session: &Session, tracker: Arc<dyn BalanceTracker>) {
        let done = session.done.clone();
        let stopping = Arc::clone(&tracker);
        tokio::spawn(async move {
            done.wait().await;
            stopping.stop();
        });

        let done = session.done.clone();
        let id = session.id.clone();
        let store = Arc::clone(&self.store);
        let publisher = self.publisher.clone();
        tokio::spawn(async move {
            if let Err(e) = tracker.start().await {
                error!("Balance tracker for session {} failed: {}", id, e);
                terminate(store.as_ref(), publisher.as_deref(), &id, &done);
            }
        });
    }

    /// Look up a session owned by `consumer_id`.
    #[must_use]
    pub fn find_session(&self, consumer_id: &Identity, session_id: &SessionId) -> Option<Session> {
        self.store
            .find(session_id)
            .filter(|session| &session.consumer_id == consumer_id)
    }

    /// End a session on behalf of its consumer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] for an unknown ID and
    /// [`Error::WrongSessionOwner`] if the session belongs to someone else.
    pub fn destroy(&self, consumer_id: &Identity, session_id: &SessionId) -> Result<()> {
        let session = self
            .store
            .find(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.clone()))?;

        if &session.consumer_id != consumer_id {
            return Err(Error::WrongSessionOwner(consumer_id.clone()));
        }

        terminate(
            self.store.as_ref(),
            self.publisher.as_deref(),
            session_id,
            &session.done,
        );
        info!("Session {} destroyed by consumer {}", session_id, consumer_id);
        Ok(())
    }

    /// End every live session. Returns how many were ended.
    pub fn destroy_all(&self) -> usize {
        let sessions = self.store.get_all();
        for session in &sessions {
            terminate(
                self.store.as_ref(),
                self.publisher.as_deref(),
                &session.id,
                &session.done,
            );
        }
        sessions.len()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.store.len()
    }
}

fn terminate(
    store: &dyn SessionStore,
    publisher: Option<&dyn Publisher>,
    id: &SessionId,
    done: &Done,
) {
    store.remove(id);
    if done.close() {
        if let Some(publisher) = publisher {
            publisher.publish(NodeEvent::SessionClosed {
                session_id: id.clone(),
            });
        }
    }
}
