//! Node wiring: event bus, channel repository and session manager.

use crate::config::{NodeConfig, TrackerMode};
use crate::error::{Error, Result};
use crate::event::{EventBus, NodeEvent, NodeEventsChannel, Publisher};
use crate::identity::Identity;
use crate::pingpong::{
    HermesBalanceTracker, HermesChannelRepository, HermesPromiseStorage, MemoryPromiseStorage,
    ProviderChannelStatusProvider,
};
use crate::session::{
    generate_session_id, noop_tracker_factory, BalanceTrackerFactory, IdGenerator,
    LastSessionShutdown, MemorySessionStore, NatSignalQueue, SessionId, SessionManager,
    SessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Builder for constructing a paygate node.
pub struct NodeBuilder {
    config: NodeConfig,
    channel_provider: Option<Arc<dyn ProviderChannelStatusProvider>>,
    promise_storage: Option<Arc<dyn HermesPromiseStorage>>,
    tracker_factory: Option<BalanceTrackerFactory>,
    id_generator: Option<IdGenerator>,
    session_store: Option<Arc<dyn SessionStore>>,
}

impl NodeBuilder {
    /// Create a new node builder with the given configuration.
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            channel_provider: None,
            promise_storage: None,
            tracker_factory: None,
            id_generator: None,
            session_store: None,
        }
    }

    /// Source of on-chain provider channel state. Required.
    #[must_use]
    pub fn with_channel_provider(mut self, provider: Arc<dyn ProviderChannelStatusProvider>) -> Self {
        self.channel_provider = Some(provider);
        self
    }

    /// Promise storage. Defaults to [`MemoryPromiseStorage`].
    #[must_use]
    pub fn with_promise_storage(mut self, storage: Arc<dyn HermesPromiseStorage>) -> Self {
        self.promise_storage = Some(storage);
        self
    }

    /// Override the balance tracker picked from the configuration.
    #[must_use]
    pub fn with_tracker_factory(mut self, factory: BalanceTrackerFactory) -> Self {
        self.tracker_factory = Some(factory);
        self
    }

    /// Override the session ID generator.
    #[must_use]
    pub fn with_id_generator(mut self, generator: IdGenerator) -> Self {
        self.id_generator = Some(generator);
        self
    }

    /// Override the session store. Defaults to [`MemorySessionStore`].
    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Wire the node components.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the channel
    /// provider is missing.
    pub fn build(self) -> Result<RunningNode> {
        info!("Building paygate-node with config: {:?}", self.config);

        let proposal = self.config.proposal.to_proposal()?;
        let hermes_id = self.config.payment.hermes_identity()?;

        let channel_provider = self.channel_provider.ok_or_else(|| {
            Error::Config("no provider channel status source configured".to_string())
        })?;
        let promise_storage = self
            .promise_storage
            .unwrap_or_else(|| Arc::new(MemoryPromiseStorage::new()));

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let events = Arc::new(EventBus::new());
        let repository = Arc::new(HermesChannelRepository::new(
            promise_storage,
            channel_provider,
            Arc::clone(&events) as Arc<dyn Publisher>,
        ));

        let tracker_factory = match (self.tracker_factory, self.config.session.tracker) {
            (Some(factory), _) => factory,
            (None, TrackerMode::Noop) => noop_tracker_factory(),
            (None, TrackerMode::Hermes) => {
                let hermes = hermes_id.clone().ok_or_else(|| {
                    Error::Config("payment.hermes_id is required for hermes tracking".to_string())
                })?;
                HermesBalanceTracker::factory(
                    Arc::clone(&repository),
                    hermes,
                    self.config.payment.tracker_config(),
                )
            }
        };

        let last_session_shutdown = LastSessionShutdown::new();
        let session_manager = Arc::new(
            SessionManager::new(
                proposal,
                self.id_generator
                    .unwrap_or_else(|| Arc::new(generate_session_id)),
                self.session_store
                    .unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
                tracker_factory,
                NatSignalQueue::single_slot_factory(),
                last_session_shutdown.clone(),
            )
            .with_publisher(Arc::clone(&events) as Arc<dyn Publisher>),
        );

        Ok(RunningNode {
            config: self.config,
            hermes_id,
            shutdown_tx,
            shutdown_rx,
            events,
            repository,
            session_manager,
            last_session_shutdown,
        })
    }
}

/// A running paygate node.
pub struct RunningNode {
    config: NodeConfig,
    hermes_id: Option<Identity>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    events: Arc<EventBus>,
    repository: Arc<HermesChannelRepository>,
    session_manager: Arc<SessionManager>,
    last_session_shutdown: LastSessionShutdown,
}

impl RunningNode {
    /// The node configuration.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Session admission and lifecycle.
    #[must_use]
    pub fn session_manager(&self) -> Arc<SessionManager> {
        Arc::clone(&self.session_manager)
    }

    /// Hermes channel reconciliation.
    #[must_use]
    pub fn channel_repository(&self) -> Arc<HermesChannelRepository> {
        Arc::clone(&self.repository)
    }

    /// Subscribe to node events.
    #[must_use]
    pub fn subscribe_events(&self) -> NodeEventsChannel {
        self.events.subscribe()
    }

    /// Subscribe to "last session shutdown" notices, for the component that
    /// owns the tunnel of the current session.
    #[must_use]
    pub fn subscribe_last_session_shutdown(&self) -> broadcast::Receiver<SessionId> {
        self.last_session_shutdown.subscribe()
    }

    /// Run the node until shutdown is requested.
    ///
    /// Live sessions are destroyed on the way out.
    ///
    /// # Errors
    ///
    /// Returns an error if the node encounters a fatal error.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting paygate-node for proposal {}",
            self.session_manager.current_proposal().id
        );

        self.events.publish(NodeEvent::Started);

        if let (Some(hermes_id), Some(interval)) = (
            self.hermes_id.clone(),
            self.config.payment.earnings_refresh_interval(),
        ) {
            self.spawn_earnings_refresh(hermes_id, interval);
        }

        info!("Node running, waiting for shutdown signal");

        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    self.shutdown();
                    break;
                }
            }
        }

        let closed = self.session_manager.destroy_all();
        info!("Closed {} live session(s)", closed);

        self.events.publish(NodeEvent::ShuttingDown);
        info!("Node shutdown complete");
        Ok(())
    }

    fn spawn_earnings_refresh(&self, hermes_id: Identity, interval: Duration) {
        let repository = Arc::clone(&self.repository);
        let events = Arc::clone(&self.events);
        let provider_id = self.session_manager.current_proposal().provider_id.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match repository.fetch(&provider_id, &hermes_id).await {
                            Ok(channel) => debug!(
                                "Refreshed earnings of {}: balance {}",
                                provider_id,
                                channel.balance()
                            ),
                            Err(e) => {
                                warn!("Earnings refresh failed: {}", e);
                                events.publish(NodeEvent::Error {
                                    message: format!("Earnings refresh failed: {e}"),
                                });
                            }
                        }
                    }
                }
            }
            debug!("Earnings refresh stopped");
        });
    }

    /// Request the node to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
