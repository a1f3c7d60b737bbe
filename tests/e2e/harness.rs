//! Test harness that wires a node against in-process collaborators.
//!
//! The `TestHarness` provides a unified interface for E2E tests: a running
//! node, a scriptable provider channel source and the promise storage the
//! node reconciles against.

use async_trait::async_trait;
use paygate_node::config::TrackerMode;
use paygate_node::event::NodeEventsChannel;
use paygate_node::pingpong::{BoxError, HermesPromise, MemoryPromiseStorage, ProviderChannel};
use paygate_node::pingpong::{Amount, ProviderChannelStatusProvider};
use paygate_node::session::SessionId;
use paygate_node::{Identity, NodeBuilder, NodeConfig, RunningNode, Session};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Proposal the harness node advertises.
pub const PROPOSAL_ID: i64 = 68;

/// Provider identity of the harness node.
pub const PROVIDER: &str = "0x00000000000000000000000000000000000000aa";

/// Hermes the harness node is paid through.
pub const HERMES: &str = "0x00000000000000000000000000000000000000bb";

/// Error type for test harness operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Node error
    #[error("Node error: {0}")]
    Node(#[from] paygate_node::Error),

    /// Node task error
    #[error("Node task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Provider channel source whose state tests change at will.
#[derive(Default)]
pub struct TestChannels {
    channels: Mutex<HashMap<(Identity, Identity), ProviderChannel>>,
    failing: Mutex<Option<String>>,
}

impl TestChannels {
    /// Set the on-chain channel of `identity` with `hermes_id`.
    pub fn set(&self, identity: &Identity, hermes_id: &Identity, channel: ProviderChannel) {
        self.channels
            .lock()
            .insert((identity.clone(), hermes_id.clone()), channel);
    }

    /// Make every lookup fail with `reason`, or succeed again with `None`.
    pub fn fail_with(&self, reason: Option<&str>) {
        *self.failing.lock() = reason.map(str::to_string);
    }
}

#[async_trait]
impl ProviderChannelStatusProvider for TestChannels {
    async fn get_provider_channel(
        &self,
        identity: &Identity,
        hermes_id: &Identity,
    ) -> std::result::Result<ProviderChannel, BoxError> {
        if let Some(reason) = self.failing.lock().clone() {
            return Err(reason.into());
        }
        Ok(self
            .channels
            .lock()
            .get(&(identity.clone(), hermes_id.clone()))
            .copied()
            .unwrap_or_default())
    }
}

/// Test harness that manages a running node.
pub struct TestHarness {
    node: Arc<RunningNode>,
    channels: Arc<TestChannels>,
    promises: Arc<MemoryPromiseStorage>,
    task: Option<JoinHandle<paygate_node::Result<()>>>,
}

impl TestHarness {
    /// Build a node metering sessions with the hermes tracker, checking the
    /// channel every second, with a provider channel holding `balance`.
    ///
    /// # Errors
    ///
    /// Returns an error if the node fails to build.
    pub fn setup(balance: Amount) -> Result<Self> {
        let mut config = Self::config();
        config.session.tracker = TrackerMode::Hermes;
        Self::setup_with_config(config, balance)
    }

    /// Start a node from `config` with a provider channel holding `balance`.
    ///
    /// # Errors
    ///
    /// Returns an error if the node fails to build.
    pub fn setup_with_config(config: NodeConfig, balance: Amount) -> Result<Self> {
        info!("Setting up test harness for proposal {}", config.proposal.id);

        let channels = Arc::new(TestChannels::default());
        channels.set(
            &Self::provider(),
            &Self::hermes(),
            ProviderChannel {
                balance,
                settled: 0,
                stake: 0,
            },
        );
        let promises = Arc::new(MemoryPromiseStorage::new());

        let node = NodeBuilder::new(config)
            .with_channel_provider(Arc::clone(&channels) as Arc<dyn ProviderChannelStatusProvider>)
            .with_promise_storage(Arc::clone(&promises) as _)
            .build()?;

        Ok(Self {
            node: Arc::new(node),
            channels,
            promises,
            task: None,
        })
    }

    /// Baseline configuration: one-second balance checks, no background earnings refresh.
    #[must_use]
    pub fn config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.proposal.id = PROPOSAL_ID;
        config.proposal.provider_id = PROVIDER.to_string();
        config.payment.hermes_id = HERMES.to_string();
        config.payment.balance_check_interval_secs = 1;
        config.payment.earnings_refresh_interval_secs = 0;
        config
    }

    /// Provider identity of the node.
    #[must_use]
    pub fn provider() -> Identity {
        Identity::from_address(PROVIDER)
    }

    /// Hermes identity of the node.
    #[must_use]
    pub fn hermes() -> Identity {
        Identity::from_address(HERMES)
    }

    /// Run the node in the background.
    pub fn start(&mut self) {
        let node = Arc::clone(&self.node);
        self.task = Some(tokio::spawn(async move { node.run().await }));
    }

    /// The node under test.
    #[must_use]
    pub fn node(&self) -> &RunningNode {
        &self.node
    }

    /// The channel source the node reads from.
    #[must_use]
    pub fn channels(&self) -> &TestChannels {
        &self.channels
    }

    /// Subscribe to node events.
    #[must_use]
    pub fn events(&self) -> NodeEventsChannel {
        self.node.subscribe_events()
    }

    /// Record a promise the hermes issued to the provider.
    pub fn promise(&self, amount: Amount) {
        self.promises.store(
            &Self::provider(),
            &Self::hermes(),
            HermesPromise {
                channel_id: "0xchannel".to_string(),
                amount,
            },
        );
    }

    /// Admit `consumer` into a session against the advertised proposal.
    ///
    /// # Errors
    ///
    /// Returns an error if the node rejects the session.
    pub async fn open_session(&self, consumer: &Identity) -> Result<Session> {
        let session = self
            .node
            .session_manager()
            .create(
                consumer.clone(),
                consumer.clone(),
                PROPOSAL_ID,
                serde_json::json!({ "endpoint": "10.0.0.1:51820" }),
                serde_json::json!({ "public_key": "consumer-key" }),
            )
            .await?;
        Ok(session)
    }

    /// Whether the node still holds `session_id`.
    #[must_use]
    pub fn is_live(&self, consumer: &Identity, session_id: &SessionId) -> bool {
        self.node
            .session_manager()
            .find_session(consumer, session_id)
            .is_some()
    }

    /// Shut the node down and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the node task failed.
    pub async fn teardown(mut self) -> Result<()> {
        info!("Tearing down test harness");
        self.node.shutdown();
        if let Some(task) = self.task.take() {
            task.await??;
        }
        Ok(())
    }
}
