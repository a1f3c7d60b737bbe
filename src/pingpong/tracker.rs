//! Balance tracker backed by the hermes channel repository.

use super::channel::Amount;
use super::repository::HermesChannelRepository;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::session::{BalanceTracker, BalanceTrackerFactory};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Shortest delay between channel checks; tokio intervals must be non-zero.
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Polling policy of a [`HermesBalanceTracker`].
#[derive(Debug, Clone)]
pub struct BalanceTrackerConfig {
    /// Delay between channel checks.
    pub check_interval: Duration,
    /// The session stops once the net channel balance is at or below this.
    pub min_balance: Amount,
    /// Consecutive failed checks tolerated before giving up.
    pub max_consecutive_failures: u32,
}

impl Default for BalanceTrackerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            min_balance: 0,
            max_consecutive_failures: 3,
        }
    }
}

/// Periodically reconciles the provider's hermes channel and ends the
/// session once the balance backing it is exhausted.
pub struct HermesBalanceTracker {
    repository: Arc<HermesChannelRepository>,
    provider_id: Identity,
    hermes_id: Identity,
    config: BalanceTrackerConfig,
    stop_tx: watch::Sender<bool>,
}

impl HermesBalanceTracker {
    /// Create a tracker for `provider_id`'s channel with `hermes_id`.
    ///
    /// A zero `check_interval` is raised to one millisecond.
    #[must_use]
    pub fn new(
        repository: Arc<HermesChannelRepository>,
        provider_id: Identity,
        hermes_id: Identity,
        mut config: BalanceTrackerConfig,
    ) -> Self {
        config.check_interval = config.check_interval.max(MIN_CHECK_INTERVAL);
        let (stop_tx, _) = watch::channel(false);
        Self {
            repository,
            provider_id,
            hermes_id,
            config,
            stop_tx,
        }
    }

    /// Factory building trackers that watch the session provider's channel
    /// with `hermes_id`.
    #[must_use]
    pub fn factory(
        repository: Arc<HermesChannelRepository>,
        hermes_id: Identity,
        config: BalanceTrackerConfig,
    ) -> BalanceTrackerFactory {
        Arc::new(move |consumer, provider, issuer| {
            debug!(
                "Tracking balance of {} via {} for consumer {} (issuer {})",
                provider, hermes_id, consumer, issuer
            );
            Ok(Arc::new(Self::new(
                Arc::clone(&repository),
                provider.clone(),
                hermes_id.clone(),
                config.clone(),
            )) as Arc<dyn BalanceTracker>)
        })
    }

    async fn check(&self) -> Result<()> {
        let channel = self
            .repository
            .fetch(&self.provider_id, &self.hermes_id)
            .await?;

        let balance = channel.balance();
        if balance <= self.config.min_balance {
            return Err(Error::BalanceExhausted {
                identity: self.provider_id.clone(),
                hermes_id: self.hermes_id.clone(),
                balance,
            });
        }

        debug!(
            "Channel of {} via {} has {} remaining",
            self.provider_id, self.hermes_id, balance
        );
        Ok(())
    }
}

#[async_trait]
impl BalanceTracker for HermesBalanceTracker {
    async fn start(&self) -> Result<()> {
        let mut stop_rx = self.stop_tx.subscribe();
        if *stop_rx.borrow_and_update() {
            return Ok(());
        }

        let mut ticker = tokio::time::interval(self.config.check_interval);
        let mut failures = 0u32;

        loop {
            let due = tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        info!("Balance tracking for {} stopped", self.provider_id);
                        return Ok(());
                    }
                    false
                }
                _ = ticker.tick() => true,
            };
            if !due {
                continue;
            }

            match self.check().await {
                Ok(()) => failures = 0,
                Err(e @ Error::BalanceExhausted { .. }) => {
                    warn!("Stopping session: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Balance check {}/{} failed: {}",
                        failures, self.config.max_consecutive_failures, e
                    );
                    if failures >= self.config.max_consecutive_failures {
                        return Err(e);
                    }
                }
            }
        }
    }

    fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}
