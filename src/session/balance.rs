//! Balance tracker contract.
//!
//! A balance tracker watches one session's accounting and decides when the
//! session must stop. The session manager only relies on the two operations
//! below; concrete policies are picked by the factory it is given.

use crate::error::Result;
use crate::identity::Identity;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Watches one session's accrual.
#[async_trait]
pub trait BalanceTracker: Send + Sync {
    /// Watch until stopped or until the session must end.
    ///
    /// # Errors
    ///
    /// Returns an error when the session has to be terminated, for example
    /// because the balance backing it ran out. A clean stop returns `Ok`.
    async fn start(&self) -> Result<()>;

    /// Request the tracker to stop. Idempotent and non-blocking; safe before
    /// `start` ran or after it returned.
    fn stop(&self);
}

/// Builds a tracker for `(consumer, provider, issuer)`.
pub type BalanceTrackerFactory =
    Arc<dyn Fn(&Identity, &Identity, &Identity) -> Result<Arc<dyn BalanceTracker>> + Send + Sync>;

/// Tracker that never requests termination.
#[derive(Debug)]
pub struct NoopBalanceTracker {
    stop_tx: watch::Sender<bool>,
}

impl NoopBalanceTracker {
    /// Create a tracker.
    #[must_use]
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self { stop_tx }
    }
}

impl Default for NoopBalanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BalanceTracker for NoopBalanceTracker {
    async fn start(&self) -> Result<()> {
        let mut stop_rx = self.stop_tx.subscribe();
        loop {
            let stopped = *stop_rx.borrow_and_update();
            if stopped || stop_rx.changed().await.is_err() {
                return Ok(());
            }
        }
    }

    fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}

/// Factory handing out [`NoopBalanceTracker`]s, for flows without metering.
#[must_use]
pub fn noop_tracker_factory() -> BalanceTrackerFactory {
    Arc::new(|_consumer, _provider, _issuer| {
        Ok(Arc::new(NoopBalanceTracker::new()) as Arc<dyn BalanceTracker>)
    })
}
