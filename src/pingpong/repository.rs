//! Reconciles hermes channel state and publishes earnings changes.

use super::channel::{HermesChannel, HermesPromise};
use super::storage::{HermesPromiseStorage, PromiseError, ProviderChannelStatusProvider};
use crate::error::{Error, Result};
use crate::event::{Earnings, EarningsChanged, NodeEvent, Publisher};
use crate::identity::Identity;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Fetches hermes channels and tracks the last published earnings per pair.
///
/// Every successful [`fetch`](Self::fetch) publishes an
/// [`EarningsChanged`] event, even when nothing changed; subscribers diff
/// `previous` against `current` themselves. A failed fetch publishes nothing
/// and leaves the cache alone.
pub struct HermesChannelRepository {
    promise_storage: Arc<dyn HermesPromiseStorage>,
    channel_provider: Arc<dyn ProviderChannelStatusProvider>,
    publisher: Arc<dyn Publisher>,
    earnings: Mutex<HashMap<(Identity, Identity), Earnings>>,
}

impl HermesChannelRepository {
    /// Create a repository.
    #[must_use]
    pub fn new(
        promise_storage: Arc<dyn HermesPromiseStorage>,
        channel_provider: Arc<dyn ProviderChannelStatusProvider>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            promise_storage,
            channel_provider,
            publisher,
            earnings: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the current channel of `identity` with `hermes_id`.
    ///
    /// Always reads fresh state from both collaborators. A missing promise
    /// counts as zero promised.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderChannel`] or [`Error::HermesPromise`] when a
    /// lookup fails.
    pub async fn fetch(&self, identity: &Identity, hermes_id: &Identity) -> Result<HermesChannel> {
        let channel = self
            .channel_provider
            .get_provider_channel(identity, hermes_id)
            .await
            .map_err(|e| Error::ProviderChannel {
                identity: identity.clone(),
                hermes_id: hermes_id.clone(),
                reason: e.to_string(),
            })?;

        let promise = match self.promise_storage.get(identity, hermes_id).await {
            Ok(promise) => promise,
            Err(PromiseError::NotFound) => {
                debug!("No promise yet for {} from hermes {}", identity, hermes_id);
                HermesPromise::default()
            }
            Err(e) => {
                return Err(Error::HermesPromise {
                    identity: identity.clone(),
                    hermes_id: hermes_id.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let hermes_channel =
            HermesChannel::new(identity.clone(), hermes_id.clone(), channel, promise);
        self.publish_earnings(&hermes_channel);

        Ok(hermes_channel)
    }

    /// Earnings last published for the pair, if any fetch succeeded yet.
    #[must_use]
    pub fn cached_earnings(&self, identity: &Identity, hermes_id: &Identity) -> Option<Earnings> {
        self.earnings
            .lock()
            .get(&(identity.clone(), hermes_id.clone()))
            .copied()
    }

    fn publish_earnings(&self, channel: &HermesChannel) {
        let current = channel.earnings();
        let key = (channel.identity.clone(), channel.hermes_id.clone());

        // Held across publish so that per-pair events form one previous/current chain.
        let mut earnings = self.earnings.lock();
        let previous = earnings.get(&key).copied().unwrap_or_default();

        self.publisher
            .publish(NodeEvent::EarningsChanged(EarningsChanged {
                identity: channel.identity.clone(),
                previous,
                current,
            }));
        earnings.insert(key, current);

        debug!(
            "Earnings for {} via {}: lifetime {} -> {}, unsettled {} -> {}",
            channel.identity,
            channel.hermes_id,
            previous.lifetime_balance,
            current.lifetime_balance,
            previous.unsettled_balance,
            current.unsettled_balance
        );
    }
}
