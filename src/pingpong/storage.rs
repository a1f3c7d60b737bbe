//! Sources the channel repository reads from.

use super::channel::{HermesPromise, ProviderChannel};
use crate::identity::Identity;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

/// Error type returned by external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reads on-chain provider channel state.
#[async_trait]
pub trait ProviderChannelStatusProvider: Send + Sync {
    /// Current channel state of `identity` with `hermes_id`.
    async fn get_provider_channel(
        &self,
        identity: &Identity,
        hermes_id: &Identity,
    ) -> std::result::Result<ProviderChannel, BoxError>;
}

/// Failure of a promise lookup.
#[derive(Debug, Error)]
pub enum PromiseError {
    /// No promise was issued for the pair yet.
    #[error("promise not found")]
    NotFound,

    /// Storage failure.
    #[error("promise storage failure: {0}")]
    Other(String),
}

/// Holds the latest hermes promise per (provider, hermes) pair.
#[async_trait]
pub trait HermesPromiseStorage: Send + Sync {
    /// Latest promise of `hermes_id` to `identity`.
    async fn get(
        &self,
        identity: &Identity,
        hermes_id: &Identity,
    ) -> std::result::Result<HermesPromise, PromiseError>;
}

/// In-memory promise storage.
#[derive(Debug, Default)]
pub struct MemoryPromiseStorage {
    promises: RwLock<HashMap<(Identity, Identity), HermesPromise>>,
}

impl MemoryPromiseStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `promise` as the latest for the pair.
    ///
    /// Promises only grow: an amount lower than the stored one is ignored.
    /// Returns whether the promise was stored.
    pub fn store(&self, identity: &Identity, hermes_id: &Identity, promise: HermesPromise) -> bool {
        let mut promises = self.promises.write();
        let key = (identity.clone(), hermes_id.clone());
        if promises
            .get(&key)
            .is_some_and(|existing| existing.amount > promise.amount)
        {
            return false;
        }
        promises.insert(key, promise);
        true
    }
}

#[async_trait]
impl HermesPromiseStorage for MemoryPromiseStorage {
    async fn get(
        &self,
        identity: &Identity,
        hermes_id: &Identity,
    ) -> std::result::Result<HermesPromise, PromiseError> {
        self.promises
            .read()
            .get(&(identity.clone(), hermes_id.clone()))
            .cloned()
            .ok_or(PromiseError::NotFound)
    }
}
