//! Hermes channel state: on-chain channel plus the latest off-chain promise.

use crate::event::Earnings;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};

/// Token amount in the smallest unit.
pub type Amount = u128;

/// On-chain state of a provider's channel with a hermes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderChannel {
    /// Funds currently locked in the channel.
    pub balance: Amount,
    /// Amount already settled on-chain.
    pub settled: Amount,
    /// Provider's stake in the channel.
    pub stake: Amount,
}

/// Latest signed promise received from a hermes.
///
/// The default value stands for "no promise issued yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HermesPromise {
    /// Channel the promise was issued for.
    pub channel_id: String,
    /// Amount promised so far.
    pub amount: Amount,
}

/// Reconciled view of a provider's channel with one hermes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HermesChannel {
    /// Provider identity.
    pub identity: Identity,
    /// Hermes the channel is opened with.
    pub hermes_id: Identity,
    /// On-chain channel state.
    pub channel: ProviderChannel,
    /// Latest promise, or the default when none exists.
    pub last_promise: HermesPromise,
}

impl HermesChannel {
    /// Combine on-chain state and the latest promise.
    #[must_use]
    pub fn new(
        identity: Identity,
        hermes_id: Identity,
        channel: ProviderChannel,
        last_promise: HermesPromise,
    ) -> Self {
        Self {
            identity,
            hermes_id,
            channel,
            last_promise,
        }
    }

    /// Gross entitlement: channel balance plus settled amount.
    #[must_use]
    pub fn available_balance(&self) -> Amount {
        self.channel.balance.saturating_add(self.channel.settled)
    }

    /// Available balance net of what was already promised away.
    ///
    /// Never exceeds [`available_balance`](Self::available_balance) and floors at zero.
    #[must_use]
    pub fn balance(&self) -> Amount {
        self.available_balance()
            .saturating_sub(self.last_promise.amount)
    }

    /// Lifetime component of the earnings pair.
    #[must_use]
    pub fn lifetime_balance(&self) -> Amount {
        self.balance()
    }

    /// Unsettled component of the earnings pair.
    #[must_use]
    pub fn unsettled_balance(&self) -> Amount {
        self.available_balance()
    }

    /// Earnings snapshot used for change notifications.
    #[must_use]
    pub fn earnings(&self) -> Earnings {
        Earnings {
            lifetime_balance: self.lifetime_balance(),
            unsettled_balance: self.unsettled_balance(),
        }
    }
}
