//! Error types for paygate-node.

use crate::identity::Identity;
use crate::session::SessionId;
use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the session core.
#[derive(Debug, Error)]
pub enum Error {
    /// Session was requested against a proposal that is not currently advertised.
    #[error("proposal does not exist")]
    InvalidProposal,

    /// Session ID generator failed.
    #[error("session ID generation failed: {0}")]
    IdGeneration(String),

    /// Balance tracker could not be constructed for a session.
    #[error("balance tracker construction failed: {0}")]
    TrackerFactory(String),

    /// Provider channel status lookup failed.
    #[error("could not get provider channel for {identity}, hermes {hermes_id}: {reason}")]
    ProviderChannel {
        /// Provider identity the channel was requested for.
        identity: Identity,
        /// Hermes the channel is opened with.
        hermes_id: Identity,
        /// Underlying failure.
        reason: String,
    },

    /// Hermes promise lookup failed for a reason other than absence.
    #[error("could not get hermes promise for provider {identity}, hermes {hermes_id}: {reason}")]
    HermesPromise {
        /// Provider identity the promise was requested for.
        identity: Identity,
        /// Hermes that issued the promise.
        hermes_id: Identity,
        /// Underlying failure.
        reason: String,
    },

    /// The channel balance backing a session ran out.
    #[error("balance exhausted for {identity}, hermes {hermes_id}: {balance} remaining")]
    BalanceExhausted {
        /// Provider identity.
        identity: Identity,
        /// Hermes the channel is opened with.
        hermes_id: Identity,
        /// Net balance observed when tracking gave up.
        balance: u128,
    },

    /// No session with the given ID exists.
    #[error("session does not exist: {0}")]
    SessionNotFound(SessionId),

    /// The session exists but belongs to a different consumer.
    #[error("session does not belong to consumer {0}")]
    WrongSessionOwner(Identity),

    /// Identity address could not be parsed.
    #[error("invalid identity address: {0}")]
    InvalidIdentity(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
