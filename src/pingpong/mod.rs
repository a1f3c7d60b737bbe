//! Hermes payment channel reconciliation.
//!
//! A provider is paid through a hermes (payment hub). What the provider can
//! still earn through a hermes is the combination of two sources:
//!
//! 1. the on-chain provider channel (`balance`, `settled`, `stake`)
//! 2. the latest off-chain promise the hermes signed (`amount`)
//!
//! ```text
//! fetch(identity, hermes)
//!        │
//!        ▼
//! ┌─────────────────────┐      fail
//! │ provider channel    │─────────────▶ Error, no event
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐      fail (not NotFound)
//! │ latest promise      │─────────────▶ Error, no event
//! └─────────┬───────────┘
//!           │ NotFound ⇒ amount 0
//!           ▼
//!   HermesChannel ──▶ publish EarningsChanged { previous, current }
//!                     and remember current for the pair
//! ```

mod channel;
mod repository;
mod storage;
mod tracker;

pub use channel::{Amount, HermesChannel, HermesPromise, ProviderChannel};
pub use repository::HermesChannelRepository;
pub use storage::{
    BoxError, HermesPromiseStorage, MemoryPromiseStorage, PromiseError,
    ProviderChannelStatusProvider,
};
pub use tracker::{BalanceTrackerConfig, HermesBalanceTracker};
