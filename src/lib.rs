//! # paygate-node
//!
//! Payment-gated session lifecycle for a VPN provider node.
//!
//! A provider admits consumer sessions against the single proposal it
//! advertises. Every session is metered by a balance tracker that watches the
//! provider's hermes payment channel and ends the session when the money
//! backing it runs out. Earnings of each (provider, hermes) pair are published
//! as events whenever the channel is reconciled.
//!
//! ## Components
//!
//! - [`session::SessionManager`]: admission, lookup and teardown of sessions
//! - [`pingpong::HermesChannelRepository`]: channel and promise reconciliation
//! - [`pingpong::HermesBalanceTracker`]: per-session balance polling
//! - [`node::RunningNode`]: wiring and shutdown of the above

pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod logging;
pub mod market;
pub mod node;
pub mod pingpong;
pub mod session;

pub use config::NodeConfig;
pub use error::{Error, Result};
pub use event::{Earnings, EarningsChanged, EventBus, NodeEvent, Publisher};
pub use identity::Identity;
pub use market::{ProposalId, ServiceProposal};
pub use node::{NodeBuilder, RunningNode};
pub use pingpong::{HermesBalanceTracker, HermesChannel, HermesChannelRepository};
pub use session::{Session, SessionId, SessionManager};
