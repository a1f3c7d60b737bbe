//! End-to-end tests for paygate-node.
//!
//! Each test wires a full node through [`paygate_node::NodeBuilder`] with an
//! in-process channel source standing in for the blockchain.

mod harness;

#[cfg(test)]
mod integration_tests;

pub use harness::{HarnessError, TestChannels, TestHarness};
