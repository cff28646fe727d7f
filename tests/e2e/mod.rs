//! End-to-end tests for gasless-facilitator.
//!
//! Every test starts a real facilitator on an ephemeral local port and talks
//! to it over HTTP:
//!
//! - `http_api`: the public API over the in-memory ledger
//! - `aptos_flow`: the Aptos REST ledger client against a mock fullnode

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod harness;
mod http_api;

pub use aptos_node::MockAptosNode;
pub use harness::{test_config, HarnessError, TestHarness};
