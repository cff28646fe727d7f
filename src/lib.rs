//! # gasless-facilitator
//!
//! A payment facilitator for gasless transfers on Aptos.
//!
//! A client asks the facilitator for a payment intent (sender, recipient,
//! amount plus a facilitator-issued nonce and expiry), signs its canonical
//! encoding off-chain with the sender's Ed25519 key, and hands the signature
//! back. The facilitator checks expiry, replay and signature, then submits
//! the transfer on-chain as a sponsored transaction whose gas it pays.
//!
//! ## Architecture
//!
//! ```text
//! HTTP (axum) ─▶ AuthorizationFacilitator ─▶ ReplayGuard ─▶ NonceCache
//!                        │                        └────────▶ NonceLedger
//!                        ├─▶ signature (Ed25519, key binding)
//!                        └─▶ SponsoredSubmitter / TransactionLookup
//! ```
//!
//! [`ledger::AptosLedger`] speaks the Aptos fullnode REST API;
//! [`ledger::InMemoryLedger`] stands in for it offline and in tests.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod payment;
pub mod service;

pub use config::{AptosNetwork, FacilitatorConfig, LedgerConfig, PaymentConfig};
pub use error::{Error, Result};
pub use event::{FacilitatorEvent, FacilitatorEventsChannel};
pub use payment::{
    Address, AuthorizationError, AuthorizationFacilitator, LedgerErrorPolicy, PaymentAuthorizationIntent,
    PaymentIntent, SignedAuthorization, StrandedNonce, TransactionReceipt,
};
pub use service::{FacilitatorBuilder, RunningFacilitator, ShutdownHandle};
