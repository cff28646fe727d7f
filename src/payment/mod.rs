//! Gasless payment authorization.
//!
//! A user signs a payment intent off-chain; the facilitator verifies it and
//! submits the transfer on-chain as a sponsored transaction, paying gas.
//!
//! # Architecture
//!
//! ```text
//! Authorization received
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ Expired?            │──── yes ──▶ reject "Authorization expired"
//! └─────────┬───────────┘
//!           │ no
//!           ▼
//! ┌─────────────────────┐
//! │ Nonce cache         │──── hit ──▶ reject "Nonce already used"
//! └─────────┬───────────┘
//!           │ miss
//!           ▼
//! ┌─────────────────────┐
//! │ Ledger nonce query  │──── used ─▶ cache + reject
//! └─────────┬───────────┘
//!           │ unused (or error, fail-open)
//!           ▼
//! ┌─────────────────────┐
//! │ Key binding and     │──── bad ──▶ reject "Invalid signature"
//! │ Ed25519 signature   │
//! └─────────┬───────────┘
//!           │ ok
//!           ▼
//! ┌─────────────────────┐
//! │ Claim nonce         │──── lost ─▶ reject "Nonce already used"
//! └─────────┬───────────┘
//!           │ won
//!           ▼
//!   Sponsored submission ── failed ─▶ stranded nonce
//! ```

mod cache;
mod error;
mod facilitator;
pub mod message;
mod replay;
mod request;
pub mod signature;
mod types;

pub use cache::{CacheStats, NonceCache};
pub use error::{AuthorizationError, RequestError};
pub use facilitator::{AuthorizationFacilitator, FacilitatorSettings, StrandedNonce};
pub use replay::{LedgerErrorPolicy, RejectReason, ReplayGuard, ReplayStats, Validation};
pub use request::{AuthorizationRequest, IntentRequest, ParsedIntentRequest, AUTHORIZATION_FIELDS, INTENT_FIELDS};
pub use types::{
    Address, AddressError, PaymentAuthorizationIntent, PaymentIntent, SignedAuthorization, TransactionReceipt,
    ADDRESS_LENGTH,
};
