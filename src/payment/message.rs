//! Canonical byte encoding of a payment authorization.
//!
//! The layout must match the payload the on-chain `payment_with_auth`
//! module reconstructs before checking the signature:
//!
//! ```text
//! "APTOS_PAYMENT_AUTH" | sender (32) | recipient (32) | amount u64 LE | nonce u64 LE | expiry u64 LE
//! ```
//!
//! Every field is fixed width, so no length prefixes are needed.

use crate::payment::types::{PaymentAuthorizationIntent, ADDRESS_LENGTH};

/// Domain separation tag (prevents cross-protocol signature reuse).
pub const DOMAIN_TAG: &[u8] = b"APTOS_PAYMENT_AUTH";

/// Exact length of an encoded authorization message.
pub const MESSAGE_LENGTH: usize = DOMAIN_TAG.len() + ADDRESS_LENGTH * 2 + 3 * 8;

/// Encode an intent into the message the client signs.
#[must_use]
pub fn encode(intent: &PaymentAuthorizationIntent) -> Vec<u8> {
    let mut message = Vec::with_capacity(MESSAGE_LENGTH);
    message.extend_from_slice(DOMAIN_TAG);
    message.extend_from_slice(intent.sender().as_bytes());
    message.extend_from_slice(intent.recipient().as_bytes());
    message.extend_from_slice(&intent.amount().to_le_bytes());
    message.extend_from_slice(&intent.nonce().to_le_bytes());
    message.extend_from_slice(&intent.expiry().to_le_bytes());
    message
}
