//! Ed25519 signature verification for payment authorizations.
//!
//! Verification never errors: malformed keys, malformed signatures and
//! mismatches all collapse to `false`, so a caller cannot tell them apart.

use crate::payment::message;
use crate::payment::types::{Address, PaymentAuthorizationIntent};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use sha3::{Digest, Sha3_256};
use tracing::debug;

/// Ed25519 signature size in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Ed25519 public key size in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Authentication-key scheme byte for single Ed25519 keys.
const ED25519_SCHEME: u8 = 0x00;

/// Verify `signature` over the canonical encoding of `intent`.
///
/// `sender` is only used for diagnostics. Whether `public_key` belongs to
/// `sender` is NOT checked here; callers must establish that separately
/// (see [`derive_address`]).
#[must_use]
pub fn verify(
    sender: &Address,
    public_key: &[u8],
    signature: &[u8],
    intent: &PaymentAuthorizationIntent,
) -> bool {
    let Ok(key_bytes) = <[u8; PUBLIC_KEY_SIZE]>::try_from(public_key) else {
        debug!(sender = %sender, len = public_key.len(), "Rejecting public key with invalid size");
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        debug!(sender = %sender, "Rejecting public key that is not a curve point");
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        debug!(sender = %sender, len = signature.len(), "Rejecting signature with invalid size");
        return false;
    };

    let message = message::encode(intent);
    let valid = verifying_key.verify_strict(&message, &signature).is_ok();
    debug!(sender = %sender, nonce = intent.nonce(), valid, "Signature verification result");
    valid
}

/// Hex-input variant of [`verify`]. Undecodable hex counts as malformed.
#[must_use]
pub fn verify_hex(
    sender: &Address,
    public_key_hex: &str,
    signature_hex: &str,
    intent: &PaymentAuthorizationIntent,
) -> bool {
    match (decode_hex(public_key_hex), decode_hex(signature_hex)) {
        (Some(public_key), Some(signature)) => verify(sender, &public_key, &signature, intent),
        _ => {
            debug!(sender = %sender, "Rejecting undecodable key or signature hex");
            false
        }
    }
}

/// Derive the account address an Ed25519 public key authenticates.
///
/// This is the Aptos single-key authentication key:
/// `SHA3-256(public_key || 0x00)`.
#[must_use]
pub fn derive_address(public_key: &[u8; PUBLIC_KEY_SIZE]) -> Address {
    let mut hasher = Sha3_256::new();
    hasher.update(public_key);
    hasher.update([ED25519_SCHEME]);
    Address::new(hasher.finalize().into())
}

/// Check that a hex-encoded public key authenticates `sender`.
#[must_use]
pub fn key_matches_sender(sender: &Address, public_key_hex: &str) -> bool {
    decode_hex(public_key_hex)
        .and_then(|bytes| <[u8; PUBLIC_KEY_SIZE]>::try_from(bytes.as_slice()).ok())
        .is_some_and(|key| derive_address(&key) == *sender)
}

/// Sign an intent. Used by tooling and tests; the facilitator never signs
/// on a user's behalf.
#[must_use]
pub fn sign(signing_key: &SigningKey, intent: &PaymentAuthorizationIntent) -> Signature {
    signing_key.sign(&message::encode(intent))
}

/// Prefix of AIP-80 formatted Ed25519 private keys.
pub const PRIVATE_KEY_PREFIX: &str = "ed25519-priv-";

/// Parse a hex private key, optionally AIP-80 prefixed and/or `0x` prefixed.
///
/// # Errors
///
/// Returns [`crate::Error::Crypto`] if the key is not 32 hex-encoded bytes.
pub fn parse_private_key(s: &str) -> crate::Result<SigningKey> {
    let trimmed = s.trim();
    let hex_part = trimmed.strip_prefix(PRIVATE_KEY_PREFIX).unwrap_or(trimmed);
    let bytes = decode_hex(hex_part).ok_or_else(|| crate::Error::Crypto("Private key is not valid hex".to_string()))?;
    let seed = <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| crate::Error::Crypto(format!("Private key must be 32 bytes, got {}", bytes.len())))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Format a private key in AIP-80 form: `ed25519-priv-0x<hex>`.
#[must_use]
pub fn format_private_key(signing_key: &SigningKey) -> String {
    format!("{PRIVATE_KEY_PREFIX}0x{}", hex::encode(signing_key.to_bytes()))
}

/// Decode hex with an optional `0x` prefix.
pub(crate) fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).ok()
}
