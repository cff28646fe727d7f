//! Core data types for payment authorizations.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of an Aptos account address in bytes.
pub const ADDRESS_LENGTH: usize = 32;

/// Errors produced when parsing an [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Hex part was empty or longer than 64 digits.
    #[error("invalid address length: {0} hex digits")]
    Length(usize),
    /// Hex part contained non-hex characters.
    #[error("invalid address hex: {0}")]
    Hex(String),
}

/// A 32-byte Aptos account address.
///
/// Parses from hex with or without a `0x` prefix. Short forms such as `0x1`
/// are left-padded with zeros, the same way the chain treats them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Wrap raw address bytes.
    #[must_use]
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() || digits.len() > ADDRESS_LENGTH * 2 {
            return Err(AddressError::Length(digits.len()));
        }

        let padded = format!("{digits:0>64}");
        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(&padded, &mut bytes).map_err(|e| AddressError::Hex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// An unsigned payment authorization.
///
/// Immutable once built: the signature binds to the byte representation of
/// every field, so there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PaymentAuthorizationIntent {
    sender: Address,
    recipient: Address,
    amount: u64,
    nonce: u64,
    expiry: u64,
}

impl PaymentAuthorizationIntent {
    /// Build an intent from its canonical fields.
    #[must_use]
    pub const fn new(sender: Address, recipient: Address, amount: u64, nonce: u64, expiry: u64) -> Self {
        Self {
            sender,
            recipient,
            amount,
            nonce,
            expiry,
        }
    }

    /// Paying account.
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.sender
    }

    /// Receiving account.
    #[must_use]
    pub const fn recipient(&self) -> &Address {
        &self.recipient
    }

    /// Amount in the asset's base units.
    #[must_use]
    pub const fn amount(&self) -> u64 {
        self.amount
    }

    /// Facilitator-issued nonce, unique per sender.
    #[must_use]
    pub const fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Unix timestamp (seconds) after which the authorization is void.
    #[must_use]
    pub const fn expiry(&self) -> u64 {
        self.expiry
    }
}

/// An intent together with the client's detached signature.
///
/// Signature and public key are kept as the hex strings the client sent;
/// they are decoded during verification and forwarded verbatim on submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAuthorization {
    intent: PaymentAuthorizationIntent,
    signature: String,
    public_key: String,
}

impl SignedAuthorization {
    /// Attach a signature and public key to an intent.
    #[must_use]
    pub fn new(intent: PaymentAuthorizationIntent, signature: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            intent,
            signature: signature.into(),
            public_key: public_key.into(),
        }
    }

    /// The signed intent.
    #[must_use]
    pub const fn intent(&self) -> &PaymentAuthorizationIntent {
        &self.intent
    }

    /// Hex-encoded Ed25519 signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Hex-encoded Ed25519 public key.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

/// An intent as handed to the client for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Paying account.
    pub sender: Address,
    /// Receiving account.
    pub recipient: Address,
    /// Amount in the asset's base units.
    pub amount: u64,
    /// Facilitator-issued nonce.
    pub nonce: u64,
    /// Expiry as a Unix timestamp in seconds.
    pub expiry: u64,
    /// Asset label shown to the client.
    pub asset: String,
    /// Network the sponsored transaction targets.
    pub network: String,
    /// Address of the on-chain `payment_with_auth` module.
    pub module_address: Address,
}

impl PaymentIntent {
    /// The canonical part of this intent, as the client will sign it.
    #[must_use]
    pub const fn authorization(&self) -> PaymentAuthorizationIntent {
        PaymentAuthorizationIntent::new(self.sender, self.recipient, self.amount, self.nonce, self.expiry)
    }
}

/// Receipt for an accepted authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Hash of the sponsored transaction.
    pub transaction_hash: String,
    /// Sender whose nonce was consumed.
    pub sender: Address,
    /// Consumed nonce.
    pub nonce: u64,
}
