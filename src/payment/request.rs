//! Loosely-typed client requests and their validation.
//!
//! Clients send JSON in which any field may be missing and numbers may come
//! as JSON numbers or decimal strings. Parsing turns these into the strict
//! types of [`crate::payment::types`] or a [`RequestError`].

use crate::payment::error::RequestError;
use crate::payment::types::{Address, PaymentAuthorizationIntent, SignedAuthorization};
use serde::Deserialize;
use serde_json::Value;

/// Fields required by [`IntentRequest`].
pub const INTENT_FIELDS: &[&str] = &["sender", "recipient", "amount"];

/// Fields required by [`AuthorizationRequest`].
pub const AUTHORIZATION_FIELDS: &[&str] = &[
    "sender",
    "recipient",
    "amount",
    "nonce",
    "expiry",
    "signature",
    "publicKey",
];

/// Request for a fresh payment intent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRequest {
    /// Paying account.
    #[serde(default)]
    pub sender: Option<String>,
    /// Receiving account.
    #[serde(default)]
    pub recipient: Option<String>,
    /// Amount, as a number or decimal string.
    #[serde(default)]
    pub amount: Option<Value>,
}

/// Validated intent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedIntentRequest {
    /// Paying account.
    pub sender: Address,
    /// Receiving account.
    pub recipient: Address,
    /// Amount, strictly positive.
    pub amount: u64,
}

impl IntentRequest {
    /// Validate the request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MissingFields`] if any field is absent or
    /// empty, and a more specific error for unparseable or zero values.
    pub fn parse(&self) -> Result<ParsedIntentRequest, RequestError> {
        let missing = || RequestError::MissingFields { required: INTENT_FIELDS };
        let sender = present(self.sender.as_deref()).ok_or_else(missing)?;
        let recipient = present(self.recipient.as_deref()).ok_or_else(missing)?;
        let amount = self.amount.as_ref().filter(|v| !is_empty(v)).ok_or_else(missing)?;

        let amount = parse_u64(amount, "amount")?;
        if amount == 0 {
            return Err(RequestError::ZeroAmount);
        }

        Ok(ParsedIntentRequest {
            sender: parse_address(sender, "sender")?,
            recipient: parse_address(recipient, "recipient")?,
            amount,
        })
    }
}

/// A signed authorization as submitted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    /// Paying account.
    #[serde(default)]
    pub sender: Option<String>,
    /// Receiving account.
    #[serde(default)]
    pub recipient: Option<String>,
    /// Amount, as a number or decimal string.
    #[serde(default)]
    pub amount: Option<Value>,
    /// Issued nonce, as a number or decimal string.
    #[serde(default)]
    pub nonce: Option<Value>,
    /// Issued expiry, as a number or decimal string.
    #[serde(default)]
    pub expiry: Option<Value>,
    /// Hex-encoded Ed25519 signature.
    #[serde(default)]
    pub signature: Option<String>,
    /// Hex-encoded Ed25519 public key.
    #[serde(default)]
    pub public_key: Option<String>,
}

impl AuthorizationRequest {
    /// Validate the request.
    ///
    /// Zero amount, nonce or expiry counts as missing: the facilitator never
    /// issues such values. Signature and key are only checked for presence;
    /// their content is judged by signature verification.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MissingFields`] if any field is absent, empty
    /// or zero, and a more specific error for unparseable values.
    pub fn parse(&self) -> Result<SignedAuthorization, RequestError> {
        let missing = || RequestError::MissingFields {
            required: AUTHORIZATION_FIELDS,
        };
        let number = |value: Option<&Value>, field: &'static str| -> Result<u64, RequestError> {
            let value = value.filter(|v| !is_empty(v)).ok_or_else(missing)?;
            match parse_u64(value, field)? {
                0 => Err(missing()),
                n => Ok(n),
            }
        };

        let sender = present(self.sender.as_deref()).ok_or_else(missing)?;
        let recipient = present(self.recipient.as_deref()).ok_or_else(missing)?;
        let signature = present(self.signature.as_deref()).ok_or_else(missing)?;
        let public_key = present(self.public_key.as_deref()).ok_or_else(missing)?;
        let amount = number(self.amount.as_ref(), "amount")?;
        let nonce = number(self.nonce.as_ref(), "nonce")?;
        let expiry = number(self.expiry.as_ref(), "expiry")?;

        let intent = PaymentAuthorizationIntent::new(
            parse_address(sender, "sender")?,
            parse_address(recipient, "recipient")?,
            amount,
            nonce,
            expiry,
        );
        Ok(SignedAuthorization::new(intent, signature, public_key))
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn parse_u64(value: &Value, field: &'static str) -> Result<u64, RequestError> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or(RequestError::InvalidNumber { field })
}

fn parse_address(value: &str, field: &'static str) -> Result<Address, RequestError> {
    value
        .parse()
        .map_err(|source| RequestError::InvalidAddress { field, source })
}
