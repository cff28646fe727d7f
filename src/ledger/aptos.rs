//! Aptos fullnode REST client.
//!
//! Queries the `payment_with_auth` module's nonce store through view
//! functions and submits `transfer_with_authorization` as an entry function
//! signed (and paid for) by the facilitator account.

use crate::config::LedgerConfig;
use crate::ledger::{
    is_transaction_hash, LedgerError, NonceLedger, SponsoredSubmitter, TransactionLookup, TransactionStatus,
};
use crate::payment::signature::{decode_hex, derive_address};
use crate::payment::{Address, SignedAuthorization};
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Interval between commit polls when `wait_for_commit` is set.
const COMMIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Name of the on-chain module implementing authorized transfers.
const MODULE_NAME: &str = "payment_with_auth";

#[derive(Debug, Deserialize)]
struct AccountResource {
    sequence_number: String,
}

#[derive(Debug, Deserialize)]
struct GasEstimate {
    gas_estimate: u64,
}

#[derive(Debug, Deserialize)]
struct PendingTransaction {
    hash: String,
}

/// Ledger client backed by an Aptos fullnode.
pub struct AptosLedger {
    client: Client,
    node_url: String,
    signer: SigningKey,
    facilitator_address: Address,
    module_address: Address,
    config: LedgerConfig,
}

impl AptosLedger {
    /// Create a client that signs submissions with `signer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: LedgerConfig, signer: SigningKey) -> crate::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gasless-facilitator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LedgerError::Network(format!("Failed to build HTTP client: {e}")))?;

        let facilitator_address = derive_address(signer.verifying_key().as_bytes());
        let module_address = config.module_address.unwrap_or(facilitator_address);
        let node_url = config.node_url();

        info!(
            node = %node_url,
            network = config.network.as_str(),
            facilitator = %facilitator_address,
            module = %module_address,
            "Aptos ledger client initialized"
        );

        Ok(Self {
            client,
            node_url,
            signer,
            facilitator_address,
            module_address,
            config,
        })
    }

    /// Account that pays gas for sponsored transfers.
    #[must_use]
    pub const fn facilitator_address(&self) -> &Address {
        &self.facilitator_address
    }

    /// Address of the `payment_with_auth` module.
    #[must_use]
    pub const fn module_address(&self) -> &Address {
        &self.module_address
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.node_url)
    }

    fn function(&self, name: &str) -> String {
        format!("{}::{MODULE_NAME}::{name}", self.module_address)
    }

    /// Send `request` and decode a JSON body, all within `timeout`.
    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        timeout: Duration,
        what: &str,
    ) -> Result<T, LedgerError> {
        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| LedgerError::Network(format!("{what}: {e}")))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(LedgerError::NotFound(what.to_string()));
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(LedgerError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }

            response
                .json::<T>()
                .await
                .map_err(|e| LedgerError::Decode(format!("{what}: {e}")))
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| LedgerError::Timeout(what.to_string()))?
    }

    async fn sequence_number(&self, timeout: Duration) -> Result<String, LedgerError> {
        let request = self
            .client
            .get(self.url(&format!("/accounts/{}", self.facilitator_address)));
        let account: AccountResource = self.call(request, timeout, "account lookup").await?;
        Ok(account.sequence_number)
    }

    async fn gas_unit_price(&self, timeout: Duration) -> Result<u64, LedgerError> {
        if let Some(price) = self.config.gas_unit_price {
            return Ok(price);
        }
        let request = self.client.get(self.url("/estimate_gas_price"));
        let estimate: GasEstimate = self.call(request, timeout, "gas estimate").await?;
        Ok(estimate.gas_estimate)
    }

    /// Build the unsigned entry-function transaction for `authorization`.
    fn transfer_transaction(
        &self,
        authorization: &SignedAuthorization,
        sequence_number: &str,
        gas_unit_price: u64,
    ) -> Value {
        let intent = authorization.intent();
        let expiration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
            .saturating_add(self.config.transaction_ttl_secs);

        json!({
            "sender": self.facilitator_address.to_string(),
            "sequence_number": sequence_number,
            "max_gas_amount": self.config.max_gas_amount.to_string(),
            "gas_unit_price": gas_unit_price.to_string(),
            "expiration_timestamp_secs": expiration.to_string(),
            "payload": {
                "type": "entry_function_payload",
                "function": self.function("transfer_with_authorization"),
                "type_arguments": [self.config.asset_type],
                "arguments": [
                    intent.sender().to_string(),
                    intent.recipient().to_string(),
                    intent.amount().to_string(),
                    intent.nonce().to_string(),
                    intent.expiry().to_string(),
                    prefixed_hex(authorization.signature()),
                    prefixed_hex(authorization.public_key()),
                ],
            },
        })
    }

    async fn wait_for_commit(&self, hash: &str) -> Result<(), LedgerError> {
        let deadline = tokio::time::Instant::now() + self.config.submit_timeout();
        loop {
            match self.transaction_status(hash).await? {
                TransactionStatus::Success => return Ok(()),
                TransactionStatus::Failed { vm_status } => return Err(LedgerError::Aborted(vm_status)),
                TransactionStatus::Pending | TransactionStatus::NotFound => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(LedgerError::Timeout(format!("waiting for {hash} to commit")));
            }
            tokio::time::sleep(COMMIT_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl NonceLedger for AptosLedger {
    async fn is_nonce_used(&self, sender: &Address, nonce: u64) -> Result<bool, LedgerError> {
        let body = json!({
            "function": self.function("is_nonce_used"),
            "type_arguments": [],
            "arguments": [sender.to_string(), nonce.to_string()],
        });
        let request = self.client.post(self.url("/view")).json(&body);
        let values: Vec<Value> = self
            .call(request, self.config.query_timeout(), "nonce view")
            .await?;

        let used = values
            .first()
            .and_then(Value::as_bool)
            .ok_or_else(|| LedgerError::Decode(format!("nonce view returned {values:?}")))?;
        debug!(sender = %sender, nonce, used, "On-chain nonce query");
        Ok(used)
    }
}

#[async_trait]
impl SponsoredSubmitter for AptosLedger {
    async fn submit(&self, authorization: &SignedAuthorization) -> Result<String, LedgerError> {
        let timeout = self.config.submit_timeout();
        let sequence_number = self.sequence_number(timeout).await?;
        let gas_unit_price = self.gas_unit_price(timeout).await?;
        let mut transaction = self.transfer_transaction(authorization, &sequence_number, gas_unit_price);

        let request = self
            .client
            .post(self.url("/transactions/encode_submission"))
            .json(&transaction);
        let signing_message: String = self.call(request, timeout, "encode submission").await?;
        let signing_bytes = decode_hex(&signing_message)
            .ok_or_else(|| LedgerError::Decode("encode_submission returned invalid hex".to_string()))?;

        let signature = self.signer.sign(&signing_bytes);
        transaction["signature"] = json!({
            "type": "ed25519_signature",
            "public_key": format!("0x{}", hex::encode(self.signer.verifying_key().as_bytes())),
            "signature": format!("0x{}", hex::encode(signature.to_bytes())),
        });

        let request = self.client.post(self.url("/transactions")).json(&transaction);
        let pending: PendingTransaction = self.call(request, timeout, "submit transaction").await?;

        let intent = authorization.intent();
        info!(
            hash = %pending.hash,
            sender = %intent.sender(),
            amount = intent.amount(),
            sequence_number = %sequence_number,
            "Sponsored payment transaction submitted"
        );

        if self.config.wait_for_commit {
            if let Err(e) = self.wait_for_commit(&pending.hash).await {
                warn!(hash = %pending.hash, error = %e, "Sponsored transaction did not commit");
                return Err(e);
            }
        }

        Ok(pending.hash)
    }
}

#[async_trait]
impl TransactionLookup for AptosLedger {
    async fn transaction_status(&self, hash: &str) -> Result<TransactionStatus, LedgerError> {
        // Never splice anything but a hash into the node URL
        if !is_transaction_hash(hash) {
            debug!(hash, "Refusing lookup of malformed transaction hash");
            return Ok(TransactionStatus::NotFound);
        }
        let request = self
            .client
            .get(self.url(&format!("/transactions/by_hash/{hash}")));
        let transaction: Value = match self
            .call(request, self.config.query_timeout(), "transaction lookup")
            .await
        {
            Ok(value) => value,
            Err(LedgerError::NotFound(_)) => return Ok(TransactionStatus::NotFound),
            Err(e) => return Err(e),
        };
        Ok(parse_transaction_status(&transaction))
    }
}

/// Interpret a transaction object from `/transactions/by_hash`.
fn parse_transaction_status(transaction: &Value) -> TransactionStatus {
    if transaction.get("type").and_then(Value::as_str) == Some("pending_transaction") {
        return TransactionStatus::Pending;
    }
    match transaction.get("success").and_then(Value::as_bool) {
        Some(true) => TransactionStatus::Success,
        Some(false) => TransactionStatus::Failed {
            vm_status: transaction
                .get("vm_status")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        },
        None => TransactionStatus::Pending,
    }
}

fn prefixed_hex(value: &str) -> String {
    if value.starts_with("0x") {
        value.to_string()
    } else {
        format!("0x{value}")
    }
}
