//! Test harness that runs a facilitator over HTTP.
//!
//! The `TestHarness` starts a real facilitator on an ephemeral local port,
//! backed either by the in-memory ledger or by a [`MockAptosNode`], and
//! offers a user key plus helpers for the intent/sign/submit round trip.

use super::aptos_node::MockAptosNode;
use ed25519_dalek::SigningKey;
use gasless_facilitator::event::FacilitatorEventsChannel;
use gasless_facilitator::ledger::InMemoryLedger;
use gasless_facilitator::payment::signature::{derive_address, sign};
use gasless_facilitator::{
    Address, AuthorizationFacilitator, FacilitatorBuilder, FacilitatorConfig, PaymentAuthorizationIntent,
    ShutdownHandle,
};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Error type for test harness operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Facilitator failed to start or run
    #[error("Facilitator error: {0}")]
    Facilitator(#[from] gasless_facilitator::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Mock node error
    #[error("Mock Aptos node error: {0}")]
    Node(#[from] std::io::Error),

    /// Server task failed
    #[error("Server task failed: {0}")]
    Join(String),

    /// Unexpected response shape
    #[error("Unexpected response: {0}")]
    Response(String),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Seed of the facilitator (gas payer) key used by every harness.
const FACILITATOR_SEED: [u8; 32] = [1u8; 32];

/// Seed of the default user key.
const USER_SEED: [u8; 32] = [7u8; 32];

/// A running facilitator plus the client side of the protocol.
pub struct TestHarness {
    base_url: String,
    client: Client,
    shutdown: ShutdownHandle,
    server: JoinHandle<gasless_facilitator::Result<()>>,
    facilitator: Arc<AuthorizationFacilitator>,
    facilitator_address: Address,
    events: FacilitatorEventsChannel,
    ledger: Option<Arc<InMemoryLedger>>,
    aptos: Option<MockAptosNode>,
    user_key: SigningKey,
}

/// Local-only config with an auto-selected port.
#[must_use]
pub fn test_config() -> FacilitatorConfig {
    FacilitatorConfig {
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        ..FacilitatorConfig::default()
    }
}

impl TestHarness {
    /// Facilitator over the in-memory ledger with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the facilitator fails to start.
    pub async fn setup() -> Result<Self> {
        Self::setup_with_config(test_config()).await
    }

    /// Facilitator over the in-memory ledger with custom settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the facilitator fails to start.
    pub async fn setup_with_config(config: FacilitatorConfig) -> Result<Self> {
        let ledger = Arc::new(InMemoryLedger::new());
        let builder = FacilitatorBuilder::new(config, SigningKey::from_bytes(&FACILITATOR_SEED))
            .with_ledger(Arc::clone(&ledger));
        Self::start(builder, Some(ledger), None).await
    }

    /// Facilitator talking to a mock Aptos fullnode over REST.
    ///
    /// # Errors
    ///
    /// Returns an error if the mock node or the facilitator fails to start.
    pub async fn setup_with_aptos(mut config: FacilitatorConfig) -> Result<Self> {
        let node = MockAptosNode::start().await?;
        config.offline = false;
        config.ledger.node_url = Some(node.url());
        config.ledger.query_timeout_secs = 2;
        config.ledger.submit_timeout_secs = 5;
        let builder = FacilitatorBuilder::new(config, SigningKey::from_bytes(&FACILITATOR_SEED));
        Self::start(builder, None, Some(node)).await
    }

    async fn start(
        builder: FacilitatorBuilder,
        ledger: Option<Arc<InMemoryLedger>>,
        aptos: Option<MockAptosNode>,
    ) -> Result<Self> {
        let running = builder.build().await?;
        let base_url = format!("http://{}", running.local_addr());
        let facilitator = running.facilitator();
        let facilitator_address = *running.facilitator_address();
        let events = running.subscribe_events();
        let shutdown = running.shutdown_handle();
        let server = tokio::spawn(running.run());

        info!(url = %base_url, "Test facilitator started");

        Ok(Self {
            base_url,
            client: Client::new(),
            shutdown,
            server,
            facilitator,
            facilitator_address,
            events,
            ledger,
            aptos,
            user_key: SigningKey::from_bytes(&USER_SEED),
        })
    }

    /// `http://host:port` of the facilitator.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The facilitator behind the server.
    #[must_use]
    pub fn facilitator(&self) -> &AuthorizationFacilitator {
        &self.facilitator
    }

    /// Gas-paying account.
    #[must_use]
    pub fn facilitator_address(&self) -> Address {
        self.facilitator_address
    }

    /// Facilitator event stream.
    pub fn events(&mut self) -> &mut FacilitatorEventsChannel {
        &mut self.events
    }

    /// In-memory ledger, when the harness uses one.
    #[must_use]
    pub fn ledger(&self) -> Option<&InMemoryLedger> {
        self.ledger.as_deref()
    }

    /// Mock fullnode, when the harness uses one.
    #[must_use]
    pub fn aptos(&self) -> Option<&MockAptosNode> {
        self.aptos.as_ref()
    }

    /// The default user key.
    #[must_use]
    pub fn user_key(&self) -> &SigningKey {
        &self.user_key
    }

    /// Address of the default user.
    #[must_use]
    pub fn user_address(&self) -> Address {
        derive_address(self.user_key.verifying_key().as_bytes())
    }

    /// `GET {path}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get(&self, path: &str) -> Result<Response> {
        Ok(self.client.get(format!("{}{path}", self.base_url)).send().await?)
    }

    /// `POST {path}` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Response> {
        Ok(self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?)
    }

    /// Request an intent from the default user to `recipient`, returning
    /// the `intent` object of the 402 body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is not answered with 402.
    pub async fn request_intent(&self, recipient: &str, amount: u64) -> Result<Value> {
        let body = json!({
            "sender": self.user_address().to_string(),
            "recipient": recipient,
            "amount": amount,
        });
        let response = self.post("/api/auth/request-intent", &body).await?;
        if response.status() != reqwest::StatusCode::PAYMENT_REQUIRED {
            return Err(HarnessError::Response(format!("request-intent returned {}", response.status())));
        }
        let body: Value = response.json().await?;
        Ok(body["intent"].clone())
    }

    /// Sign an intent (as returned by `/request-intent`) with `key` and build
    /// the `/submit-authorization` body.
    ///
    /// # Errors
    ///
    /// Returns an error if the intent is malformed.
    pub fn sign_intent(key: &SigningKey, intent: &Value) -> Result<Value> {
        let field = |name: &str| {
            intent[name]
                .as_u64()
                .ok_or_else(|| HarnessError::Response(format!("intent field {name} missing")))
        };
        let address = |name: &str| {
            intent[name]
                .as_str()
                .and_then(|s| s.parse::<Address>().ok())
                .ok_or_else(|| HarnessError::Response(format!("intent field {name} missing")))
        };

        let authorization = PaymentAuthorizationIntent::new(
            address("sender")?,
            address("recipient")?,
            field("amount")?,
            field("nonce")?,
            field("expiry")?,
        );
        let signature = sign(key, &authorization);

        Ok(json!({
            "sender": intent["sender"],
            "recipient": intent["recipient"],
            "amount": intent["amount"],
            "nonce": intent["nonce"],
            "expiry": intent["expiry"],
            "signature": format!("0x{}", hex::encode(signature.to_bytes())),
            "publicKey": format!("0x{}", hex::encode(key.verifying_key().as_bytes())),
        }))
    }

    /// Request an intent and sign it with the default user key.
    ///
    /// # Errors
    ///
    /// Returns an error if the intent request fails.
    pub async fn signed_authorization(&self, recipient: &str, amount: u64) -> Result<Value> {
        let intent = self.request_intent(recipient, amount).await?;
        Self::sign_intent(&self.user_key, &intent)
    }

    /// `POST /api/auth/submit-authorization`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn submit(&self, body: &Value) -> Result<Response> {
        self.post("/api/auth/submit-authorization", body).await
    }

    /// Stop the facilitator and wait for the server to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the server exited with an error.
    pub async fn teardown(self) -> Result<()> {
        info!("Tearing down test harness");
        self.shutdown.shutdown();
        self.server
            .await
            .map_err(|e| HarnessError::Join(e.to_string()))??;
        if let Some(node) = &self.aptos {
            node.shutdown();
        }
        Ok(())
    }
}
