//! Configuration for gasless-facilitator.

use crate::payment::{Address, LedgerErrorPolicy};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Aptos network the facilitator submits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AptosNetwork {
    /// Aptos mainnet.
    Mainnet,
    /// Aptos testnet.
    #[default]
    Testnet,
    /// Aptos devnet.
    Devnet,
    /// A local node (`aptos node run-local-testnet`).
    Local,
}

impl AptosNetwork {
    /// Network name as used by explorers and clients.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
            Self::Local => "local",
        }
    }

    /// Default fullnode REST endpoint for the network.
    #[must_use]
    pub const fn default_node_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://fullnode.mainnet.aptoslabs.com",
            Self::Testnet => "https://fullnode.testnet.aptoslabs.com",
            Self::Devnet => "https://fullnode.devnet.aptoslabs.com",
            Self::Local => "http://127.0.0.1:8080",
        }
    }

    /// Explorer link for a transaction.
    #[must_use]
    pub fn explorer_url(self, transaction_hash: &str) -> String {
        format!(
            "https://explorer.aptoslabs.com/txn/{transaction_hash}?network={}",
            self.as_str()
        )
    }
}

/// Facilitator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitatorConfig {
    /// Address to bind the HTTP server to.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Listening port (0 for auto-select).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Run against the in-memory ledger instead of a real node.
    #[serde(default)]
    pub offline: bool,

    /// Ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Payment authorization configuration.
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Aptos ledger client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Network to submit to.
    #[serde(default)]
    pub network: AptosNetwork,

    /// Fullnode REST endpoint; defaults to the network's public fullnode.
    #[serde(default)]
    pub node_url: Option<String>,

    /// Address of the `payment_with_auth` module; defaults to the facilitator account.
    #[serde(default)]
    pub module_address: Option<Address>,

    /// Move type tag of the transferred coin.
    #[serde(default = "default_asset_type")]
    pub asset_type: String,

    /// Timeout for nonce and status queries, in seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Timeout for the whole submission, in seconds.
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,

    /// Maximum gas units the facilitator will pay per transfer.
    #[serde(default = "default_max_gas")]
    pub max_gas_amount: u64,

    /// Fixed gas unit price; estimated from the node when unset.
    #[serde(default)]
    pub gas_unit_price: Option<u64>,

    /// Lifetime of a submitted transaction, in seconds.
    #[serde(default = "default_transaction_ttl")]
    pub transaction_ttl_secs: u64,

    /// Wait for the transaction to commit before answering.
    #[serde(default)]
    pub wait_for_commit: bool,
}

/// Payment authorization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Minutes until an issued intent expires.
    #[serde(default = "default_expiry_minutes")]
    pub expiry_minutes: u64,

    /// What to do when the ledger nonce query fails.
    #[serde(default)]
    pub ledger_error_policy: LedgerErrorPolicy,

    /// Require the public key to derive the sender's address.
    #[serde(default = "default_true")]
    pub require_key_binding: bool,

    /// Asset label returned with issued intents.
    #[serde(default = "default_asset")]
    pub asset: String,
}

impl Default for FacilitatorConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            offline: false,
            ledger: LedgerConfig::default(),
            payment: PaymentConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            network: AptosNetwork::default(),
            node_url: None,
            module_address: None,
            asset_type: default_asset_type(),
            query_timeout_secs: default_query_timeout(),
            submit_timeout_secs: default_submit_timeout(),
            max_gas_amount: default_max_gas(),
            gas_unit_price: None,
            transaction_ttl_secs: default_transaction_ttl(),
            wait_for_commit: false,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            expiry_minutes: default_expiry_minutes(),
            ledger_error_policy: LedgerErrorPolicy::default(),
            require_key_binding: true,
            asset: default_asset(),
        }
    }
}

impl LedgerConfig {
    /// Effective fullnode endpoint, without a trailing slash.
    #[must_use]
    pub fn node_url(&self) -> String {
        self.node_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_node_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Query timeout as a duration.
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Submission timeout as a duration.
    #[must_use]
    pub const fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_port() -> u16 {
    3001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_asset_type() -> String {
    "0x1::aptos_coin::AptosCoin".to_string()
}

fn default_asset() -> String {
    "APT".to_string()
}

const fn default_query_timeout() -> u64 {
    10
}

const fn default_submit_timeout() -> u64 {
    30
}

const fn default_max_gas() -> u64 {
    10_000
}

const fn default_transaction_ttl() -> u64 {
    60
}

const fn default_expiry_minutes() -> u64 {
    5
}

const fn default_true() -> bool {
    true
}

impl FacilitatorConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
