//! Command-line interface definition.

use clap::{Parser, ValueEnum};
use ed25519_dalek::SigningKey;
use gasless_facilitator::payment::signature::parse_private_key;
use gasless_facilitator::{Address, AptosNetwork, FacilitatorConfig, LedgerErrorPolicy};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::warn;

/// Gasless payment facilitator for Aptos.
#[derive(Parser, Debug)]
#[command(name = "gasless-facilitator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP server to.
    #[arg(long, env = "FACILITATOR_BIND_ADDRESS")]
    pub bind_address: Option<IpAddr>,

    /// Listening port (0 for auto-select).
    #[arg(long, short, env = "PORT")]
    pub port: Option<u16>,

    /// Aptos network.
    #[arg(long, value_enum, env = "APTOS_NETWORK")]
    pub network: Option<CliNetwork>,

    /// Fullnode REST endpoint (defaults to the network's public fullnode).
    #[arg(long, env = "APTOS_NODE_URL")]
    pub node_url: Option<String>,

    /// Address of the `payment_with_auth` module (defaults to the facilitator account).
    #[arg(long, env = "MODULE_ADDRESS")]
    pub module_address: Option<Address>,

    /// Facilitator private key, hex with optional `ed25519-priv-` prefix.
    #[arg(long, env = "FACILITATOR_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Minutes until an issued intent expires.
    #[arg(long, env = "FACILITATOR_EXPIRY_MINUTES")]
    pub expiry_minutes: Option<u64>,

    /// How to treat a failed ledger nonce query.
    #[arg(long, value_enum, env = "FACILITATOR_LEDGER_ERROR_POLICY")]
    pub ledger_error_policy: Option<CliLedgerErrorPolicy>,

    /// Wait for sponsored transactions to commit before answering.
    #[arg(long)]
    pub wait_for_commit: bool,

    /// Use the in-memory ledger; nothing reaches the chain.
    #[arg(long)]
    pub offline: bool,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

/// Network CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliNetwork {
    /// Aptos mainnet.
    Mainnet,
    /// Aptos testnet.
    Testnet,
    /// Aptos devnet.
    Devnet,
    /// Local node.
    Local,
}

/// Ledger error policy CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliLedgerErrorPolicy {
    /// Treat the nonce as unused.
    FailOpen,
    /// Reject with 503.
    FailClosed,
}

impl Cli {
    /// Convert CLI arguments into a FacilitatorConfig.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn to_config(&self) -> color_eyre::Result<FacilitatorConfig> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            FacilitatorConfig::from_file(path)?
        } else {
            FacilitatorConfig::default()
        };

        // Override with CLI arguments
        if let Some(bind_address) = self.bind_address {
            config.bind_address = bind_address;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(network) = self.network {
            config.ledger.network = network.into();
        }
        if let Some(ref node_url) = self.node_url {
            config.ledger.node_url = Some(node_url.clone());
        }
        if let Some(module_address) = self.module_address {
            config.ledger.module_address = Some(module_address);
        }
        if let Some(minutes) = self.expiry_minutes {
            config.payment.expiry_minutes = minutes;
        }
        if let Some(policy) = self.ledger_error_policy {
            config.payment.ledger_error_policy = policy.into();
        }
        config.ledger.wait_for_commit |= self.wait_for_commit;
        config.offline |= self.offline;
        config.log_level.clone_from(&self.log_level);

        Ok(config)
    }

    /// The facilitator signing key.
    ///
    /// Offline runs without a configured key get a throwaway one.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is malformed, or missing outside offline mode.
    pub fn signing_key(&self, offline: bool) -> color_eyre::Result<SigningKey> {
        match self.private_key {
            Some(ref key) => Ok(parse_private_key(key)?),
            None if offline => {
                warn!("No facilitator key configured, generating an ephemeral one for offline mode");
                Ok(SigningKey::generate(&mut rand::rngs::OsRng))
            }
            None => Err(color_eyre::eyre::eyre!(
                "FACILITATOR_PRIVATE_KEY is required (or pass --private-key, or run with --offline)"
            )),
        }
    }
}

impl From<CliNetwork> for AptosNetwork {
    fn from(n: CliNetwork) -> Self {
        match n {
            CliNetwork::Mainnet => Self::Mainnet,
            CliNetwork::Testnet => Self::Testnet,
            CliNetwork::Devnet => Self::Devnet,
            CliNetwork::Local => Self::Local,
        }
    }
}

impl From<CliLedgerErrorPolicy> for LedgerErrorPolicy {
    fn from(p: CliLedgerErrorPolicy) -> Self {
        match p {
            CliLedgerErrorPolicy::FailOpen => Self::FailOpen,
            CliLedgerErrorPolicy::FailClosed => Self::FailClosed,
        }
    }
}
