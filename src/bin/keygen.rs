//! Ed25519 key utility for gasless-facilitator.
//!
//! Generates a facilitator (or test user) keypair and prints:
//! - Private key in AIP-80 form (for `FACILITATOR_PRIVATE_KEY`)
//! - Public key
//! - Derived Aptos account address (fund this account with gas)
//!
//! It can also sign a payment intent, producing a body ready for
//! `POST /api/auth/submit-authorization`.
//!
//! Usage:
//!   cargo run --bin facilitator-keygen -- [--output <dir>]
//!   cargo run --bin facilitator-keygen -- sign --private-key <hex> --recipient <addr> \
//!       --amount <n> --nonce <n> --expiry <unix-secs>

use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use gasless_facilitator::payment::signature::{derive_address, format_private_key, parse_private_key, sign};
use gasless_facilitator::{Address, PaymentAuthorizationIntent};
use std::fs;
use std::path::PathBuf;

/// Ed25519 keypair generator and intent signer.
#[derive(Parser, Debug)]
#[command(name = "facilitator-keygen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory to write `facilitator.key` into.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign a payment intent with a user key.
    Sign {
        /// User private key, hex with optional `ed25519-priv-` prefix.
        #[arg(long, env = "USER_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        /// Receiving account.
        #[arg(long)]
        recipient: Address,
        /// Amount in base units.
        #[arg(long)]
        amount: u64,
        /// Nonce issued by the facilitator.
        #[arg(long)]
        nonce: u64,
        /// Expiry issued by the facilitator (Unix seconds).
        #[arg(long)]
        expiry: u64,
    },
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Sign {
            private_key,
            recipient,
            amount,
            nonce,
            expiry,
        }) => sign_intent(&private_key, recipient, amount, nonce, expiry),
        None => generate(cli.output),
    }
}

fn generate(output: Option<PathBuf>) -> color_eyre::Result<()> {
    println!("Ed25519 keypair generator for gasless-facilitator\n");

    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    let public_key = signing_key.verifying_key();
    let address = derive_address(public_key.as_bytes());
    let private_key = format_private_key(&signing_key);

    println!("Private key: {private_key}");
    println!("Public key:  0x{}", hex::encode(public_key.as_bytes()));
    println!("Address:     {address}");

    if let Some(dir) = output {
        fs::create_dir_all(&dir)?;
        let path = dir.join("facilitator.key");
        fs::write(&path, format!("{private_key}\n"))?;
        println!("\nPrivate key saved to: {}", path.display());
        println!("  WARNING: Keep this file secure! It controls the gas-paying account.");
    }

    println!("\nFund {address} with APT before running the facilitator against a live network.");
    Ok(())
}

fn sign_intent(private_key: &str, recipient: Address, amount: u64, nonce: u64, expiry: u64) -> color_eyre::Result<()> {
    let signing_key = parse_private_key(private_key)?;
    let public_key = signing_key.verifying_key();
    let sender = derive_address(public_key.as_bytes());

    let intent = PaymentAuthorizationIntent::new(sender, recipient, amount, nonce, expiry);
    let signature = sign(&signing_key, &intent);

    let body = serde_json::json!({
        "sender": sender.to_string(),
        "recipient": recipient.to_string(),
        "amount": amount.to_string(),
        "nonce": nonce.to_string(),
        "expiry": expiry.to_string(),
        "signature": format!("0x{}", hex::encode(signature.to_bytes())),
        "publicKey": format!("0x{}", hex::encode(public_key.as_bytes())),
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
