//! gasless-facilitator CLI entry point.

mod cli;

use clap::Parser;
use cli::Cli;
use gasless_facilitator::FacilitatorBuilder;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!("gasless-facilitator v{}", env!("CARGO_PKG_VERSION"));

    // Build configuration
    let config = cli.to_config()?;
    let signing_key = cli.signing_key(config.offline)?;

    // Build and run the facilitator
    let facilitator = FacilitatorBuilder::new(config, signing_key).build().await?;

    // Run until shutdown
    facilitator.run().await?;

    info!("Goodbye!");
    Ok(())
}
