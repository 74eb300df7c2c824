mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use dockrelay::{GatewayConfig, GatewayServer};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = GatewayConfig::load(cli.config.as_deref())
        .context("Failed to load gateway configuration")?;
    cli.command.overrides().apply(&mut config);
    config.validate().context("Invalid gateway configuration")?;

    match cli.command {
        Commands::Config(_) => {
            print!("{}", config.to_toml()?);
        }

        Commands::Serve(_) => {
            // Held until exit so buffered file logs are flushed
            let _guard = config
                .logging
                .init_tracing(cli.verbose)
                .context("Failed to initialize logging")?;

            info!("🚀 dockrelay starting up...");

            GatewayServer::from_config(config)?.run().await?;
        }
    }

    Ok(())
}
