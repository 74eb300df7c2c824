use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use dockrelay::GatewayConfig;

#[derive(Parser)]
#[command(name = "dockrelay")]
#[command(about = "REST gateway for container lifecycle operations on a local engine daemon")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (defaults to <config dir>/dockrelay/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the REST API until interrupted
    Serve(Overrides),

    /// Print the effective configuration as TOML
    Config(Overrides),
}

/// Settings that take precedence over the configuration file
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Listen address (host:port)
    #[arg(short, long, env = "DOCKRELAY_LISTEN")]
    pub listen: Option<String>,

    /// Engine daemon Unix socket
    #[arg(short, long, env = "DOCKER_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Route prefix, e.g. api/v1
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Engine API version prepended to daemon paths, e.g. v1.43
    #[arg(long)]
    pub daemon_api_version: Option<String>,

    /// Per-call daemon timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Emit JSON log lines
    #[arg(long)]
    pub json_logs: bool,
}

impl Commands {
    pub fn overrides(&self) -> &Overrides {
        match self {
            Commands::Serve(overrides) | Commands::Config(overrides) => overrides,
        }
    }
}

impl Overrides {
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(listen) = &self.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(socket) = &self.socket {
            config.docker_socket = socket.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.api_prefix = prefix.clone();
        }
        if let Some(version) = &self.daemon_api_version {
            config.daemon_api_version = Some(version.clone());
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = Some(timeout);
        }
        if self.json_logs {
            config.logging.json = true;
        }
    }
}
