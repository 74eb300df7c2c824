use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::daemon::unix::DEFAULT_SOCKET_PATH;
use crate::error::{ConfigError, GatewayError, Result};
use crate::monitoring::LoggingConfig;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_MAX_BODY_BYTES: u64 = 1024 * 1024;
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Gateway configuration, read from TOML and then overridden from the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address the REST surface binds to
    pub listen_addr: String,
    /// Engine daemon Unix socket
    pub docker_socket: PathBuf,
    /// Path prefix for every route, e.g. `api/v1`
    pub api_prefix: String,
    /// Engine API version prepended to daemon paths, e.g. `v1.43`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon_api_version: Option<String>,
    /// Upper bound on a single daemon exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    pub max_body_bytes: u64,
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            docker_socket: PathBuf::from(DEFAULT_SOCKET_PATH),
            api_prefix: String::new(),
            daemon_api_version: None,
            request_timeout_secs: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// `<config dir>/dockrelay/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dockrelay").join(CONFIG_FILE_NAME))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one the default location is read
    /// when present, otherwise built-in defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };

        let config = match path {
            Some(path) => {
                debug!("Loading gateway config from {}", path.display());
                Self::from_toml_str(&std::fs::read_to_string(&path)?)?
            }
            None => {
                debug!("No gateway config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GatewayError::Other(e.into()))
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        for segment in self.prefix_segments() {
            let valid = segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
            if !valid || segment == "." || segment == ".." {
                return Err(ConfigError::InvalidPrefix {
                    prefix: self.api_prefix.clone(),
                    reason: format!("segment '{}' is not a plain path segment", segment),
                }
                .into());
            }
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::InvalidListenAddr {
                addr: self.listen_addr.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Route prefix split into path segments; empty for no prefix
    pub fn prefix_segments(&self) -> Vec<String> {
        self.api_prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
