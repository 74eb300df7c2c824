use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{GatewayError, Result};

pub const LOG_FILE_PREFIX: &str = "dockrelay.log";

/// Logging section of the gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// JSON console output instead of the compact format
    pub json: bool,
    /// Directory for a daily-rolling JSON log file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    /// `RUST_LOG` wins; then `--verbose`; then the configured level
    pub fn env_filter(&self, verbose: bool) -> EnvFilter {
        let level = if verbose { "debug" } else { self.level.as_str() };
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Install the global subscriber.
    ///
    /// The returned guard flushes the file writer on drop and must be held
    /// for the life of the process.
    pub fn init_tracing(&self, verbose: bool) -> Result<Option<WorkerGuard>> {
        let env_filter = self.env_filter(verbose);

        let (file_layer, guard) = match &self.log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .json()
                    .with_current_span(true);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        let registry = Registry::default().with(env_filter).with(file_layer);

        let installed = if self.json {
            registry
                .with(
                    fmt::layer()
                        .with_writer(io::stdout)
                        .json()
                        .flatten_event(true)
                        .with_current_span(true)
                        .with_span_list(false),
                )
                .try_init()
        } else {
            registry
                .with(fmt::layer().with_writer(io::stdout).with_target(true).compact())
                .try_init()
        };
        installed.map_err(|e| GatewayError::Other(e.into()))?;

        Ok(guard)
    }
}

/// One structured event per served request
pub fn log_api_request(method: &str, path: &str, status_code: u16, elapsed: Duration, remote: Option<&str>) {
    tracing::info!(
        target: "dockrelay::access",
        method = %method,
        path = %path,
        status_code = status_code,
        duration_ms = elapsed.as_secs_f64() * 1000.0,
        remote = remote.unwrap_or("-"),
        "API request"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_to_info_on_console_only() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn parses_from_toml() {
        let config: LoggingConfig =
            toml::from_str("level = \"dockrelay=trace\"\nlog_dir = \"/var/log/dockrelay\"").unwrap();
        assert_eq!(config.level, "dockrelay=trace");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/dockrelay")));
    }
}
