//! Logging for the gateway process.

pub mod tracing_setup;

pub use tracing_setup::{LoggingConfig, log_api_request};
