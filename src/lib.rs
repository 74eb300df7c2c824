//! dockrelay - REST gateway for a local container engine
//!
//! Translates a small HTTP API (list, inspect, top, create, start, stop,
//! stop-all, prune) into calls against the engine daemon's Unix socket and
//! maps the engine's status codes onto plain JSON replies.

pub mod config;
pub mod daemon;
pub mod error;
pub mod gateway;
pub mod monitoring;
pub mod server;
pub mod types;

pub use config::GatewayConfig;
pub use daemon::{DaemonResponse, DaemonTransport, UnixSocketTransport};
pub use error::{ConfigError, GatewayError, Result, TransportError};
pub use gateway::{ContainerGateway, Envelope};
pub use monitoring::LoggingConfig;
pub use server::{GatewayServer, RouteOptions, ServerInfo, routes};
