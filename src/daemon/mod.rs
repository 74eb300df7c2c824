//! Access to the container engine daemon.

use async_trait::async_trait;
use bytes::Bytes;
use hyper::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{GatewayError, Result, TransportError};

pub mod unix;

pub use unix::UnixSocketTransport;

/// A fully read daemon response.
///
/// The transport drains the body and releases the connection before handing
/// this back, so holding a `DaemonResponse` never pins a socket.
#[derive(Debug, Clone)]
pub struct DaemonResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl DaemonResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(GatewayError::Decode)
    }
}

/// HTTP-shaped request/response exchange with the engine daemon.
///
/// Implementations must be safe to share across concurrently running
/// requests; the gateway holds one instance behind an `Arc`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DaemonTransport: Send + Sync {
    /// Issue `method path` with an optional JSON body
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
    ) -> std::result::Result<DaemonResponse, TransportError>;
}

/// Engine API paths used by the gateway
pub mod paths {
    pub const LIST_CONTAINERS: &str = "/containers/json";
    pub const CREATE_CONTAINER: &str = "/containers/create";
    pub const PRUNE_CONTAINERS: &str = "/containers/prune";

    pub fn inspect(id: &str) -> String {
        format!("/containers/{}/json", id)
    }

    pub fn top(id: &str) -> String {
        format!("/containers/{}/top", id)
    }

    pub fn start(id: &str) -> String {
        format!("/containers/{}/start", id)
    }

    pub fn stop(id: &str) -> String {
        format!("/containers/{}/stop", id)
    }
}
