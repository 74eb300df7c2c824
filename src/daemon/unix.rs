//! Daemon transport over the engine's Unix domain socket.

use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Body, Method, Request};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::debug;

use super::{DaemonResponse, DaemonTransport};
use crate::error::TransportError;

/// Default engine socket
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/docker.sock";

/// HTTP/1.1 client speaking to the daemon over a Unix socket.
///
/// Every call opens its own connection, so one instance can serve any number
/// of concurrent requests without locking.
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    socket_path: PathBuf,
    api_version: Option<String>,
    timeout: Option<Duration>,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            api_version: None,
            timeout: None,
        }
    }

    /// Prefix every daemon path with an engine API version such as `v1.43`
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        let version = version.trim_matches('/');
        self.api_version = (!version.is_empty()).then(|| version.to_string());
        self
    }

    /// Bound each daemon exchange, body included
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn versioned(&self, path: &str) -> String {
        match &self.api_version {
            Some(version) => format!("/{}{}", version, path),
            None => path.to_string(),
        }
    }

    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<DaemonResponse, TransportError> {
        let stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|source| TransportError::Connect {
                    socket: self.socket_path.clone(),
                    source,
                })?;

        let (mut sender, conn) = hyper::client::conn::handshake(stream)
            .await
            .map_err(TransportError::Handshake)?;

        // The connection task ends once `sender` is dropped on return.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("daemon connection closed: {}", e);
            }
        });

        let builder = Request::builder()
            .method(method)
            .uri(format!("http://localhost{}", self.versioned(path)))
            .header(HOST, "localhost");

        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body))?,
            None => builder.body(Body::empty())?,
        };

        let response = sender
            .send_request(request)
            .await
            .map_err(TransportError::Request)?;

        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(TransportError::Body)?;

        Ok(DaemonResponse { status, body })
    }
}

impl Default for UnixSocketTransport {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_PATH)
    }
}

#[async_trait]
impl DaemonTransport for UnixSocketTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<DaemonResponse, TransportError> {
        debug!(%method, path, "daemon call");

        match self.timeout {
            Some(after) => tokio::time::timeout(after, self.exchange(method, path, body))
                .await
                .map_err(|_| TransportError::Timeout {
                    path: path.to_string(),
                    after,
                })?,
            None => self.exchange(method, path, body).await,
        }
    }
}
