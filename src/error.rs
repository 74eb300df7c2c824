use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use warp::http::StatusCode;

/// Gateway error types, each mapped to the HTTP status written in its envelope
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Daemon transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to decode daemon response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to encode daemon request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Bad request: {reason}")]
    BadRequest { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Generic error: {0}")]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }

    /// HTTP status reported to the caller for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to connect to daemon socket {}: {source}", socket.display())]
    Connect {
        socket: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP handshake with daemon failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("daemon request failed: {0}")]
    Request(#[source] hyper::Error),

    #[error("failed to read daemon response body: {0}")]
    Body(#[source] hyper::Error),

    #[error("invalid daemon request: {0}")]
    InvalidRequest(#[from] hyper::http::Error),

    #[error("daemon call {path} timed out after {after:?}")]
    Timeout { path: String, after: Duration },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found at path: {path}")]
    NotFound { path: String },

    #[error("Invalid listen address '{addr}': {reason}")]
    InvalidListenAddr { addr: String, reason: String },

    #[error("Invalid API prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: String },
}

/// Convenience type alias for gateway results
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let err = GatewayError::bad_request("request body is required");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Bad request: request body is required");
    }

    #[test]
    fn transport_errors_map_to_500_and_keep_the_cause() {
        let err: GatewayError = TransportError::Connect {
            socket: PathBuf::from("/run/missing.sock"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        }
        .into();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = err.to_string();
        assert!(text.contains("/run/missing.sock"));
        assert!(text.contains("No such file or directory"));
    }

    #[test]
    fn encode_errors_are_not_reported_as_decode_errors() {
        let source = serde_json::from_str::<Vec<String>>("{").unwrap_err();
        let err = GatewayError::Encode(source);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Failed to encode daemon request"));
    }

    #[test]
    fn decode_errors_map_to_500() {
        let source = serde_json::from_str::<Vec<String>>("{").unwrap_err();
        let err = GatewayError::from(source);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Failed to decode daemon response"));
    }
}
