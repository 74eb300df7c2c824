use serde::Serialize;
use serde_json::Value;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

use crate::error::GatewayError;
use crate::types::ApiMessage;

/// The only value ever written back to an HTTP caller: a status code and a
/// JSON body that is either the operation's payload or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    status: StatusCode,
    body: Value,
}

impl Envelope {
    /// Success payload. A payload that fails to serialize becomes a 500.
    pub fn ok<T: Serialize>(status: StatusCode, payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(body) => Self { status, body },
            Err(e) => Self::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self::ok(
            status,
            &ApiMessage {
                message: message.into(),
            },
        )
    }

    pub fn error(status: StatusCode, error: impl Into<String>) -> Self {
        let error: String = error.into();
        Self {
            status,
            body: serde_json::json!({ "error": error }),
        }
    }

    pub fn failure(err: &GatewayError) -> Self {
        Self::error(err.status_code(), err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}

impl Reply for Envelope {
    fn into_response(self) -> Response {
        warp::reply::with_status(warp::reply::json(&self.body), self.status).into_response()
    }
}
