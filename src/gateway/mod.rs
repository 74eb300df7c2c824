//! REST-to-daemon translation.
//!
//! Each public operation of [`ContainerGateway`] performs its daemon calls,
//! interprets the engine's status codes and hands back an [`Envelope`]. The
//! engine overloads its HTTP statuses (204 for "done", 304 for "nothing to
//! do"), so mutating operations never forward a daemon status unexamined.

use bytes::Bytes;
use hyper::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use warp::http::StatusCode;

use crate::daemon::{DaemonResponse, DaemonTransport, paths};
use crate::error::{GatewayError, Result};
use crate::types::{
    ContainerSummary, CreateContainerRequest, CreateContainerResponse, DaemonErrorBody,
    InspectObject, ProcessTable, PruneResponse,
};

pub mod bulk;
pub mod envelope;

pub use bulk::{BulkFailure, BulkOutcome, StopAll};
pub use envelope::Envelope;

pub const CONTAINER_STARTED: &str = "Container started";
pub const CONTAINER_ALREADY_STARTED: &str = "Container already started";
pub const CONTAINER_STOPPED: &str = "Container stopped";
pub const CONTAINER_ALREADY_STOPPED: &str = "Container already stopped";
pub const NO_SUCH_CONTAINER: &str = "No such container";
pub const NO_SUCH_IMAGE: &str = "No such image";
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong";

/// Single-container state transitions sharing one status table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    Stop,
}

impl Lifecycle {
    fn path(self, id: &str) -> String {
        match self {
            Lifecycle::Start => paths::start(id),
            Lifecycle::Stop => paths::stop(id),
        }
    }

    fn done(self) -> &'static str {
        match self {
            Lifecycle::Start => CONTAINER_STARTED,
            Lifecycle::Stop => CONTAINER_STOPPED,
        }
    }

    fn already(self) -> &'static str {
        match self {
            Lifecycle::Start => CONTAINER_ALREADY_STARTED,
            Lifecycle::Stop => CONTAINER_ALREADY_STOPPED,
        }
    }

    /// Map the daemon's reply to a start/stop call onto the client contract
    pub fn interpret(self, status: StatusCode) -> Envelope {
        match status {
            StatusCode::NO_CONTENT => Envelope::message(StatusCode::OK, self.done()),
            StatusCode::NOT_MODIFIED => Envelope::message(StatusCode::OK, self.already()),
            StatusCode::NOT_FOUND => Envelope::error(StatusCode::NOT_FOUND, NO_SUCH_CONTAINER),
            other => {
                warn!(action = ?self, status = %other, "unexpected daemon status");
                Envelope::error(StatusCode::INTERNAL_SERVER_ERROR, SOMETHING_WENT_WRONG)
            }
        }
    }
}

/// Container operations proxied to the engine daemon.
///
/// Cheap to clone; all clones share the same transport.
#[derive(Clone)]
pub struct ContainerGateway {
    transport: Arc<dyn DaemonTransport>,
    stop_all: StopAll,
}

impl ContainerGateway {
    pub fn new(transport: Arc<dyn DaemonTransport>) -> Self {
        Self {
            transport,
            stop_all: StopAll::default(),
        }
    }

    /// `GET /containers/json`
    #[instrument(skip(self))]
    pub async fn list_containers(&self) -> Envelope {
        match self.call(Method::GET, paths::LIST_CONTAINERS, None).await {
            Ok(response) => read_through::<Vec<ContainerSummary>>(&response),
            Err(e) => Envelope::failure(&e),
        }
    }

    /// `GET /containers/{id}/json`
    #[instrument(skip(self))]
    pub async fn inspect_container(&self, id: &str) -> Envelope {
        let result = async {
            let id = validate_id(id)?;
            self.call(Method::GET, &paths::inspect(id), None).await
        }
        .await;

        match result {
            Ok(response) => read_through::<InspectObject>(&response),
            Err(e) => Envelope::failure(&e),
        }
    }

    /// `GET /containers/{id}/top`; always 200 once the table decodes
    #[instrument(skip(self))]
    pub async fn container_processes(&self, id: &str) -> Envelope {
        let result = async {
            let id = validate_id(id)?;
            let response = self.call(Method::GET, &paths::top(id), None).await?;
            response.json::<ProcessTable>()
        }
        .await;

        match result {
            Ok(table) => Envelope::ok(StatusCode::OK, &table),
            Err(e) => Envelope::failure(&e),
        }
    }

    /// `POST /containers/create` with the caller's body forwarded verbatim
    #[instrument(skip(self, body))]
    pub async fn create_container(&self, body: Option<Bytes>) -> Envelope {
        let Some(body) = body.filter(|b| !b.is_empty()) else {
            return Envelope::failure(&GatewayError::bad_request(
                "container create requires a request body",
            ));
        };
        let image = CreateContainerRequest::image_of(&body);

        let response = match self
            .call(Method::POST, paths::CREATE_CONTAINER, Some(body))
            .await
        {
            Ok(response) => response,
            Err(e) => return Envelope::failure(&e),
        };

        match response.status {
            StatusCode::CREATED => match response.json::<CreateContainerResponse>() {
                Ok(created) => Envelope::ok(StatusCode::CREATED, &created),
                Err(e) => Envelope::failure(&e),
            },
            // Carried over from the start table; create never reports 304 in practice.
            StatusCode::NOT_MODIFIED => {
                Envelope::message(StatusCode::OK, CONTAINER_ALREADY_STARTED)
            }
            StatusCode::NOT_FOUND => {
                Envelope::error(StatusCode::NOT_FOUND, no_such_image(image, &response))
            }
            other => {
                warn!(status = %other, "unexpected daemon status for create");
                Envelope::error(StatusCode::INTERNAL_SERVER_ERROR, SOMETHING_WENT_WRONG)
            }
        }
    }

    /// `POST /containers/{id}/start`
    pub async fn start_container(&self, id: &str, body: Option<Bytes>) -> Envelope {
        self.transition(Lifecycle::Start, id, body).await
    }

    /// `POST /containers/{id}/stop`
    pub async fn stop_container(&self, id: &str, body: Option<Bytes>) -> Envelope {
        self.transition(Lifecycle::Stop, id, body).await
    }

    /// `POST /containers/prune`; always 200 once the result decodes
    #[instrument(skip(self, filters))]
    pub async fn prune_containers(&self, filters: Option<Bytes>) -> Envelope {
        let filters = filters.filter(|b| !b.is_empty());
        let result = async {
            let response = self
                .call(Method::POST, paths::PRUNE_CONTAINERS, filters)
                .await?;
            response.json::<PruneResponse>()
        }
        .await;

        match result {
            Ok(pruned) => Envelope::ok(StatusCode::OK, &pruned),
            Err(e) => Envelope::failure(&e),
        }
    }

    /// Stop every container the daemon currently lists
    #[instrument(skip(self))]
    pub async fn stop_all_containers(&self) -> Envelope {
        let containers = match self.fetch_containers().await {
            Ok(containers) => containers,
            Err(e) => {
                warn!("stop-all aborted before any stop was issued: {}", e);
                return Envelope::failure(&e);
            }
        };

        match self.stop_all.run(self.transport.as_ref(), &containers).await {
            Ok(outcome) => outcome.into_envelope(),
            Err(e) => Envelope::failure(&e),
        }
    }

    /// Current container list, decoded without status interpretation
    pub async fn fetch_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.call(Method::GET, paths::LIST_CONTAINERS, None)
            .await?
            .json()
    }

    #[instrument(skip(self, body))]
    async fn transition(&self, action: Lifecycle, id: &str, body: Option<Bytes>) -> Envelope {
        let result = async {
            let id = validate_id(id)?;
            let body = body.filter(|b| !b.is_empty());
            self.call(Method::POST, &action.path(id), body).await
        }
        .await;

        match result {
            Ok(response) => action.interpret(response.status),
            Err(e) => Envelope::failure(&e),
        }
    }

    async fn call(&self, method: Method, path: &str, body: Option<Bytes>) -> Result<DaemonResponse> {
        let response = self.transport.request(method, path, body).await?;
        debug!(path, status = %response.status, bytes = response.body.len(), "daemon replied");
        Ok(response)
    }
}

/// Decode a read operation's reply and forward the daemon status with it.
///
/// Non-2xx replies carry the engine's `{"message": ...}` body, which is
/// surfaced as the envelope's error text.
fn read_through<T>(response: &DaemonResponse) -> Envelope
where
    T: DeserializeOwned + Serialize,
{
    if !response.status.is_success() {
        return match response.json::<DaemonErrorBody>() {
            Ok(err) => Envelope::error(response.status, err.message),
            Err(e) => Envelope::failure(&e),
        };
    }

    match response.json::<T>() {
        Ok(payload) => Envelope::ok(response.status, &payload),
        Err(e) => Envelope::failure(&e),
    }
}

fn no_such_image(image: Option<String>, response: &DaemonResponse) -> String {
    match image {
        Some(image) => format!("{}: {}", NO_SUCH_IMAGE, image),
        None => response
            .json::<DaemonErrorBody>()
            .map(|err| err.message)
            .unwrap_or_else(|_| NO_SUCH_IMAGE.to_string()),
    }
}

/// Container ids and names as the engine accepts them
pub fn validate_id(id: &str) -> Result<&str> {
    if id.is_empty() {
        return Err(GatewayError::bad_request("container id must not be empty"));
    }
    let valid = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !valid {
        return Err(GatewayError::bad_request(format!(
            "invalid container id '{}'",
            id
        )));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::MockDaemonTransport;
    use crate::error::TransportError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    fn gateway(mock: MockDaemonTransport) -> ContainerGateway {
        ContainerGateway::new(Arc::new(mock))
    }

    fn reply(status: u16, body: &'static str) -> std::result::Result<DaemonResponse, TransportError> {
        Ok(DaemonResponse::new(StatusCode::from_u16(status).unwrap(), body))
    }

    fn refused() -> std::result::Result<DaemonResponse, TransportError> {
        Err(TransportError::Connect {
            socket: "/var/run/docker.sock".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
        })
    }

    #[test_case(Lifecycle::Start, 204, 200, "message", "Container started" ; "start done")]
    #[test_case(Lifecycle::Start, 304, 200, "message", "Container already started" ; "start not modified")]
    #[test_case(Lifecycle::Start, 404, 404, "error", "No such container" ; "start missing")]
    #[test_case(Lifecycle::Start, 409, 500, "error", "Something went wrong" ; "start conflict")]
    #[test_case(Lifecycle::Stop, 204, 200, "message", "Container stopped" ; "stop done")]
    #[test_case(Lifecycle::Stop, 304, 200, "message", "Container already stopped" ; "stop not modified")]
    #[test_case(Lifecycle::Stop, 404, 404, "error", "No such container" ; "stop missing")]
    #[test_case(Lifecycle::Stop, 500, 500, "error", "Something went wrong" ; "stop daemon error")]
    #[test_case(Lifecycle::Stop, 200, 500, "error", "Something went wrong" ; "stop plain ok")]
    fn lifecycle_status_table(action: Lifecycle, daemon: u16, expected: u16, key: &str, text: &str) {
        let envelope = action.interpret(StatusCode::from_u16(daemon).unwrap());
        assert_eq!(envelope.status().as_u16(), expected);
        assert_eq!(envelope.body(), &json!({ key: text }));
    }

    #[tokio::test]
    async fn list_forwards_empty_sequence() {
        let mut mock = MockDaemonTransport::new();
        mock.expect_request()
            .withf(|method, path, body| {
                *method == Method::GET && path == "/containers/json" && body.is_none()
            })
            .times(1)
            .returning(|_, _, _| reply(200, "[]"));

        let envelope = gateway(mock).list_containers().await;
        assert_eq!(envelope.status(), StatusCode::OK);
        assert_eq!(envelope.body(), &json!([]));
    }

    #[tokio::test]
    async fn list_transport_failure_is_500_with_cause() {
        let mut mock = MockDaemonTransport::new();
        mock.expect_request().returning(|_, _, _| refused());

        let envelope = gateway(mock).list_containers().await;
        assert_eq!(envelope.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = envelope.body()["error"].as_str().unwrap();
        assert!(text.contains("connection refused"));
    }

    #[tokio::test]
    async fn list_decode_failure_is_500_with_message() {
        let mut mock = MockDaemonTransport::new();
        mock.expect_request()
            .times(1)
            .returning(|_, _, _| reply(200, r#"{"not":"a list"}"#));

        let envelope = gateway(mock).list_containers().await;
        assert_eq!(envelope.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = envelope.body()["error"].as_str().unwrap();
        assert!(text.starts_with("Failed to decode daemon response"), "{text}");
    }

    #[tokio::test]
    async fn inspect_forwards_daemon_error_message() {
        let mut mock = MockDaemonTransport::new();
        mock.expect_request()
            .withf(|_, path, _| path == "/containers/ghost/json")
            .returning(|_, _, _| reply(404, r#"{"message":"No such container: ghost"}"#));

        let envelope = gateway(mock).inspect_container("ghost").await;
        assert_eq!(envelope.status(), StatusCode::NOT_FOUND);
        assert_eq!(envelope.body(), &json!({"error": "No such container: ghost"}));
    }

    #[tokio::test]
    async fn inspect_rejects_path_like_ids_without_calling_the_daemon() {
        let mock = MockDaemonTransport::new();
        let envelope = gateway(mock).inspect_container("..%2Fimages").await;
        assert_eq!(envelope.status(), StatusCode::BAD_REQUEST);
    }

    #[test_case("inspect" ; "inspect")]
    #[test_case("top" ; "top")]
    #[test_case("prune" ; "prune")]
    #[tokio::test]
    async fn decode_failures_are_500_with_message(operation: &str) {
        let mut mock = MockDaemonTransport::new();
        mock.expect_request()
            .times(3)
            .returning(|_, _, _| reply(200, "{\"truncated"));
        let gateway = gateway(mock);

        for _ in 0..3 {
            let envelope = match operation {
                "inspect" => gateway.inspect_container("abc").await,
                "top" => gateway.container_processes("abc").await,
                _ => gateway.prune_containers(None).await,
            };
            assert_eq!(envelope.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert!(!envelope.body()["error"].as_str().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn top_is_200_whatever_the_daemon_status() {
        let mut mock = MockDaemonTransport::new();
        mock.expect_request()
            .withf(|method, path, _| *method == Method::GET && path == "/containers/abc/top")
            .returning(|_, _, _| {
                reply(
                    202,
                    r#"{"Titles":["PID","CMD"],"Processes":[["1","nginx"],["7","worker"]]}"#,
                )
            });

        let envelope = gateway(mock).container_processes("abc").await;
        assert_eq!(envelope.status(), StatusCode::OK);
        assert_eq!(
            envelope.body(),
            &json!({"Titles": ["PID", "CMD"], "Processes": [["1", "nginx"], ["7", "worker"]]})
        );
    }

    #[tokio::test]
    async fn prune_forwards_filters_and_reports_200() {
        let mut mock = MockDaemonTransport::new();
        mock.expect_request()
            .withf(|method, path, body| {
                *method == Method::POST
                    && path == "/containers/prune"
                    && body.as_deref() == Some(br#"{"until":["24h"]}"#.as_slice())
            })
            .returning(|_, _, _| {
                reply(200, r#"{"ContainersDeleted":["a","b"],"SpaceReclaimed":2048}"#)
            });

        let envelope = gateway(mock)
            .prune_containers(Some(Bytes::from_static(br#"{"until":["24h"]}"#)))
            .await;
        assert_eq!(envelope.status(), StatusCode::OK);
        assert_eq!(
            envelope.body(),
            &json!({"ContainersDeleted": ["a", "b"], "SpaceReclaimed": 2048})
        );
    }

    #[tokio::test]
    async fn create_without_body_is_a_client_error() {
        let mock = MockDaemonTransport::new();
        let envelope = gateway(mock).create_container(Some(Bytes::new())).await;
        assert_eq!(envelope.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_forwards_body_and_decodes_201() {
        let payload = br#"{"Image":"nginx:latest","Cmd":["nginx"]}"#;
        let mut mock = MockDaemonTransport::new();
        mock.expect_request()
            .withf(move |method, path, body| {
                *method == Method::POST
                    && path == "/containers/create"
                    && body.as_deref() == Some(payload.as_slice())
            })
            .returning(|_, _, _| reply(201, r#"{"Id":"4fa6e0f0c678","Warnings":[]}"#));

        let envelope = gateway(mock)
            .create_container(Some(Bytes::from_static(payload)))
            .await;
        assert_eq!(envelope.status(), StatusCode::CREATED);
        assert_eq!(envelope.body(), &json!({"Id": "4fa6e0f0c678", "Warnings": []}));
    }

    #[test_case(304, 200, json!({"message": "Container already started"}) ; "not modified")]
    #[test_case(404, 404, json!({"error": "No such image: nginx:nope"}) ; "missing image")]
    #[test_case(409, 500, json!({"error": "Something went wrong"}) ; "conflict")]
    #[tokio::test]
    async fn create_status_table(daemon: u16, expected: u16, body: serde_json::Value) {
        let mut mock = MockDaemonTransport::new();
        mock.expect_request()
            .returning(move |_, _, _| reply(daemon, r#"{"message":"daemon says no"}"#));

        let envelope = gateway(mock)
            .create_container(Some(Bytes::from_static(br#"{"Image":"nginx:nope"}"#)))
            .await;
        assert_eq!(envelope.status().as_u16(), expected);
        assert_eq!(envelope.body(), &body);
    }

    #[tokio::test]
    async fn second_start_reports_already_started() {
        let mut calls = 0;
        let mut mock = MockDaemonTransport::new();
        mock.expect_request()
            .withf(|_, path, _| path == "/containers/web/start")
            .times(2)
            .returning(move |_, _, _| {
                calls += 1;
                if calls == 1 { reply(204, "") } else { reply(304, "") }
            });
        let gateway = gateway(mock);

        let first = gateway.start_container("web", None).await;
        let second = gateway.start_container("web", None).await;

        assert_eq!(first.body(), &json!({"message": "Container started"}));
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.body(), &json!({"message": "Container already started"}));
    }

    #[tokio::test]
    async fn stop_forwards_caller_body() {
        let mut mock = MockDaemonTransport::new();
        mock.expect_request()
            .withf(|method, path, body| {
                *method == Method::POST
                    && path == "/containers/web/stop"
                    && body.as_deref() == Some(br#"{"t":1}"#.as_slice())
            })
            .returning(|_, _, _| reply(204, ""));

        let envelope = gateway(mock)
            .stop_container("web", Some(Bytes::from_static(br#"{"t":1}"#)))
            .await;
        assert_eq!(envelope.body(), &json!({"message": "Container stopped"}));
    }

    #[tokio::test]
    async fn stop_transport_failure_is_500() {
        let mut mock = MockDaemonTransport::new();
        mock.expect_request().returning(|_, _, _| refused());

        let envelope = gateway(mock).stop_container("web", None).await;
        assert_eq!(envelope.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validate_id_accepts_engine_names() {
        assert!(validate_id("4fa6e0f0c678").is_ok());
        assert!(validate_id("my_web-1.blue").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("a?b").is_err());
    }
}
