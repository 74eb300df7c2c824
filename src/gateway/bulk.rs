//! Bulk stop: one uniform stop policy fanned out over the daemon's current
//! container list.

use bytes::Bytes;
use hyper::Method;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warp::http::StatusCode;

use super::Envelope;
use crate::daemon::{DaemonTransport, paths};
use crate::error::{GatewayError, Result, TransportError};
use crate::types::{ContainerSummary, StopParameters};

pub const ALL_CONTAINERS_STOPPED: &str = "all containers stopped";

/// Sequential stop of a container set.
///
/// Containers are visited in the order the daemon listed them. Per-item daemon
/// statuses are logged but not interpreted; only a transport failure ends the
/// run early, leaving the remaining containers untouched.
#[derive(Debug, Clone, Default)]
pub struct StopAll {
    params: StopParameters,
}

/// What a bulk stop did before it finished or gave up
#[derive(Debug)]
pub struct BulkOutcome {
    pub batch_id: Uuid,
    /// Containers whose stop call reached the daemon, in call order
    pub stopped: Vec<String>,
    /// Containers never attempted because the run aborted
    pub unprocessed: usize,
    pub failure: Option<BulkFailure>,
}

#[derive(Debug)]
pub struct BulkFailure {
    pub container_id: String,
    pub error: TransportError,
}

impl StopAll {
    pub async fn run(
        &self,
        transport: &dyn DaemonTransport,
        containers: &[ContainerSummary],
    ) -> Result<BulkOutcome> {
        let batch_id = Uuid::new_v4();
        let body = Bytes::from(serde_json::to_vec(&self.params).map_err(GatewayError::Encode)?);
        let query = self.params.query();

        info!(
            batch = %batch_id,
            count = containers.len(),
            signal = %self.params.signal,
            grace_seconds = self.params.grace_seconds,
            "stopping all containers"
        );

        let mut stopped = Vec::with_capacity(containers.len());
        for (index, container) in containers.iter().enumerate() {
            let path = format!("{}?{}", paths::stop(&container.id), query);

            match transport.request(Method::POST, &path, Some(body.clone())).await {
                Ok(response) => {
                    debug!(
                        batch = %batch_id,
                        container = %container.id,
                        status = %response.status,
                        "stop issued"
                    );
                    stopped.push(container.id.clone());
                }
                Err(error) => {
                    warn!(
                        batch = %batch_id,
                        container = %container.id,
                        "stop-all aborted: {}",
                        error
                    );
                    return Ok(BulkOutcome {
                        batch_id,
                        stopped,
                        unprocessed: containers.len() - index - 1,
                        failure: Some(BulkFailure {
                            container_id: container.id.clone(),
                            error,
                        }),
                    });
                }
            }
        }

        Ok(BulkOutcome {
            batch_id,
            stopped,
            unprocessed: 0,
            failure: None,
        })
    }
}

impl BulkOutcome {
    pub fn into_envelope(self) -> Envelope {
        match self.failure {
            None => Envelope::message(StatusCode::OK, ALL_CONTAINERS_STOPPED),
            Some(failure) => Envelope::failure(&GatewayError::Transport(failure.error)),
        }
    }
}
