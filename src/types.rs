//! Engine API schema types.
//!
//! Daemon-produced shapes are read-only projections: every field the engine
//! may omit is an `Option` and is skipped on output when absent, so a field
//! that was missing stays missing while an empty list or map is forwarded
//! as empty.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One entry of `GET /containers/json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Names", skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    #[serde(rename = "Image", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "ImageID", skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(rename = "Command", skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(rename = "Created", skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(rename = "State", skip_serializing_if = "Option::is_none")]
    pub state: Option<ContainerState>,
    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "Ports", skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<Port>>,
    #[serde(rename = "Labels", skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(rename = "NetworkSettings", skip_serializing_if = "Option::is_none")]
    pub network_settings: Option<SummaryNetworkSettings>,
}

/// Container lifecycle state as reported by the engine.
///
/// States outside the known vocabulary are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Other(String),
}

impl ContainerState {
    pub fn as_str(&self) -> &str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
            ContainerState::Other(state) => state,
        }
    }
}

impl From<String> for ContainerState {
    fn from(state: String) -> Self {
        match state.as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Other(state),
        }
    }
}

impl From<ContainerState> for String {
    fn from(state: ContainerState) -> Self {
        match state {
            ContainerState::Other(state) => state,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    #[serde(rename = "IP", skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "PrivatePort")]
    pub private_port: u16,
    #[serde(rename = "PublicPort", skip_serializing_if = "Option::is_none")]
    pub public_port: Option<u16>,
    #[serde(rename = "Type")]
    pub port_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryNetworkSettings {
    #[serde(rename = "Networks", skip_serializing_if = "Option::is_none")]
    pub networks: Option<HashMap<String, EndpointSettings>>,
}

/// Per-network attachment of a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSettings {
    #[serde(rename = "Links", skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(rename = "Aliases", skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(rename = "MacAddress", skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(rename = "NetworkID", skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(rename = "EndpointID", skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
    #[serde(rename = "Gateway", skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(rename = "IPAddress", skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(
        rename = "IPPrefixLen",
        alias = "IPPrefixlen",
        skip_serializing_if = "Option::is_none"
    )]
    pub ip_prefix_len: Option<u32>,
    #[serde(rename = "DNSNames", skip_serializing_if = "Option::is_none")]
    pub dns_names: Option<Vec<String>>,
}

/// Result of `GET /containers/{id}/json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectObject {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Path", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "Args", skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(rename = "Created", skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(rename = "Image", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "Driver", skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(rename = "AppArmorProfile", skip_serializing_if = "Option::is_none")]
    pub app_armor_profile: Option<String>,
    #[serde(rename = "Mounts", skip_serializing_if = "Option::is_none")]
    pub mounts: Option<Vec<MountPoint>>,
    #[serde(rename = "Config", skip_serializing_if = "Option::is_none")]
    pub config: Option<ContainerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(rename = "RW", skip_serializing_if = "Option::is_none")]
    pub rw: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<String>,
}

/// `Config` section of an inspect object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domainname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attach_stdin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attach_stdout: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attach_stderr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tty: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_stdin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin_once: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<HashMap<String, EmptyObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_timeout: Option<i64>,
}

/// Container health check definition; durations are nanoseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_period: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_interval: Option<i64>,
}

/// The engine's `{}` placeholder used as a set-member marker in
/// `Volumes` and `ExposedPorts`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyObject {}

/// Result of `GET /containers/{id}/top`, forwarded verbatim
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessTable {
    #[serde(rename = "Titles", skip_serializing_if = "Option::is_none")]
    pub titles: Option<Vec<String>>,
    #[serde(rename = "Processes", skip_serializing_if = "Option::is_none")]
    pub processes: Option<Vec<Vec<String>>>,
}

/// Result of `POST /containers/prune`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PruneResponse {
    #[serde(rename = "ContainersDeleted")]
    pub containers_deleted: Option<Vec<String>>,
    #[serde(rename = "SpaceReclaimed", default)]
    pub space_reclaimed: u64,
}

/// Payload of `POST /containers/create`.
///
/// The gateway forwards the caller's bytes untouched; this typed view is only
/// read to name the requested image in error messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerRequest {
    pub image: Option<String>,
    pub hostname: Option<String>,
    pub domainname: Option<String>,
    pub user: Option<String>,
    pub attach_stdin: Option<bool>,
    pub attach_stdout: Option<bool>,
    pub attach_stderr: Option<bool>,
    pub tty: Option<bool>,
    pub open_stdin: Option<bool>,
    pub stdin_once: Option<bool>,
    pub env: Option<Vec<String>>,
    pub cmd: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub labels: Option<HashMap<String, String>>,
    pub volumes: Option<HashMap<String, EmptyObject>>,
    pub working_dir: Option<String>,
    pub network_disabled: Option<bool>,
    pub mac_address: Option<String>,
    pub exposed_ports: Option<HashMap<String, EmptyObject>>,
    pub stop_signal: Option<String>,
    pub stop_timeout: Option<i64>,
    pub host_config: Option<HostConfig>,
    pub networking_config: Option<NetworkingConfig>,
}

impl CreateContainerRequest {
    /// Image named by a raw create body, if the body parses and names one
    pub fn image_of(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ImageRef>(body)
            .ok()
            .and_then(|request| request.image)
            .filter(|image| !image.is_empty())
    }
}

/// Only the `Image` of a create body; every other field is ignored
#[derive(Deserialize)]
struct ImageRef {
    #[serde(rename = "Image")]
    image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    pub binds: Option<Vec<String>>,
    pub links: Option<Vec<String>>,
    pub memory: Option<i64>,
    pub memory_swap: Option<i64>,
    pub memory_reservation: Option<i64>,
    pub nano_cpus: Option<i64>,
    pub cpu_shares: Option<i64>,
    pub cpu_period: Option<i64>,
    pub cpu_quota: Option<i64>,
    pub cpuset_cpus: Option<String>,
    pub pids_limit: Option<i64>,
    pub port_bindings: Option<HashMap<String, Vec<PortBinding>>>,
    pub publish_all_ports: Option<bool>,
    pub privileged: Option<bool>,
    pub readonly_rootfs: Option<bool>,
    pub dns: Option<Vec<String>>,
    pub cap_add: Option<Vec<String>>,
    pub cap_drop: Option<Vec<String>>,
    pub restart_policy: Option<RestartPolicy>,
    pub auto_remove: Option<bool>,
    pub network_mode: Option<String>,
    pub log_config: Option<LogConfig>,
    pub security_opt: Option<Vec<String>>,
    pub shm_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortBinding {
    #[serde(rename = "HostIp")]
    pub host_ip: Option<String>,
    #[serde(rename = "HostPort")]
    pub host_port: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartPolicy {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "MaximumRetryCount")]
    pub maximum_retry_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(rename = "Type")]
    pub log_type: String,
    #[serde(rename = "Config")]
    pub config: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkingConfig {
    #[serde(rename = "EndpointsConfig")]
    pub endpoints_config: Option<HashMap<String, EndpointConfig>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(rename = "IPAMConfig")]
    pub ipam_config: Option<EndpointIpamConfig>,
    #[serde(rename = "Links")]
    pub links: Option<Vec<String>>,
    #[serde(rename = "Aliases")]
    pub aliases: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointIpamConfig {
    #[serde(rename = "IPv4Address")]
    pub ipv4_address: Option<String>,
    #[serde(rename = "IPv6Address")]
    pub ipv6_address: Option<String>,
    #[serde(rename = "LinkLocalIPs")]
    pub link_local_ips: Option<Vec<String>>,
}

/// Result of a `201 Created` from `POST /containers/create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateContainerResponse {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Warnings")]
    pub warnings: Option<Vec<String>>,
}

/// Stop policy applied uniformly by the bulk stop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopParameters {
    #[serde(rename = "Signal")]
    pub signal: String,
    /// Grace period in seconds before the engine kills the container
    #[serde(rename = "T")]
    pub grace_seconds: u64,
}

impl StopParameters {
    /// Query-string form understood by the engine's stop endpoint
    pub fn query(&self) -> String {
        format!("signal={}&t={}", self.signal, self.grace_seconds)
    }
}

impl Default for StopParameters {
    fn default() -> Self {
        Self {
            signal: "SIGINT".to_string(),
            grace_seconds: 5,
        }
    }
}

/// Success payload carrying a human-readable message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub message: String,
}

/// Error body the engine returns alongside non-2xx statuses
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn summary_keeps_absent_fields_absent() {
        let raw = json!({
            "Id": "abc",
            "Names": ["/web"],
            "State": "running",
            "Ports": [],
            "NetworkSettings": {"Networks": {}}
        });

        let summary: ContainerSummary = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(summary.state, Some(ContainerState::Running));
        assert!(summary.image.is_none());

        assert_eq!(serde_json::to_value(&summary).unwrap(), raw);
    }

    #[test]
    fn unknown_state_survives_round_trip() {
        let summary: ContainerSummary =
            serde_json::from_value(json!({"Id": "x", "State": "hibernating"})).unwrap();
        assert_eq!(
            summary.state,
            Some(ContainerState::Other("hibernating".to_string()))
        );
        assert_eq!(
            serde_json::to_value(&summary).unwrap()["State"],
            json!("hibernating")
        );
    }

    #[test]
    fn endpoint_accepts_lowercase_prefixlen_spelling() {
        let endpoint: EndpointSettings =
            serde_json::from_value(json!({"IPAddress": "172.17.0.2", "IPPrefixlen": 16})).unwrap();
        assert_eq!(endpoint.ip_prefix_len, Some(16));
    }

    #[test]
    fn inspect_config_volumes_serialize_as_empty_objects() {
        let inspect: InspectObject = serde_json::from_value(json!({
            "Id": "abc",
            "Config": {
                "Cmd": ["nginx", "-g", "daemon off;"],
                "Volumes": {"/data": {}},
                "StopSignal": "SIGQUIT",
                "Healthcheck": {"Test": ["CMD", "true"], "Retries": 3}
            }
        }))
        .unwrap();

        let config = inspect.config.as_ref().unwrap();
        assert_eq!(config.stop_signal.as_deref(), Some("SIGQUIT"));
        assert_eq!(config.healthcheck.as_ref().and_then(|h| h.retries), Some(3));

        let out = serde_json::to_value(&inspect).unwrap();
        assert_eq!(out["Config"]["Volumes"], json!({"/data": {}}));
    }

    #[test]
    fn stop_parameters_defaults() {
        let params = StopParameters::default();
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"Signal": "SIGINT", "T": 5})
        );
        assert_eq!(params.query(), "signal=SIGINT&t=5");
    }

    #[test]
    fn image_of_reads_create_body() {
        let body = br#"{"Image": "nginx:latest", "HostConfig": {"AutoRemove": true}}"#;
        assert_eq!(
            CreateContainerRequest::image_of(body).as_deref(),
            Some("nginx:latest")
        );
        assert_eq!(CreateContainerRequest::image_of(b"not json"), None);
        assert_eq!(CreateContainerRequest::image_of(br#"{"Image": ""}"#), None);
    }

    #[test]
    fn image_of_ignores_fields_the_daemon_accepts_loosely() {
        let body = br#"{"Image": "nginx", "Cmd": "nginx -g 'daemon off;'", "HostConfig": {"RestartPolicy": {"MaximumRetryCount": 3}}}"#;
        assert_eq!(
            CreateContainerRequest::image_of(body).as_deref(),
            Some("nginx")
        );
    }
}
