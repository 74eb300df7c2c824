use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SERVER_NAME: &str = "dockrelay";

/// Host facts captured once at startup
#[derive(Debug, Clone)]
pub struct ServerInfo {
    name: String,
    server_cpu: String,
    server_cpu_cores: usize,
    listen_addr: String,
    docker_socket: PathBuf,
    hostname: String,
    started_at: DateTime<Utc>,
}

/// Body of `GET /`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionData {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ServerCPU")]
    pub server_cpu: String,
    #[serde(rename = "ServerCPUCores")]
    pub server_cpu_cores: usize,
    #[serde(rename = "ListenAddr")]
    pub listen_addr: String,
    #[serde(rename = "Time")]
    pub time: DateTime<Utc>,
    #[serde(rename = "StartTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "DockerSocket")]
    pub docker_socket: String,
    #[serde(rename = "Hostname")]
    pub hostname: String,
}

impl ServerInfo {
    pub fn new(listen_addr: impl Into<String>, docker_socket: impl AsRef<Path>) -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            name: SERVER_NAME.to_string(),
            server_cpu: std::env::consts::ARCH.to_string(),
            server_cpu_cores: num_cpus::get_physical(),
            listen_addr: listen_addr.into(),
            docker_socket: docker_socket.as_ref().to_path_buf(),
            hostname,
            started_at: Utc::now(),
        }
    }

    pub fn snapshot(&self) -> VersionData {
        VersionData {
            name: self.name.clone(),
            server_cpu: self.server_cpu.clone(),
            server_cpu_cores: self.server_cpu_cores,
            listen_addr: self.listen_addr.clone(),
            time: Utc::now(),
            start_time: self.started_at,
            docker_socket: self.docker_socket.display().to_string(),
            hostname: self.hostname.clone(),
        }
    }
}
