use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque runtime identifier of a running instance (a container ID).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form, the way `docker ps` prints it.
        let short = self.0.get(..12).unwrap_or(&self.0);
        f.write_str(short)
    }
}

/// Role an instance plays in the clustered service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Standalone,
    Indexer,
    SearchHead,
    ClusterManager,
    Deployer,
    DeploymentServer,
    LicenseManager,
    HeavyForwarder,
    UniversalForwarder,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::Standalone,
        Role::Indexer,
        Role::SearchHead,
        Role::ClusterManager,
        Role::Deployer,
        Role::DeploymentServer,
        Role::LicenseManager,
        Role::HeavyForwarder,
        Role::UniversalForwarder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standalone => "standalone",
            Role::Indexer => "indexer",
            Role::SearchHead => "search_head",
            Role::ClusterManager => "cluster_manager",
            Role::Deployer => "deployer",
            Role::DeploymentServer => "deployment_server",
            Role::LicenseManager => "license_manager",
            Role::HeavyForwarder => "heavy_forwarder",
            Role::UniversalForwarder => "universal_forwarder",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| format!("unknown role '{s}'"))
    }
}

/// Health reported by the container runtime's own healthcheck, if the image defines one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Health {
    /// The image has no healthcheck.
    #[default]
    None,
    Starting,
    Healthy,
    Unhealthy,
}

/// Readiness of an instance as observed by the harness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum InstanceState {
    #[default]
    Unknown,
    Starting,
    Ready,
    Failed,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceState::Unknown => "unknown",
            InstanceState::Starting => "starting",
            InstanceState::Ready => "ready",
            InstanceState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time snapshot of one running unit within a topology.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub id: InstanceId,
    /// Container name without the leading slash.
    pub name: String,
    /// Compose project the instance belongs to, if any.
    pub project: Option<String>,
    /// Compose service name, if any.
    pub service: Option<String>,
    pub role: Option<Role>,
    pub image: String,
    /// Container port → host port.
    pub ports: BTreeMap<u16, u16>,
    pub labels: BTreeMap<String, String>,
    pub running: bool,
    pub health: Health,
    pub state: InstanceState,
}

impl Instance {
    /// Minimal running instance; callers fill in the rest with struct update syntax.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: InstanceId(id.into()),
            name: name.into(),
            project: None,
            service: None,
            role: None,
            image: String::new(),
            ports: BTreeMap::new(),
            labels: BTreeMap::new(),
            running: true,
            health: Health::None,
            state: InstanceState::Unknown,
        }
    }

    /// Host port mapped to `container_port`, if published.
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.ports.get(&container_port).copied()
    }

    /// Name used to match the instance against a topology declaration:
    /// the compose service when known, the container name otherwise.
    pub fn logical_name(&self) -> &str {
        self.service.as_deref().unwrap_or(&self.name)
    }
}
