use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::instance::Role;

/// One declared instance of a topology.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDef {
    pub name: String,
    pub role: Role,
    pub ports: Vec<u16>,
    pub depends_on: Vec<String>,
}

impl InstanceDef {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self { name: name.into(), role, ports: Vec::new(), depends_on: Vec::new() }
    }

    pub fn with_ports(mut self, ports: &[u16]) -> Self {
        self.ports = ports.to_vec();
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }
}

/// A fully-validated topology: the compose file to bring up and the
/// instances it is expected to produce.
///
/// Immutable once loaded; a `Topology` in the harness pairs it with a
/// generated project name.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyDef {
    pub name: String,
    pub compose_file: PathBuf,
    /// Falls back to the harness-wide readiness timeout when unset.
    pub readiness_timeout: Option<Duration>,
    /// Extra environment for the bring-up command.
    pub env: BTreeMap<String, String>,
    pub instances: BTreeMap<String, InstanceDef>,
}

impl TopologyDef {
    pub fn new(name: impl Into<String>, compose_file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            compose_file: compose_file.into(),
            readiness_timeout: None,
            env: BTreeMap::new(),
            instances: BTreeMap::new(),
        }
    }

    pub fn with_instance(mut self, def: InstanceDef) -> Self {
        self.instances.insert(def.name.clone(), def);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = Some(timeout);
        self
    }

    /// Number of instances the readiness poller must observe.
    pub fn expected_count(&self) -> usize {
        self.instances.len()
    }

    /// Names of declared instances with the given role, in name order.
    pub fn names_with_role(&self, role: Role) -> Vec<&str> {
        self.instances.values().filter(|i| i.role == role).map(|i| i.name.as_str()).collect()
    }
}
