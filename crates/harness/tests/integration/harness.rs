use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use convoy_config::{HarnessConfig, InstanceDef, Role, TopologyDef, poll};
pub use convoy_harness::{RetryingClient, TopologyManager};
pub use convoy_support::{Call, MockApi, ServiceScript, TestRuntime};

/// Millisecond timings with fixtures under `dir`.
pub fn config(dir: &Path) -> HarnessConfig {
    HarnessConfig { fixtures_dir: dir.to_path_buf(), ..HarnessConfig::fast() }
}

/// `idx1` (indexer) and `sh1` (search head), as the runtime scripts them.
pub fn two_node_def() -> TopologyDef {
    TopologyDef::new("1idx1sh", "/topologies/1idx1sh.yaml")
        .with_instance(InstanceDef::new("idx1", Role::Indexer).with_ports(&[8089]))
        .with_instance(InstanceDef::new("sh1", Role::SearchHead).with_ports(&[8089]))
        .with_readiness_timeout(Duration::from_secs(2))
}

pub fn two_node_runtime() -> TestRuntime {
    TestRuntime::new()
        .with_service(ServiceScript::new("idx1").role(Role::Indexer).port(8089, 18089))
        .with_service(ServiceScript::new("sh1").role(Role::SearchHead).port(8089, 28089))
}

pub fn manager(runtime: &Arc<TestRuntime>, dir: &Path) -> TopologyManager {
    TopologyManager::new(runtime.clone(), config(dir))
}

pub fn client() -> RetryingClient {
    RetryingClient::new(HarnessConfig::fast().http).unwrap()
}
