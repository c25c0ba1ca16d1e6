// Smoke tests: end-to-end scenarios against a real docker daemon.
//
// These tests bring up real compose topologies of the clustered service and
// take minutes each. They require a docker host with the service image
// available. Unwrap/panic are appropriate in test harness code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub use convoy_config::{Credentials, HarnessConfig, InstanceState, Role, poll, poll_async};
pub use convoy_harness::{
    Absence, CrossNodeSearch, InventoryCheck, MembershipCheck, PreparedTopology,
    ReplicationCheck, RunningTopology, TopologyManager,
};

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Harness gate
// ---------------------------------------------------------------------------

/// Panics if `CONVOY_HARNESS` is not set. Place at the top of every smoke
/// test so that `cargo test --all` fails clearly instead of hanging on a
/// machine without docker.
#[macro_export]
macro_rules! require_harness {
    () => {
        if std::env::var("CONVOY_HARNESS").is_err() {
            panic!(
                "smoke tests require a docker host.\n\
                 Run: CONVOY_HARNESS=1 cargo test -p smoke"
            );
        }
    };
}

/// Admin password the bundled topologies provision with.
pub const PASSWORD: &str = "helloworld";

/// Mounted as `/tmp/defaults/default.yml` by every bundled compose file.
const DEFAULTS: &str = "\
splunk:
  password: helloworld
  hec:
    enable: false
";

/// Manifests shipped with this crate.
pub fn topology_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("topologies")
}

/// `HarnessConfig::from_env()`, defaulting the topology dir to the bundled
/// manifests and the credentials to the bundled password.
pub fn config() -> HarnessConfig {
    let mut config = HarnessConfig::from_env();
    if std::env::var("CONVOY_TOPOLOGY_DIR").is_err() {
        config.topology_dir = topology_dir();
    }
    if config.http.auth.is_none() {
        config.http.auth =
            Some(Credentials { username: "admin".to_owned(), password: PASSWORD.to_owned() });
    }
    config
}

pub fn manager() -> TopologyManager {
    convoy_harness::init_test_logging();
    TopologyManager::docker(config())
}

/// Load a bundled topology and write the `default.yml` every bundled
/// compose file mounts.
pub fn prepare(manager: &TopologyManager, name: &str) -> PreparedTopology {
    let def = manager.load(name).unwrap();
    let mut prepared = manager.prepare(def);
    prepared.fixtures.write("default.yml", DEFAULTS).unwrap();
    prepared
}
