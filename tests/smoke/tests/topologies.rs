//! Bundled manifests parse and point at compose files that exist. Runs
//! without docker.

use smoke::{Role, topology_dir};

#[test]
fn every_bundled_manifest_resolves() {
    let mut seen = 0;
    for entry in std::fs::read_dir(topology_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("hcl") {
            continue;
        }
        let name = path.file_stem().unwrap().to_str().unwrap().to_owned();
        let def = convoy_config::load_topology(&topology_dir(), &name)
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert!(def.compose_file.is_file(), "{name}: missing {}", def.compose_file.display());
        assert!(def.env.contains_key("SPLUNK_PASSWORD"), "{name}: no password");
        seen += 1;
    }
    assert!(seen >= 2, "expected bundled manifests, found {seen}");
}

#[test]
fn one_indexer_one_search_head() {
    let def = convoy_config::load_topology(&topology_dir(), "1idx1sh").unwrap();

    assert_eq!(def.expected_count(), 2);
    assert_eq!(def.names_with_role(Role::Indexer), vec!["idx1"]);
    assert_eq!(def.names_with_role(Role::SearchHead), vec!["sh1"]);
    assert_eq!(def.instances["sh1"].depends_on, vec!["idx1"]);
    assert_eq!(def.readiness_timeout, Some(std::time::Duration::from_secs(600)));
}

#[test]
fn indexer_cluster_declares_manager_and_peers() {
    let def = convoy_config::load_topology(&topology_dir(), "1cm2idx1sh").unwrap();

    assert_eq!(def.names_with_role(Role::ClusterManager), vec!["cm1"]);
    assert_eq!(def.names_with_role(Role::Indexer), vec!["idx1", "idx2"]);
    assert_eq!(def.env["SPLUNK_IDXC_REPLICATION_FACTOR"], "2");
}
