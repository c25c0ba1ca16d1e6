//! E2E smoke test: nothing a topology created outlives it.
//!
//! 1. Bring up `1idx1sh`; the body only records the project name
//! 2. After the run, no containers carry the project label
//! 3. A second sweep of the project finds nothing left to remove

use convoy_runtime::{InstanceFilter, Runtime};
use smoke::{poll_async, require_harness};

#[tokio::test]
async fn topology_leaves_nothing_behind() {
    require_harness!();
    let manager = smoke::manager();
    let prepared = smoke::prepare(&manager, "1idx1sh");
    let fixture = prepared.fixtures.path("default.yml");
    assert!(fixture.exists());

    let project = manager
        .run(prepared, |topo| async move {
            assert_eq!(topo.instances().await?.len(), 2);
            Ok(topo.project().to_owned())
        })
        .await
        .unwrap();

    let filter = &InstanceFilter::project(&project);
    let runtime = manager.runtime();
    poll_async(move || async move { runtime.list(filter).await.unwrap().is_empty() })
        .secs(30)
        .expect("project containers still listed")
        .await;
    assert_eq!(runtime.remove_instances(filter).await.unwrap(), 0);
    assert_eq!(runtime.remove_networks(filter).await.unwrap(), 0);
    assert_eq!(runtime.remove_volumes(filter).await.unwrap(), 0);
    assert!(!fixture.exists());
}
