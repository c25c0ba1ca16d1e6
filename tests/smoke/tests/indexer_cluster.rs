//! E2E smoke test: indexer cluster with a manager, two peers and a search head.
//!
//! 1. Bring up `1cm2idx1sh` and wait for all four instances
//! 2. The manager reports both peers `Up` and the search heads `Connected`
//! 3. The manager's replication and search factors match the manifest
//! 4. Searches from the search head reach both peers

use smoke::{CrossNodeSearch, MembershipCheck, ReplicationCheck, require_harness};

const INTERNAL_BY_SERVER: &str = "index=_internal earliest=-1h | stats count by splunk_server";

#[tokio::test]
async fn cluster_converges() {
    require_harness!();
    let manager = smoke::manager();
    let prepared = smoke::prepare(&manager, "1cm2idx1sh");

    manager
        .run(prepared, |topo| async move {
            assert!(topo.wait_until_ready().await?, "1cm2idx1sh did not provision");
            let cm1 = topo.management_url("cm1").await?;

            MembershipCheck::peers().run(topo.client(), &cm1, &["idx1", "idx2"]).await?;
            MembershipCheck::search_heads().run(topo.client(), &cm1, &["cm1", "sh1"]).await?;
            ReplicationCheck::new(2, 2).run(topo.client(), &cm1).await?;

            let sh1 = topo.management_url("sh1").await?;
            let search =
                CrossNodeSearch::new(INTERNAL_BY_SERVER, 3).run(topo.client(), &sh1).await?;
            assert!(search.payload.distinct.contains("idx2"), "{:?}", search.payload.distinct);
            Ok(())
        })
        .await
        .unwrap();
}
