use std::sync::Arc;
use std::time::Duration;

use convoy_config::{InstanceId, RetryBudget};
use convoy_harness::{Absence, ExtractError, HarnessError, InventoryCheck, StateExtractor};
use convoy_runtime::{ComposeProject, Runtime};
use serde_json::json;

use super::harness::{Call, MockApi, ServiceScript, TestRuntime, client};

const INVENTORY: &str = "/opt/container_artifact/ansible_inventory.json";

async fn extractor(runtime: TestRuntime) -> (Arc<TestRuntime>, StateExtractor, InstanceId) {
    let runtime = Arc::new(runtime.with_service(ServiceScript::new("idx1")));
    runtime.compose_up(&ComposeProject::new("p1", "/t/p1.yaml")).await.unwrap();
    let budget = RetryBudget::new(4, Duration::from_millis(5));
    let extractor = StateExtractor::new(runtime.clone(), budget);
    (runtime, extractor, InstanceId("p1-idx1-id".into()))
}

fn cat_calls(runtime: &TestRuntime) -> usize {
    runtime.calls().iter().filter(|c| matches!(c, Call::Exec { .. })).count()
}

#[tokio::test]
async fn file_is_read_once_it_appears() {
    let inventory = r#"{"all": {"vars": {"splunk": {"role": "splunk_indexer"}}}}"#;
    let (runtime, extractor, id) =
        extractor(TestRuntime::new().with_file("idx1", INVENTORY, inventory, 2)).await;

    let doc = extractor.extract_file(&id, INVENTORY, Absence::Require).await.unwrap();

    assert_eq!(doc.unwrap().pointer("/all/vars/splunk/role"), Some(&json!("splunk_indexer")));
    assert_eq!(cat_calls(&runtime), 3);
}

#[tokio::test]
async fn tolerated_absence_is_none() {
    let (runtime, extractor, id) = extractor(TestRuntime::new()).await;

    let doc = extractor.extract_file(&id, INVENTORY, Absence::Tolerate).await.unwrap();

    assert!(doc.is_none());
    assert_eq!(cat_calls(&runtime), 4);
}

#[tokio::test]
async fn required_absence_reports_last_cause() {
    let (_runtime, extractor, id) = extractor(TestRuntime::new()).await;

    let err = extractor.extract_file(&id, INVENTORY, Absence::Require).await.unwrap_err();

    match err {
        ExtractError::Missing { attempts, last, .. } => {
            assert_eq!(attempts, 4);
            assert!(last.contains("No such file or directory"), "{last}");
        }
        other => panic!("expected Missing, got {other:?}"),
    }
}

#[tokio::test]
async fn runs_as_requested_user() {
    let (runtime, extractor, id) =
        extractor(TestRuntime::new().with_file("idx1", INVENTORY, "{}", 0)).await;

    extractor.with_user("splunk").extract_file(&id, INVENTORY, Absence::Require).await.unwrap();

    let exec = runtime.calls().into_iter().find(|c| matches!(c, Call::Exec { .. })).unwrap();
    let Call::Exec { command, user, .. } = exec else { unreachable!() };
    assert_eq!(command, format!("cat '{INVENTORY}'"));
    assert_eq!(user.as_deref(), Some("splunk"));
}

#[tokio::test]
async fn http_document_retried_through_not_found() {
    let api = MockApi::start().await;
    api.on("GET", "/services/shcluster/status", 404, "")
        .on("GET", "/services/shcluster/status", 200, "")
        .on("GET", "/services/shcluster/status", 200, r#"{"entry":[{"content":{"captain":{}}}]}"#);
    let (_runtime, extractor, _) = extractor(TestRuntime::new()).await;

    let url = format!("{}/services/shcluster/status", api.url());
    let doc = extractor.extract_http(&client(), &url, Absence::Require).await.unwrap().unwrap();

    assert!(doc.pointer("/entry/0/content/captain").is_some());
    assert_eq!(api.hits("GET", "/services/shcluster/status"), 3);
}

#[tokio::test]
async fn inventory_check_compares_values() {
    let splunk = json!({"role": "splunk_search_head", "idxc": {"replication_factor": 3}});
    let inventory = json!({"all": {"vars": {"splunk": splunk}}});
    let (_runtime, extractor, id) =
        extractor(TestRuntime::new().with_file("idx1", INVENTORY, &inventory.to_string(), 1)).await;

    let ok = InventoryCheck::default()
        .expect("/all/vars/splunk/role", "splunk_search_head")
        .run(&extractor, &id)
        .await
        .unwrap();
    assert_eq!(ok.payload, inventory);

    let err = InventoryCheck::default()
        .expect("/all/vars/splunk/idxc/replication_factor", 2)
        .run(&extractor, &id)
        .await
        .unwrap_err();
    let HarnessError::Assertion(err) = err else { panic!("expected assertion error, got {err:?}") };
    assert!(err.last.detail.contains("expected 2, found 3"), "{err}");
}
