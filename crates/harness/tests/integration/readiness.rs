use std::sync::Arc;
use std::time::Duration;

use convoy_config::{Health, InstanceState};
use convoy_harness::{PollState, ReadinessPoller};
use convoy_runtime::{ComposeProject, InstanceFilter, Runtime, RuntimeError};

use super::harness::{HarnessConfig, Role, ServiceScript, TestRuntime};

async fn up(runtime: TestRuntime) -> (Arc<TestRuntime>, ReadinessPoller, InstanceFilter) {
    let runtime = Arc::new(runtime);
    runtime.compose_up(&ComposeProject::new("p1", "/t/p1.yaml")).await.unwrap();
    let poller = ReadinessPoller::new(runtime.clone(), &HarnessConfig::fast().readiness)
        .with_interval(Duration::from_millis(5));
    (runtime, poller, InstanceFilter::project("p1"))
}

#[tokio::test]
async fn converges_once_all_instances_appear_and_provision() {
    let (runtime, poller, filter) = up(TestRuntime::new()
        .with_service(ServiceScript::new("idx1").role(Role::Indexer).ready_after(2))
        .with_service(ServiceScript::new("sh1").role(Role::SearchHead).appear_after(3)))
    .await;

    let outcome = poller.poll(2, &filter, Duration::from_secs(2)).await.unwrap();

    assert!(outcome.converged());
    assert!(outcome.attempts >= 4, "attempts: {}", outcome.attempts);
    assert!(outcome.instances.iter().all(|i| i.state == InstanceState::Ready));
    assert_eq!(runtime.list_calls(), outcome.attempts as usize);
}

#[tokio::test]
async fn failed_instance_times_out_with_diagnostics() {
    let (_runtime, poller, filter) = up(TestRuntime::new()
        .with_service(ServiceScript::new("idx1"))
        .with_service(ServiceScript::new("sh1").failing()))
    .await;

    let outcome = poller.poll(2, &filter, Duration::from_millis(60)).await.unwrap();

    assert_eq!(outcome.state, PollState::TimedOut);
    let not_ready: Vec<&str> = outcome.not_ready().iter().map(|i| i.name.as_str()).collect();
    assert_eq!(not_ready, vec!["p1-sh1-1"]);
    let last = outcome.last_attempt.unwrap();
    assert_eq!((last.observed, last.ready), (2, 1));
}

#[tokio::test]
async fn more_instances_than_expected_is_not_ready() {
    let (_runtime, poller, filter) = up(TestRuntime::new()
        .with_service(ServiceScript::new("idx1"))
        .with_service(ServiceScript::new("idx2")))
    .await;

    assert!(!poller.wait_for_instances(1, &filter, Duration::from_millis(40)).await.unwrap());
}

#[tokio::test]
async fn transient_registry_errors_are_retried() {
    let (runtime, poller, filter) =
        up(TestRuntime::new().with_service(ServiceScript::new("idx1")).with_list_errors(2)).await;

    let outcome = poller.poll(1, &filter, Duration::from_secs(2)).await.unwrap();

    assert!(outcome.converged());
    assert_eq!(outcome.attempts, 3);
    assert_eq!(runtime.list_calls(), 3);
}

#[tokio::test]
async fn fatal_registry_error_aborts() {
    let (_runtime, poller, filter) =
        up(TestRuntime::new().with_service(ServiceScript::new("idx1")).with_list_fatal()).await;

    let err = poller.wait_for_instances(1, &filter, Duration::from_secs(2)).await.unwrap_err();

    assert!(matches!(err, RuntimeError::Spawn { .. }), "{err:?}");
}

#[tokio::test]
async fn zero_timeout_polls_exactly_once() {
    let (runtime, poller, filter) =
        up(TestRuntime::new().with_service(ServiceScript::new("idx1").ready_after(5))).await;

    let outcome = poller.poll(1, &filter, Duration::ZERO).await.unwrap();

    assert_eq!(outcome.state, PollState::TimedOut);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(runtime.list_calls(), 1);
}

#[tokio::test]
async fn other_projects_are_invisible() {
    let (runtime, poller, _) =
        up(TestRuntime::new().with_service(ServiceScript::new("idx1"))).await;
    runtime.compose_up(&ComposeProject::new("p2", "/t/p2.yaml")).await.unwrap();

    let filter = InstanceFilter::project("p2");
    let outcome = poller.poll(1, &filter, Duration::from_secs(1)).await.unwrap();

    assert!(outcome.converged());
    assert_eq!(outcome.instances[0].project.as_deref(), Some("p2"));
}

#[tokio::test]
async fn exited_and_unhealthy_instances_are_failed() {
    let (_runtime, poller, filter) = up(TestRuntime::new()
        .with_service(ServiceScript::new("idx1").exited())
        .with_service(ServiceScript::new("sh1").health(Health::Unhealthy)))
    .await;

    let outcome = poller.poll(2, &filter, Duration::from_millis(40)).await.unwrap();

    assert_eq!(outcome.state, PollState::TimedOut);
    assert!(outcome.instances.iter().all(|i| i.state == InstanceState::Failed));
}
