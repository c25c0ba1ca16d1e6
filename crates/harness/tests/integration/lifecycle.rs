use std::sync::Arc;
use std::time::Duration;

use convoy_harness::{ErrorKind, HarnessError, PreparedTopology, RunningTopology};
use convoy_runtime::{ComposeProject, Runtime};

use super::harness::{
    Call, ServiceScript, TestRuntime, manager, poll, two_node_def, two_node_runtime,
};

fn explode() -> convoy_harness::Result<()> {
    panic!("assertion blew up")
}

#[tokio::test]
async fn scenario_runs_against_ready_topology_then_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime());
    let manager = manager(&runtime, dir.path());

    let (project, url) = manager
        .with_topology(two_node_def(), |topo| async move {
            assert!(topo.wait_until_ready().await?);
            let url = topo.management_url("sh1").await?;
            Ok((topo.project().to_owned(), url))
        })
        .await
        .unwrap();

    assert_eq!(url, "https://127.0.0.1:28089");
    assert_eq!(runtime.compose_downs(), vec![project.clone()]);
    assert!(runtime.live_names().is_empty());
    assert!(runtime.leftover_projects().is_empty());
}

#[tokio::test]
async fn bring_up_exports_project_and_topology_env() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime());
    let mut config = super::harness::config(dir.path());
    config.platform = Some("redhat-8".into());
    let manager = convoy_harness::TopologyManager::new(runtime.clone(), config);
    let def = two_node_def().with_env("SPLUNK_PASSWORD", "helloworld");

    manager.with_topology(def, |_| async { Ok(()) }).await.unwrap();

    let up = &runtime.compose_ups()[0];
    let env = |key: &str| up.env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
    assert_eq!(env("CONVOY_PROJECT").as_deref(), Some(up.name.as_str()));
    assert_eq!(env("SPLUNK_PASSWORD").as_deref(), Some("helloworld"));
    assert_eq!(env("CONVOY_PLATFORM").as_deref(), Some("redhat-8"));
    assert_eq!(env("CONVOY_FIXTURES_DIR"), Some(dir.path().display().to_string()));
    assert!(up.name.starts_with("convoy-"), "{}", up.name);
}

#[tokio::test]
async fn each_run_gets_its_own_project() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime());
    let manager = manager(&runtime, dir.path());

    let project = |t: RunningTopology| async move { Ok(t.project().to_owned()) };
    let (first, second) = tokio::join!(
        manager.with_topology(two_node_def(), project),
        manager.with_topology(two_node_def(), project),
    );

    assert_ne!(first.unwrap(), second.unwrap());
    assert_eq!(runtime.compose_ups().len(), 2);
    assert!(runtime.live_names().is_empty());
}

#[tokio::test]
async fn failed_bring_up_still_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime().with_up_failure(1, "pull access denied\n"));
    let manager = manager(&runtime, dir.path());

    let err = manager
        .with_topology(two_node_def(), |_| async { explode() })
        .await
        .unwrap_err();

    match &err {
        HarnessError::BringUp { exit_code, stderr, .. } => {
            assert_eq!(*exit_code, 1);
            assert_eq!(stderr, "pull access denied");
        }
        other => panic!("expected BringUp, got {other:?}"),
    }
    assert_eq!(runtime.compose_downs().len(), 1);
}

#[tokio::test]
async fn missing_compose_binary_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime().with_up_spawn_failure());
    let manager = manager(&runtime, dir.path());

    let err = manager.with_topology(two_node_def(), |_| async { Ok(()) }).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Fatal);
}

#[tokio::test]
async fn body_error_propagates_after_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime());
    let manager = manager(&runtime, dir.path());

    let err = manager
        .with_topology(two_node_def(), |topo| async move {
            topo.instance("hf1").await?;
            Ok(())
        })
        .await
        .unwrap_err();

    let unknown = matches!(&err, HarnessError::UnknownInstance { name, .. } if name == "hf1");
    assert!(unknown, "{err}");
    assert!(runtime.live_names().is_empty());
}

#[tokio::test]
async fn body_panic_is_resumed_after_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime());
    let manager = Arc::new(manager(&runtime, dir.path()));

    let task = tokio::spawn({
        let manager = manager.clone();
        async move {
            manager.with_topology(two_node_def(), |_| async { explode() }).await
        }
    });
    let err = task.await.unwrap_err();

    assert!(err.is_panic());
    assert_eq!(runtime.compose_downs().len(), 1);
    assert!(runtime.live_names().is_empty());
    assert!(runtime.leftover_projects().is_empty());
}

#[tokio::test]
async fn readiness_failure_is_visible_to_the_body() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(
        TestRuntime::new()
            .with_service(ServiceScript::new("idx1"))
            .with_service(ServiceScript::new("sh1").failing()),
    );
    let manager = manager(&runtime, dir.path());
    let def = two_node_def().with_readiness_timeout(Duration::from_millis(80));

    let ready =
        manager.with_topology(def, |topo| async move { topo.wait_until_ready().await }).await;

    assert!(!ready.unwrap());
    assert!(runtime.live_names().is_empty());
}

#[tokio::test]
async fn stale_instances_with_our_names_are_swept_before_bring_up() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime());
    let manager = manager(&runtime, dir.path());
    let prepared = manager.prepare(two_node_def());
    let stale = format!("{}-idx1", prepared.project());
    runtime.add_stale(&stale);
    runtime.add_stale("someone-elses-idx1");

    manager.run(prepared, |_| async { Ok(()) }).await.unwrap();

    let calls = runtime.calls();
    let sweep = calls.iter().position(|c| matches!(c, Call::RemoveInstances(_))).unwrap();
    let up = calls.iter().position(|c| matches!(c, Call::ComposeUp(_))).unwrap();
    assert!(sweep < up);
    assert_eq!(runtime.live_names(), vec!["someone-elses-idx1"]);
}

#[tokio::test]
async fn fixtures_are_removed_with_the_topology() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime());
    let manager = manager(&runtime, dir.path());
    let mut prepared = manager.prepare(two_node_def());
    let conf = prepared.fixtures.write("default.yml", "splunk:\n  password: helloworld\n").unwrap();
    let cert = prepared.fixtures.generate_certificate("sh1", &["sh1", "localhost"]).unwrap();
    assert!(std::fs::read_to_string(&cert.cert).unwrap().contains("BEGIN CERTIFICATE"));
    assert!(std::fs::read_to_string(&cert.key).unwrap().contains("PRIVATE KEY"));

    manager.run(prepared, |_| async { Ok(()) }).await.unwrap();

    assert!(!conf.exists());
    assert!(!cert.cert.exists());
    assert!(!cert.key.exists());
}

#[tokio::test]
async fn teardown_sweeps_what_compose_down_left_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(
        two_node_runtime().with_volumes(2).with_down_failure(1, "no configuration file provided"),
    );
    let manager = manager(&runtime, dir.path());
    let PreparedTopology { topology, mut fixtures } = manager.prepare(two_node_def());
    fixtures.write("license.lic", "trial").unwrap();
    runtime.compose_up(&ComposeProject::new(topology.project(), "/t/x.yaml")).await.unwrap();

    let first = manager.teardown(&topology, &mut fixtures).await;
    assert_eq!((first.instances, first.networks, first.volumes, first.fixtures), (2, 1, 2, 1));
    assert!(first.errors[0].contains("no configuration file provided"), "{:?}", first.errors);

    let second = manager.teardown(&topology, &mut fixtures).await;
    assert_eq!((second.instances, second.networks, second.volumes, second.fixtures), (0, 0, 0, 0));
    assert!(runtime.leftover_projects().is_empty());
}

#[tokio::test]
async fn teardown_continues_past_removal_errors() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime().with_network_failure());
    let manager = manager(&runtime, dir.path());
    let mut prepared = manager.prepare(two_node_def());
    let path = prepared.fixtures.write("server.conf", "[general]\n").unwrap();

    let report = manager.teardown(&prepared.topology, &mut prepared.fixtures).await;

    assert!(!report.is_clean());
    assert!(report.errors.iter().any(|e| e.starts_with("remove networks")), "{:?}", report.errors);
    assert_eq!(report.fixtures, 1);
    assert!(!path.exists());
    assert!(runtime.calls().iter().any(|c| matches!(c, Call::RemoveVolumes(_))));
}

#[tokio::test]
async fn second_teardown_is_clean_and_removes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime().with_volumes(1));
    let manager = manager(&runtime, dir.path());
    let PreparedTopology { topology, mut fixtures } = manager.prepare(two_node_def());
    runtime.compose_up(&ComposeProject::new(topology.project(), "/t/x.yaml")).await.unwrap();

    let first = manager.teardown(&topology, &mut fixtures).await;
    let second = manager.teardown(&topology, &mut fixtures).await;

    assert!(first.is_clean(), "{:?}", first.errors);
    assert!(second.is_clean(), "{:?}", second.errors);
    assert_eq!((second.instances, second.networks, second.volumes), (0, 0, 0));
    assert_eq!(runtime.compose_downs().len(), 2);
}

#[tokio::test]
async fn instances_live_only_while_the_body_runs() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime());
    let manager = Arc::new(manager(&runtime, dir.path()));
    let release = Arc::new(tokio::sync::Notify::new());

    let task = tokio::spawn({
        let (manager, release) = (manager.clone(), release.clone());
        async move {
            manager
                .with_topology(two_node_def(), |_| async move {
                    release.notified().await;
                    Ok(())
                })
                .await
        }
    });

    poll(|| runtime.live_names().len() == 2).expect("topology never came up").await;
    assert!(runtime.compose_downs().is_empty());

    release.notify_one();
    task.await.unwrap().unwrap();
    assert!(runtime.live_names().is_empty());
    assert_eq!(runtime.compose_downs().len(), 1);
}

#[tokio::test]
async fn exec_targets_the_instance_by_logical_name() {
    let dir = tempfile::tempdir().unwrap();
    let runtime =
        Arc::new(two_node_runtime().with_exec_reply("splunk version", 0, "Splunk 9.2.1\n"));
    let manager = manager(&runtime, dir.path());

    let out = manager
        .with_topology(two_node_def(), |topo| async move {
            topo.exec("idx1", "splunk version").await
        })
        .await
        .unwrap();

    assert_eq!((out.exit_code, out.output.as_str()), (0, "Splunk 9.2.1\n"));
    let exec = runtime.calls().into_iter().find_map(|c| match c {
        Call::Exec { id, command, user } => Some((id.0, command, user)),
        _ => None,
    });
    let (id, command, user) = exec.unwrap();
    assert!(id.ends_with("-idx1-id"), "{id}");
    assert_eq!((command.as_str(), user), ("splunk version", None));
}

#[tokio::test]
async fn dropping_the_run_aborts_the_body_and_still_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(two_node_runtime());
    let manager = manager(&runtime, dir.path());
    let mut prepared = manager.prepare(two_node_def());
    let conf = prepared.fixtures.write("default.yml", "splunk: {}\n").unwrap();
    let (held, released) = tokio::sync::oneshot::channel::<()>();

    let run = manager.run(prepared, move |topo| async move {
        let _held = held;
        topo.wait_until_ready().await?;
        std::future::pending::<()>().await;
        Ok(())
    });
    let timed_out = tokio::time::timeout(Duration::from_millis(100), run).await;
    assert!(timed_out.is_err());

    assert!(released.await.is_err(), "body task still running");
    poll(|| runtime.compose_downs().len() == 1 && runtime.live_names().is_empty())
        .expect("dropped run was never torn down")
        .await;
    poll(|| runtime.leftover_projects().is_empty() && !conf.exists())
        .expect("networks, volumes or fixtures left behind")
        .await;
}
