//! Bring-up, scenario execution and guaranteed teardown of a topology.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use convoy_config::{HarnessConfig, Instance, TopologyDef};
use convoy_runtime::{ComposeProject, Docker, ExecOutput, InstanceFilter, Runtime};
use tokio::task::AbortHandle;

use crate::client::RetryingClient;
use crate::error::{HarnessError, Result};
use crate::extract::StateExtractor;
use crate::fixtures::Fixtures;
use crate::project::ProjectId;
use crate::readiness::ReadinessPoller;

/// Management API port inside every instance.
pub const MANAGEMENT_PORT: u16 = 8089;

/// A topology definition bound to a unique project.
#[derive(Debug, Clone)]
pub struct Topology {
    pub def: TopologyDef,
    pub project: ProjectId,
}

impl Topology {
    pub fn new(def: TopologyDef, project: ProjectId) -> Self {
        Self { def, project }
    }

    pub fn project(&self) -> &str {
        self.project.as_str()
    }

    /// Everything compose created for this project.
    pub fn filter(&self) -> InstanceFilter {
        InstanceFilter::project(self.project())
    }

    /// Container names the declared instances can end up with:
    /// `<project>-<name>` for fixed names and compose's `<project>-<name>-1`.
    pub fn container_names(&self) -> Vec<String> {
        self.def
            .instances
            .keys()
            .flat_map(|name| {
                [format!("{}-{name}", self.project()), format!("{}-{name}-1", self.project())]
            })
            .collect()
    }
}

/// Counts of what a teardown removed, plus anything that went wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub project: String,
    pub instances: usize,
    pub networks: usize,
    pub volumes: usize,
    pub fixtures: usize,
    pub errors: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A topology whose fixtures can still be written before bring-up.
#[derive(Debug)]
pub struct PreparedTopology {
    pub topology: Topology,
    pub fixtures: Fixtures,
}

impl PreparedTopology {
    pub fn project(&self) -> &str {
        self.topology.project()
    }
}

/// Handle passed to a scenario body while its topology is up.
#[derive(Clone)]
pub struct RunningTopology {
    topology: Topology,
    runtime: Arc<dyn Runtime>,
    config: HarnessConfig,
    client: RetryingClient,
}

impl RunningTopology {
    fn new(topology: Topology, runtime: Arc<dyn Runtime>, config: HarnessConfig) -> Result<Self> {
        let client = RetryingClient::new(config.http.clone())?;
        Ok(Self { topology, runtime, config, client })
    }

    pub fn project(&self) -> &str {
        self.topology.project()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn def(&self) -> &TopologyDef {
        &self.topology.def
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    pub fn client(&self) -> &RetryingClient {
        &self.client
    }

    pub fn filter(&self) -> InstanceFilter {
        self.topology.filter()
    }

    pub fn poller(&self) -> ReadinessPoller {
        ReadinessPoller::new(Arc::clone(&self.runtime), &self.config.readiness)
    }

    pub fn extractor(&self) -> StateExtractor {
        StateExtractor::new(Arc::clone(&self.runtime), self.config.extract)
    }

    /// Wait for every declared instance within the topology's readiness
    /// timeout, or the harness default when the topology sets none.
    pub async fn wait_until_ready(&self) -> Result<bool> {
        let def = self.def();
        let timeout = def.readiness_timeout.unwrap_or(self.config.readiness.timeout);
        let ready =
            self.poller().wait_for_instances(def.expected_count(), &self.filter(), timeout).await?;
        Ok(ready)
    }

    pub async fn instances(&self) -> Result<Vec<Instance>> {
        Ok(self.runtime.list(&self.filter()).await?)
    }

    /// The instance for a declared name, matched on compose service or container name.
    pub async fn instance(&self, name: &str) -> Result<Instance> {
        let fixed = format!("{}-{name}", self.project());
        self.instances()
            .await?
            .into_iter()
            .find(|inst| inst.logical_name() == name || inst.name == fixed)
            .ok_or_else(|| HarnessError::UnknownInstance {
                project: self.project().to_owned(),
                name: name.to_owned(),
            })
    }

    pub async fn host_port(&self, name: &str, container_port: u16) -> Result<u16> {
        let inst = self.instance(name).await?;
        match inst.host_port(container_port) {
            Some(port) => Ok(port),
            None => Ok(self.runtime.port_of(&inst.id, container_port).await?),
        }
    }

    pub async fn url(&self, name: &str, scheme: &str, container_port: u16) -> Result<String> {
        let port = self.host_port(name, container_port).await?;
        Ok(format!("{scheme}://127.0.0.1:{port}"))
    }

    /// `https://127.0.0.1:<host port of 8089>` for the named instance.
    pub async fn management_url(&self, name: &str) -> Result<String> {
        self.url(name, "https", MANAGEMENT_PORT).await
    }

    pub async fn exec(&self, name: &str, command: &str) -> Result<ExecOutput> {
        let inst = self.instance(name).await?;
        Ok(self.runtime.exec(&inst.id, command, None).await?)
    }
}

/// How the scenario body ended.
enum BodyOutcome<T> {
    Finished(Result<T>),
    Panicked(Box<dyn Any + Send + 'static>),
}

/// Owns the runtime and harness config; runs scenarios against fresh projects.
#[derive(Clone)]
pub struct TopologyManager {
    runtime: Arc<dyn Runtime>,
    config: HarnessConfig,
}

impl TopologyManager {
    pub fn new(runtime: Arc<dyn Runtime>, config: HarnessConfig) -> Self {
        Self { runtime, config }
    }

    /// Manager backed by the docker CLI named in `config`.
    pub fn docker(config: HarnessConfig) -> Self {
        let runtime = Docker::from_config(&config).into_runtime();
        Self::new(runtime, config)
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    /// Load `<topology_dir>/<name>.hcl`.
    pub fn load(&self, name: &str) -> Result<TopologyDef> {
        Ok(convoy_config::load_topology(&self.config.topology_dir, name)?)
    }

    /// Assign a unique project and an empty fixture set.
    pub fn prepare(&self, def: TopologyDef) -> PreparedTopology {
        let project = ProjectId::generate(&self.config.project_prefix);
        let fixtures = Fixtures::new(&self.config.fixtures_dir, project.as_str());
        tracing::info!(%project, topology = %def.name, "prepared topology");
        PreparedTopology { topology: Topology::new(def, project), fixtures }
    }

    /// Prepare, bring up, run `body`, tear down.
    pub async fn with_topology<T, F, Fut>(&self, def: TopologyDef, body: F) -> Result<T>
    where
        F: FnOnce(RunningTopology) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.run(self.prepare(def), body).await
    }

    /// Bring up a prepared topology and run `body` against it. Teardown runs
    /// whatever happens: failed bring-up, body error or body panic. A panic is
    /// resumed once teardown is done. If this future is dropped early the body
    /// task is aborted and teardown is spawned onto the current tokio runtime.
    pub async fn run<T, F, Fut>(&self, prepared: PreparedTopology, body: F) -> Result<T>
    where
        F: FnOnce(RunningTopology) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = RunGuard::new(self.clone(), prepared);
        let outcome = self.execute(&mut guard, body).await;
        let report = guard.finish().await;
        if !report.is_clean() {
            let errors = &report.errors;
            tracing::warn!(project = %report.project, ?errors, "teardown left debris");
        }
        match outcome {
            BodyOutcome::Finished(result) => result,
            BodyOutcome::Panicked(payload) => std::panic::resume_unwind(payload),
        }
    }

    async fn execute<T, F, Fut>(&self, guard: &mut RunGuard, body: F) -> BodyOutcome<T>
    where
        F: FnOnce(RunningTopology) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let topology = &guard.topology;
        let brought_up = match &guard.fixtures {
            Some(fixtures) => self.bring_up(topology, fixtures).await,
            None => Err(HarnessError::Cancelled),
        };
        if let Err(e) = brought_up {
            return BodyOutcome::Finished(Err(e));
        }
        let runtime = Arc::clone(&self.runtime);
        let running = match RunningTopology::new(topology.clone(), runtime, self.config.clone()) {
            Ok(running) => running,
            Err(e) => return BodyOutcome::Finished(Err(e)),
        };
        let task = tokio::spawn(body(running));
        guard.body = Some(task.abort_handle());
        let joined = task.await;
        guard.body = None;
        match joined {
            Ok(result) => BodyOutcome::Finished(result),
            Err(e) if e.is_panic() => {
                let project = &guard.topology.project;
                tracing::warn!(%project, "scenario panicked; tearing down");
                BodyOutcome::Panicked(e.into_panic())
            }
            Err(_) => BodyOutcome::Finished(Err(HarnessError::Cancelled)),
        }
    }

    fn compose_project(&self, topology: &Topology, fixtures: &Fixtures) -> ComposeProject {
        let mut project = ComposeProject::new(topology.project(), &topology.def.compose_file);
        for (key, value) in &topology.def.env {
            project = project.with_env(key, value);
        }
        project = project
            .with_env("CONVOY_PROJECT", topology.project())
            .with_env("CONVOY_FIXTURES_DIR", fixtures.dir().display().to_string());
        if let Some(platform) = &self.config.platform {
            project = project.with_env("CONVOY_PLATFORM", platform);
        }
        if let Some(image) = &self.config.image {
            project = project.with_env("CONVOY_IMAGE", image);
        }
        project
    }

    async fn bring_up(&self, topology: &Topology, fixtures: &Fixtures) -> Result<()> {
        // A crashed earlier run may have left containers holding our fixed names.
        let stale = InstanceFilter::named(topology.container_names());
        match self.runtime.remove_instances(&stale).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "removed stale instances"),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => tracing::warn!(error = %e, "stale instance sweep failed"),
        }

        let project = self.compose_project(topology, fixtures);
        let file = topology.def.compose_file.display();
        tracing::info!(project = %project.name, %file, "bringing up");
        let out = self.runtime.compose_up(&project).await?;
        if !out.success() {
            return Err(HarnessError::BringUp {
                project: project.name,
                exit_code: out.exit_code,
                stderr: out.stderr.trim().to_owned(),
            });
        }
        Ok(())
    }

    /// Remove everything the project created. Never fails; problems are
    /// logged and collected in the report. Safe to call repeatedly.
    pub async fn teardown(&self, topology: &Topology, fixtures: &mut Fixtures) -> TeardownReport {
        let mut report =
            TeardownReport { project: topology.project().to_owned(), ..Default::default() };
        let project = self.compose_project(topology, fixtures);

        match self.runtime.compose_down(&project).await {
            Ok(out) if !out.success() => report.errors.push(format!(
                "compose down exited with {}: {}",
                out.exit_code,
                out.stderr.trim()
            )),
            Ok(_) => {}
            Err(e) => report.errors.push(format!("compose down: {e}")),
        }

        let by_project = topology.filter();
        let by_name = InstanceFilter::named(topology.container_names());
        for filter in [&by_project, &by_name] {
            match self.runtime.remove_instances(filter).await {
                Ok(n) => report.instances += n,
                Err(e) => report.errors.push(format!("remove instances: {e}")),
            }
        }
        match self.runtime.remove_networks(&by_project).await {
            Ok(n) => report.networks = n,
            Err(e) => report.errors.push(format!("remove networks: {e}")),
        }
        match self.runtime.remove_volumes(&by_project).await {
            Ok(n) => report.volumes = n,
            Err(e) => report.errors.push(format!("remove volumes: {e}")),
        }
        report.fixtures = fixtures.cleanup(&mut report.errors);

        for error in &report.errors {
            tracing::warn!(project = %report.project, %error, "teardown error");
        }
        tracing::info!(
            project = %report.project,
            instances = report.instances,
            networks = report.networks,
            volumes = report.volumes,
            fixtures = report.fixtures,
            "torn down"
        );
        report
    }
}

/// Keeps a run's project and fixtures until teardown has finished. Dropped
/// while still holding them, it aborts the body and tears down in the
/// background.
struct RunGuard {
    manager: TopologyManager,
    topology: Topology,
    fixtures: Option<Fixtures>,
    body: Option<AbortHandle>,
}

impl RunGuard {
    fn new(manager: TopologyManager, prepared: PreparedTopology) -> Self {
        let PreparedTopology { topology, fixtures } = prepared;
        Self { manager, topology, fixtures: Some(fixtures), body: None }
    }

    async fn finish(mut self) -> TeardownReport {
        let project = self.topology.project().to_owned();
        let Some(fixtures) = self.fixtures.as_mut() else {
            return TeardownReport { project, ..Default::default() };
        };
        let report = self.manager.teardown(&self.topology, fixtures).await;
        self.fixtures = None;
        report
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(body) = self.body.take() {
            body.abort();
        }
        let Some(mut fixtures) = self.fixtures.take() else {
            return;
        };
        let project = self.topology.project().to_owned();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(%project, "run dropped outside a tokio runtime; nothing torn down");
            return;
        };
        tracing::warn!(%project, "run dropped before teardown; tearing down in the background");
        let manager = self.manager.clone();
        let topology = self.topology.clone();
        handle.spawn(async move {
            manager.teardown(&topology, &mut fixtures).await;
        });
    }
}
