use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use convoy_config::{Instance, InstanceId};

use crate::{ComposeProject, Docker, InstanceFilter, ProcessOutput, Result};

/// Boxed future for async trait methods that need `dyn` dispatch.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of running a command inside an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    /// Stdout followed by stderr.
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Container runtime interface used by the harness (lifecycle, readiness, extraction).
///
/// Production code uses `Docker` (the docker CLI).
/// Tests substitute `TestRuntime` from `convoy-support`.
pub trait Runtime: Send + Sync {
    /// Bring the project up detached. A non-zero exit is returned as data.
    fn compose_up(&self, project: &ComposeProject) -> BoxFuture<'_, Result<ProcessOutput>>;
    fn compose_down(&self, project: &ComposeProject) -> BoxFuture<'_, Result<ProcessOutput>>;
    /// Instances matching the filter, running or not.
    fn list(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<Vec<Instance>>>;
    /// Host port published for a container TCP port.
    fn port_of(&self, id: &InstanceId, port: u16) -> BoxFuture<'_, Result<u16>>;
    /// Run `sh -c <command>` inside the instance, optionally as `user`.
    fn exec(
        &self,
        id: &InstanceId,
        command: &str,
        user: Option<&str>,
    ) -> BoxFuture<'_, Result<ExecOutput>>;
    /// Last `tail` lines of the instance's output.
    fn logs(&self, id: &InstanceId, tail: usize) -> BoxFuture<'_, Result<String>>;
    /// Force-remove matching instances with their anonymous volumes. Absent objects are not errors.
    fn remove_instances(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<usize>>;
    fn remove_networks(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<usize>>;
    fn remove_volumes(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<usize>>;
}

impl Runtime for Docker {
    fn compose_up(&self, project: &ComposeProject) -> BoxFuture<'_, Result<ProcessOutput>> {
        let project = project.clone();
        Box::pin(async move { Docker::compose_up(self, &project).await })
    }

    fn compose_down(&self, project: &ComposeProject) -> BoxFuture<'_, Result<ProcessOutput>> {
        let project = project.clone();
        Box::pin(async move { Docker::compose_down(self, &project).await })
    }

    fn list(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<Vec<Instance>>> {
        let filter = filter.clone();
        Box::pin(async move { Docker::list(self, &filter).await })
    }

    fn port_of(&self, id: &InstanceId, port: u16) -> BoxFuture<'_, Result<u16>> {
        let id = id.clone();
        Box::pin(async move { Docker::port_of(self, &id, port).await })
    }

    fn exec(
        &self,
        id: &InstanceId,
        command: &str,
        user: Option<&str>,
    ) -> BoxFuture<'_, Result<ExecOutput>> {
        let id = id.clone();
        let command = command.to_owned();
        let user = user.map(str::to_owned);
        Box::pin(async move { Docker::exec(self, &id, &command, user.as_deref()).await })
    }

    fn logs(&self, id: &InstanceId, tail: usize) -> BoxFuture<'_, Result<String>> {
        let id = id.clone();
        Box::pin(async move { Docker::logs(self, &id, tail).await })
    }

    fn remove_instances(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<usize>> {
        let filter = filter.clone();
        Box::pin(async move { Docker::remove_instances(self, &filter).await })
    }

    fn remove_networks(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<usize>> {
        let filter = filter.clone();
        Box::pin(async move { Docker::remove_networks(self, &filter).await })
    }

    fn remove_volumes(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<usize>> {
        let filter = filter.clone();
        Box::pin(async move { Docker::remove_volumes(self, &filter).await })
    }
}

impl Docker {
    /// Wrap into an `Arc<dyn Runtime>` for the harness.
    pub fn into_runtime(self) -> Arc<dyn Runtime> {
        Arc::new(self)
    }
}
