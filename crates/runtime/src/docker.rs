use convoy_config::{HarnessConfig, Instance, InstanceId};

use crate::error::{Result, RuntimeError};
use crate::parse::{is_absent, parse_port_output, parse_ps_output};
use crate::{CommandSpec, ComposeProject, ExecOutput, InstanceFilter, ProcessOutput, ProcessRunner};

/// Facade over the docker CLI.
///
/// Every call shells out through the `ProcessRunner`, so child output lands in
/// the test log as it is produced.
#[derive(Debug, Clone)]
pub struct Docker {
    runner: ProcessRunner,
    bin: String,
    compose: Vec<String>,
}

impl Default for Docker {
    fn default() -> Self {
        Self::new("docker", vec!["docker".to_owned(), "compose".to_owned()])
    }
}

impl Docker {
    /// `compose` is the program plus leading arguments, e.g. `["docker", "compose"]`.
    pub fn new(bin: impl Into<String>, compose: Vec<String>) -> Self {
        Self { runner: ProcessRunner::new(), bin: bin.into(), compose }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.docker_bin.clone(), config.compose_command.clone())
    }

    fn docker(&self) -> CommandSpec {
        CommandSpec::new(&self.bin)
    }

    fn compose(&self, project: &ComposeProject, args: Vec<String>) -> CommandSpec {
        let (program, leading) = match self.compose.split_first() {
            Some((program, leading)) => (program.clone(), leading.to_vec()),
            None => (self.bin.clone(), vec!["compose".to_owned()]),
        };
        let mut spec = CommandSpec::new(program).args(leading).args(args);
        spec.env = project.env.clone();
        if !project.working_dir.as_os_str().is_empty() {
            spec = spec.current_dir(&project.working_dir);
        }
        spec
    }

    async fn run_ok(&self, spec: CommandSpec) -> Result<ProcessOutput> {
        self.runner.run(&spec).await?.into_result(&spec)
    }

    /// Run a removal command, treating "no such object" failures as success.
    /// Docker echoes each object it removed on stdout; a real failure keeps
    /// that list so a partial removal is visible.
    async fn run_removal(&self, spec: CommandSpec) -> Result<()> {
        let out = self.runner.run(&spec).await?;
        if out.success() || is_absent(&out.stderr) {
            return Ok(());
        }
        let removed = listed(&out.stdout);
        if removed.is_empty() {
            return out.into_result(&spec).map(drop);
        }
        tracing::warn!(command = %spec, ?removed, "removal partly failed");
        let command = spec.to_string();
        Err(RuntimeError::PartialRemoval { command, removed, stderr: out.stderr })
    }

    pub async fn compose_up(&self, project: &ComposeProject) -> Result<ProcessOutput> {
        tracing::info!(project = %project.name, "compose up");
        self.runner.run(&self.compose(project, project.up_args())).await
    }

    pub async fn compose_down(&self, project: &ComposeProject) -> Result<ProcessOutput> {
        tracing::info!(project = %project.name, "compose down");
        self.runner.run(&self.compose(project, project.down_args())).await
    }

    pub async fn list(&self, filter: &InstanceFilter) -> Result<Vec<Instance>> {
        let spec = self
            .docker()
            .args(["ps", "-a", "--no-trunc", "--format", "{{json .}}"])
            .args(filter.ps_args());
        let out = self.run_ok(spec).await?;
        let mut instances = parse_ps_output(&out.stdout)?;
        // `name=` filters are regexes over every alias; re-check exactly.
        instances.retain(|inst| filter.matches(inst));
        Ok(instances)
    }

    pub async fn port_of(&self, id: &InstanceId, port: u16) -> Result<u16> {
        let spec = self.docker().arg("port").arg(&id.0).arg(format!("{port}/tcp"));
        let out = self.runner.run(&spec).await?;
        let not_found = || RuntimeError::PortNotFound { instance: id.to_string(), port };
        if !out.success() {
            if out.stderr.contains("No such container") {
                return Err(RuntimeError::InstanceNotFound(id.to_string()));
            }
            return Err(not_found());
        }
        parse_port_output(&out.stdout).ok_or_else(not_found)
    }

    pub async fn exec(
        &self,
        id: &InstanceId,
        command: &str,
        user: Option<&str>,
    ) -> Result<ExecOutput> {
        let mut spec = self.docker().arg("exec");
        if let Some(user) = user {
            spec = spec.args(["-u", user]);
        }
        let spec = spec.arg(&id.0).args(["sh", "-c", command]);
        let out = self.runner.run(&spec).await?;
        Ok(ExecOutput { exit_code: out.exit_code, output: out.combined() })
    }

    pub async fn logs(&self, id: &InstanceId, tail: usize) -> Result<String> {
        let spec = self.docker().args(["logs", "--tail"]).arg(tail.to_string()).arg(&id.0);
        let out = self.runner.run(&spec).await?;
        if !out.success() && out.stderr.contains("No such container") {
            return Err(RuntimeError::InstanceNotFound(id.to_string()));
        }
        // Containers write to both streams; docker replays each on its own.
        Ok(out.into_result(&spec)?.combined())
    }

    pub async fn remove_instances(&self, filter: &InstanceFilter) -> Result<usize> {
        if filter.is_empty() {
            tracing::warn!("refusing to remove instances with an empty filter");
            return Ok(0);
        }
        let ids: Vec<String> =
            self.list(filter).await?.into_iter().map(|inst| inst.id.0).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.run_removal(self.docker().args(["rm", "-f", "-v"]).args(ids.iter().cloned())).await?;
        tracing::info!(count = ids.len(), "removed instances");
        Ok(ids.len())
    }

    pub async fn remove_networks(&self, filter: &InstanceFilter) -> Result<usize> {
        let ids = self.object_ids("network", filter).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.run_removal(self.docker().args(["network", "rm"]).args(ids.iter().cloned())).await?;
        tracing::info!(count = ids.len(), "removed networks");
        Ok(ids.len())
    }

    pub async fn remove_volumes(&self, filter: &InstanceFilter) -> Result<usize> {
        let ids = self.object_ids("volume", filter).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.run_removal(self.docker().args(["volume", "rm", "-f"]).args(ids.iter().cloned()))
            .await?;
        tracing::info!(count = ids.len(), "removed volumes");
        Ok(ids.len())
    }

    /// IDs from `docker <kind> ls -q`, narrowed by the filter's labels.
    async fn object_ids(&self, kind: &str, filter: &InstanceFilter) -> Result<Vec<String>> {
        if !filter.has_label_criteria() {
            tracing::warn!(kind, "refusing to list removal targets without a label filter");
            return Ok(Vec::new());
        }
        let spec = self.docker().args([kind, "ls", "-q"]).args(filter.label_args());
        let out = self.run_ok(spec).await?;
        Ok(listed(&out.stdout))
    }
}

/// Non-empty trimmed lines, one object id or name per line.
fn listed(stdout: &str) -> Vec<String> {
    stdout.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_owned).collect()
}
