use std::collections::{BTreeMap, HashMap};

use convoy_config::{Health, Instance, InstanceId, Role};
use convoy_runtime::{
    BoxFuture, ComposeProject, ExecOutput, InstanceFilter, PROJECT_LABEL, ProcessOutput, ROLE_LABEL,
    Result, Runtime, RuntimeError, SERVICE_LABEL,
};
use parking_lot::Mutex;

pub const READY_LINE: &str = "Ansible playbook complete";
pub const FAILED_LINE: &str = "fatal: [localhost]: FAILED! => {\"changed\": false}";

/// How one compose service behaves once its project is up.
#[derive(Debug, Clone)]
pub struct ServiceScript {
    pub name: String,
    pub role: Option<Role>,
    pub ports: BTreeMap<u16, u16>,
    /// `list()` calls after bring-up before the instance shows up.
    pub appear_after: u32,
    /// `logs()` calls before the ready line is logged.
    pub ready_after: u32,
    pub failing: bool,
    pub running: bool,
    pub health: Health,
}

impl ServiceScript {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            role: None,
            ports: BTreeMap::new(),
            appear_after: 0,
            ready_after: 0,
            failing: false,
            running: true,
            health: Health::None,
        }
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn port(mut self, container: u16, host: u16) -> Self {
        self.ports.insert(container, host);
        self
    }

    pub fn appear_after(mut self, lists: u32) -> Self {
        self.appear_after = lists;
        self
    }

    pub fn ready_after(mut self, log_reads: u32) -> Self {
        self.ready_after = log_reads;
        self
    }

    /// Logs a provisioning failure instead of the ready line.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn exited(mut self) -> Self {
        self.running = false;
        self
    }

    pub fn health(mut self, health: Health) -> Self {
        self.health = health;
        self
    }
}

/// A file inside a service that becomes readable after some reads.
#[derive(Debug, Clone)]
struct ScriptedFile {
    available_after: u32,
    contents: String,
    reads: u32,
}

/// One recorded call against the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ComposeUp(ComposeProject),
    ComposeDown(String),
    List(InstanceFilter),
    PortOf(InstanceId, u16),
    Exec { id: InstanceId, command: String, user: Option<String> },
    Logs(InstanceId),
    RemoveInstances(InstanceFilter),
    RemoveNetworks(InstanceFilter),
    RemoveVolumes(InstanceFilter),
}

struct Live {
    instance: Instance,
    script: ServiceScript,
    log_reads: u32,
}

struct Project {
    lists: u32,
    networks: usize,
    volumes: usize,
}

struct TestState {
    services: Vec<ServiceScript>,
    files: HashMap<(String, String), ScriptedFile>,
    exec_replies: HashMap<String, ExecOutput>,
    volumes_per_project: usize,
    up_exit: Option<(i32, String)>,
    up_spawn_fail: bool,
    down_exit: Option<(i32, String)>,
    list_errors: u32,
    list_fatal: bool,
    network_fail: bool,
    projects: HashMap<String, Project>,
    live: Vec<Live>,
    calls: Vec<Call>,
}

/// In-memory `Runtime` for harness tests.
///
/// `compose_up` materializes one instance per scripted service, labelled the
/// way compose labels them and named `<project>-<service>-1`. Instances appear
/// and become ready after a configurable number of polls. All calls are
/// recorded for assertions; failures are injected through the builder methods.
pub struct TestRuntime {
    state: Mutex<TestState>,
}

impl TestRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TestState {
                services: Vec::new(),
                files: HashMap::new(),
                exec_replies: HashMap::new(),
                volumes_per_project: 0,
                up_exit: None,
                up_spawn_fail: false,
                down_exit: None,
                list_errors: 0,
                list_fatal: false,
                network_fail: false,
                projects: HashMap::new(),
                live: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_service(self, script: ServiceScript) -> Self {
        self.state.lock().services.push(script);
        self
    }

    /// Named volumes each project creates.
    pub fn with_volumes(self, count: usize) -> Self {
        self.state.lock().volumes_per_project = count;
        self
    }

    /// File readable with `cat` inside `service` after `available_after` failed reads.
    pub fn with_file(
        self,
        service: &str,
        path: &str,
        contents: &str,
        available_after: u32,
    ) -> Self {
        let file = ScriptedFile { available_after, contents: contents.to_owned(), reads: 0 };
        self.state.lock().files.insert((service.to_owned(), path.to_owned()), file);
        self
    }

    /// Reply for an exact non-`cat` exec command.
    pub fn with_exec_reply(self, command: &str, exit_code: i32, output: &str) -> Self {
        let reply = ExecOutput { exit_code, output: output.to_owned() };
        self.state.lock().exec_replies.insert(command.to_owned(), reply);
        self
    }

    /// Make `compose_up` exit non-zero without creating anything.
    pub fn with_up_failure(self, exit_code: i32, stderr: &str) -> Self {
        self.state.lock().up_exit = Some((exit_code, stderr.to_owned()));
        self
    }

    /// Make `compose_up` fail as if the compose binary were missing.
    pub fn with_up_spawn_failure(self) -> Self {
        self.state.lock().up_spawn_fail = true;
        self
    }

    /// Make `compose_down` exit non-zero and leave everything in place.
    pub fn with_down_failure(self, exit_code: i32, stderr: &str) -> Self {
        self.state.lock().down_exit = Some((exit_code, stderr.to_owned()));
        self
    }

    /// Fail the next `count` `list()` calls with a transient error.
    pub fn with_list_errors(self, count: u32) -> Self {
        self.state.lock().list_errors = count;
        self
    }

    /// Fail every `list()` call with a fatal error.
    pub fn with_list_fatal(self) -> Self {
        self.state.lock().list_fatal = true;
        self
    }

    pub fn with_network_failure(self) -> Self {
        self.state.lock().network_fail = true;
        self
    }

    /// Leftover instance from an earlier run, outside any project.
    pub fn add_stale(&self, name: &str) {
        let instance = Instance::new(format!("{name}-stale"), name);
        let script = ServiceScript::new(name);
        self.state.lock().live.push(Live { instance, script, log_reads: 0 });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn compose_ups(&self) -> Vec<ComposeProject> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ComposeUp(project) => Some(project),
                _ => None,
            })
            .collect()
    }

    pub fn compose_downs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ComposeDown(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::List(_))).count()
    }

    /// Names of instances still present, stale ones included.
    pub fn live_names(&self) -> Vec<String> {
        self.state.lock().live.iter().map(|l| l.instance.name.clone()).collect()
    }

    /// Projects whose networks or volumes have not been removed.
    pub fn leftover_projects(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<String> = state
            .projects
            .iter()
            .filter(|(_, p)| p.networks > 0 || p.volumes > 0)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

fn ready<T: Send + 'static>(value: T) -> BoxFuture<'static, T> {
    Box::pin(std::future::ready(value))
}

fn materialize(project: &str, script: &ServiceScript) -> Instance {
    let id = format!("{project}-{}-id", script.name);
    let name = format!("{project}-{}-1", script.name);
    let mut labels = BTreeMap::from([
        (PROJECT_LABEL.to_owned(), project.to_owned()),
        (SERVICE_LABEL.to_owned(), script.name.clone()),
    ]);
    if let Some(role) = script.role {
        labels.insert(ROLE_LABEL.to_owned(), role.to_string());
    }
    Instance {
        project: Some(project.to_owned()),
        service: Some(script.name.clone()),
        role: script.role,
        image: "convoy/test:latest".to_owned(),
        ports: script.ports.clone(),
        labels,
        running: script.running,
        health: script.health,
        ..Instance::new(id, name)
    }
}

/// `cat '<path>'` → `<path>`.
fn cat_path(command: &str) -> Option<String> {
    let quoted = command.strip_prefix("cat ")?.trim();
    let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace(r"'\''", "'"))
}

impl Runtime for TestRuntime {
    fn compose_up(&self, project: &ComposeProject) -> BoxFuture<'_, Result<ProcessOutput>> {
        let mut state = self.state.lock();
        state.calls.push(Call::ComposeUp(project.clone()));
        if state.up_spawn_fail {
            return ready(Err(RuntimeError::Spawn {
                program: "docker".to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }));
        }
        if let Some((exit_code, stderr)) = state.up_exit.clone() {
            return ready(Ok(ProcessOutput { stdout: String::new(), stderr, exit_code }));
        }
        let volumes = state.volumes_per_project;
        state.projects.insert(project.name.clone(), Project { lists: 0, networks: 1, volumes });
        let created: Vec<Live> = state
            .services
            .iter()
            .map(|script| Live {
                instance: materialize(&project.name, script),
                script: script.clone(),
                log_reads: 0,
            })
            .collect();
        state.live.extend(created);
        ready(Ok(ProcessOutput {
            stdout: String::new(),
            stderr: format!("Container {}-* Started\n", project.name),
            exit_code: 0,
        }))
    }

    fn compose_down(&self, project: &ComposeProject) -> BoxFuture<'_, Result<ProcessOutput>> {
        let mut state = self.state.lock();
        state.calls.push(Call::ComposeDown(project.name.clone()));
        if let Some((exit_code, stderr)) = state.down_exit.clone() {
            return ready(Ok(ProcessOutput { stdout: String::new(), stderr, exit_code }));
        }
        state.live.retain(|l| l.instance.project.as_deref() != Some(project.name.as_str()));
        if let Some(p) = state.projects.get_mut(&project.name) {
            p.networks = 0;
            p.volumes = 0;
        }
        ready(Ok(ProcessOutput::default()))
    }

    fn list(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<Vec<Instance>>> {
        let mut state = self.state.lock();
        state.calls.push(Call::List(filter.clone()));
        if state.list_fatal {
            return ready(Err(RuntimeError::Spawn {
                program: "docker".to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }));
        }
        if state.list_errors > 0 {
            state.list_errors -= 1;
            return ready(Err(RuntimeError::CommandFailed {
                command: "docker ps".to_owned(),
                exit_code: 1,
                stderr: "Cannot connect to the Docker daemon".to_owned(),
            }));
        }
        for p in state.projects.values_mut() {
            p.lists += 1;
        }
        let TestState { live, projects, .. } = &*state;
        let found = live
            .iter()
            .filter(|l| {
                let project = l.instance.project.as_ref().and_then(|p| projects.get(p));
                project.is_none_or(|p| p.lists > l.script.appear_after)
            })
            .map(|l| l.instance.clone())
            .filter(|inst| filter.matches(inst))
            .collect();
        ready(Ok(found))
    }

    fn port_of(&self, id: &InstanceId, port: u16) -> BoxFuture<'_, Result<u16>> {
        let mut state = self.state.lock();
        state.calls.push(Call::PortOf(id.clone(), port));
        let found = state.live.iter().find(|l| &l.instance.id == id);
        let result = match found {
            None => Err(RuntimeError::InstanceNotFound(id.0.clone())),
            Some(l) => l
                .instance
                .host_port(port)
                .ok_or_else(|| RuntimeError::PortNotFound { instance: id.0.clone(), port }),
        };
        ready(result)
    }

    fn exec(
        &self,
        id: &InstanceId,
        command: &str,
        user: Option<&str>,
    ) -> BoxFuture<'_, Result<ExecOutput>> {
        let mut state = self.state.lock();
        state.calls.push(Call::Exec {
            id: id.clone(),
            command: command.to_owned(),
            user: user.map(str::to_owned),
        });
        let found = state.live.iter().find(|l| &l.instance.id == id);
        let Some(service) = found.map(|l| l.script.name.clone()) else {
            return ready(Err(RuntimeError::InstanceNotFound(id.0.clone())));
        };

        if let Some(path) = cat_path(command) {
            let missing = ExecOutput {
                exit_code: 1,
                output: format!("cat: {path}: No such file or directory\n"),
            };
            let reply = match state.files.get_mut(&(service, path)) {
                None => missing,
                Some(file) if file.reads < file.available_after => {
                    file.reads += 1;
                    missing
                }
                Some(file) => {
                    file.reads += 1;
                    ExecOutput { exit_code: 0, output: file.contents.clone() }
                }
            };
            return ready(Ok(reply));
        }
        let reply = state.exec_replies.get(command).cloned().unwrap_or_default();
        ready(Ok(reply))
    }

    fn logs(&self, id: &InstanceId, _tail: usize) -> BoxFuture<'_, Result<String>> {
        let mut state = self.state.lock();
        state.calls.push(Call::Logs(id.clone()));
        let Some(live) = state.live.iter_mut().find(|l| &l.instance.id == id) else {
            return ready(Err(RuntimeError::InstanceNotFound(id.0.clone())));
        };
        live.log_reads += 1;
        let mut logs = String::from("PLAY [Run Splunk provisioning]\nTASK [Provision role]\n");
        if live.script.failing {
            logs.push_str(FAILED_LINE);
            logs.push('\n');
        } else if live.log_reads > live.script.ready_after {
            logs.push_str(READY_LINE);
            logs.push('\n');
        }
        ready(Ok(logs))
    }

    fn remove_instances(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<usize>> {
        let mut state = self.state.lock();
        state.calls.push(Call::RemoveInstances(filter.clone()));
        if filter.is_empty() {
            return ready(Ok(0));
        }
        let before = state.live.len();
        state.live.retain(|l| !filter.matches(&l.instance));
        ready(Ok(before - state.live.len()))
    }

    fn remove_networks(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<usize>> {
        let mut state = self.state.lock();
        state.calls.push(Call::RemoveNetworks(filter.clone()));
        if state.network_fail {
            return ready(Err(RuntimeError::CommandFailed {
                command: "docker network rm".to_owned(),
                exit_code: 1,
                stderr: "network has active endpoints".to_owned(),
            }));
        }
        let removed = filter
            .project
            .as_ref()
            .and_then(|name| state.projects.get_mut(name))
            .map(|p| std::mem::take(&mut p.networks))
            .unwrap_or(0);
        ready(Ok(removed))
    }

    fn remove_volumes(&self, filter: &InstanceFilter) -> BoxFuture<'_, Result<usize>> {
        let mut state = self.state.lock();
        state.calls.push(Call::RemoveVolumes(filter.clone()));
        let removed = filter
            .project
            .as_ref()
            .and_then(|name| state.projects.get_mut(name))
            .map(|p| std::mem::take(&mut p.volumes))
            .unwrap_or(0);
        ready(Ok(removed))
    }
}
