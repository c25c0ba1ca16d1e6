//! Waiting for a topology's instances to finish provisioning.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use convoy_config::{Health, Instance, InstanceState, ReadinessConfig};
use convoy_runtime::{InstanceFilter, Runtime, RuntimeError};
use tokio::time::Instant;

/// Classifies one instance from its runtime status and log tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessProbe {
    ready_markers: Vec<String>,
    failure_markers: Vec<String>,
}

impl ReadinessProbe {
    pub fn new(ready_markers: Vec<String>, failure_markers: Vec<String>) -> Self {
        Self { ready_markers, failure_markers }
    }

    pub fn from_config(config: &ReadinessConfig) -> Self {
        Self::new(config.ready_markers.clone(), config.failure_markers.clone())
    }

    /// An unhealthy runtime check or an exited container is `Failed`. In the
    /// log tail, a failure marker is `Failed` unless the provisioner ignored
    /// it (`...ignoring` on the next line) or a ready marker was logged after
    /// it. With no ready markers configured, running is ready.
    pub fn classify(&self, instance: &Instance, log_tail: &str) -> InstanceState {
        if instance.health == Health::Unhealthy || !instance.running {
            return InstanceState::Failed;
        }
        let lines: Vec<&str> = log_tail.lines().collect();
        let last_ready = last_match(&lines, &self.ready_markers);
        if let Some(failed) = self.last_failure(&lines)
            && last_ready.is_none_or(|ready| ready < failed)
        {
            return InstanceState::Failed;
        }
        let marked_ready = self.ready_markers.is_empty() || last_ready.is_some();
        if !marked_ready || instance.health == Health::Starting {
            return InstanceState::Starting;
        }
        InstanceState::Ready
    }

    /// Line index of the last failure the provisioner did not ignore.
    fn last_failure(&self, lines: &[&str]) -> Option<usize> {
        (0..lines.len())
            .rev()
            .filter(|&i| contains_any(lines[i], &self.failure_markers))
            .find(|&i| !ignored(&lines[i + 1..]))
    }
}

fn contains_any(line: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| line.contains(m.as_str()))
}

fn last_match(lines: &[&str], markers: &[String]) -> Option<usize> {
    lines.iter().rposition(|line| contains_any(line, markers))
}

/// Ansible prints `...ignoring` right after a failure with `ignore_errors`.
fn ignored(rest: &[&str]) -> bool {
    rest.iter()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.starts_with("...ignoring"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Converged,
    TimedOut,
}

/// One registry observation.
#[derive(Debug, Clone, PartialEq)]
pub struct PollAttempt {
    /// 1-based.
    pub index: u32,
    pub elapsed: Duration,
    pub observed: usize,
    pub ready: usize,
    pub state: PollState,
    /// Transient registry error that made this cycle inconclusive.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub state: PollState,
    pub attempts: u32,
    pub last_attempt: Option<PollAttempt>,
    /// Last successful snapshot, each instance carrying its classified state.
    pub instances: Vec<Instance>,
}

impl PollOutcome {
    pub fn converged(&self) -> bool {
        self.state == PollState::Converged
    }

    pub fn not_ready(&self) -> Vec<&Instance> {
        self.instances.iter().filter(|i| i.state != InstanceState::Ready).collect()
    }
}

#[derive(Clone)]
pub struct ReadinessPoller {
    runtime: Arc<dyn Runtime>,
    probe: ReadinessProbe,
    interval: Duration,
    log_tail: usize,
}

impl ReadinessPoller {
    pub fn new(runtime: Arc<dyn Runtime>, config: &ReadinessConfig) -> Self {
        Self {
            runtime,
            probe: ReadinessProbe::from_config(config),
            interval: config.interval,
            log_tail: config.log_tail,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_probe(mut self, probe: ReadinessProbe) -> Self {
        self.probe = probe;
        self
    }

    /// True once exactly `expected` matching instances are all ready; false
    /// when `timeout` elapses first. Only fatal runtime errors are `Err`.
    pub async fn wait_for_instances(
        &self,
        expected: usize,
        filter: &InstanceFilter,
        timeout: Duration,
    ) -> Result<bool, RuntimeError> {
        Ok(self.poll(expected, filter, timeout).await?.converged())
    }

    pub async fn poll(
        &self,
        expected: usize,
        filter: &InstanceFilter,
        timeout: Duration,
    ) -> Result<PollOutcome, RuntimeError> {
        let start = Instant::now();
        let mut attempts = 0;
        let mut instances = Vec::new();
        let mut reported_failed = BTreeSet::new();

        loop {
            attempts += 1;
            let error = match self.observe(filter).await {
                Ok(observed) => {
                    instances = observed;
                    None
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!(attempt = attempts, error = %e, "registry poll failed");
                    Some(e.to_string())
                }
            };

            for inst in instances.iter().filter(|i| i.state == InstanceState::Failed) {
                if reported_failed.insert(inst.id.clone()) {
                    tracing::warn!(instance = %inst.name, "instance failed provisioning");
                }
            }

            let observed = instances.len();
            let ready = instances.iter().filter(|i| i.state == InstanceState::Ready).count();
            let elapsed = start.elapsed();
            let state = if error.is_none() && observed == expected && ready == expected {
                PollState::Converged
            } else if elapsed >= timeout {
                PollState::TimedOut
            } else {
                PollState::Polling
            };
            let attempt = PollAttempt { index: attempts, elapsed, observed, ready, state, error };
            tracing::debug!(?attempt, expected, "readiness poll");

            match state {
                PollState::Converged => {
                    tracing::info!(expected, attempts, ?elapsed, "instances ready");
                }
                PollState::TimedOut => {
                    let not_ready: Vec<&str> = instances
                        .iter()
                        .filter(|i| i.state != InstanceState::Ready)
                        .map(|i| i.name.as_str())
                        .collect();
                    tracing::warn!(
                        ?attempt,
                        expected,
                        ?not_ready,
                        "timed out waiting for instances"
                    );
                }
                PollState::Polling => {
                    let remaining = timeout.saturating_sub(elapsed);
                    tokio::time::sleep(self.interval.min(remaining)).await;
                    continue;
                }
            }
            return Ok(PollOutcome { state, attempts, last_attempt: Some(attempt), instances });
        }
    }

    /// List matching instances and classify each from its log tail.
    async fn observe(&self, filter: &InstanceFilter) -> Result<Vec<Instance>, RuntimeError> {
        let mut instances = self.runtime.list(filter).await?;
        for inst in &mut instances {
            let logs = match self.runtime.logs(&inst.id, self.log_tail).await {
                Ok(logs) => logs,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!(instance = %inst.name, error = %e, "log fetch failed");
                    String::new()
                }
            };
            inst.state = self.probe.classify(inst, &logs);
        }
        Ok(instances)
    }
}
