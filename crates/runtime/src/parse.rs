//! Decoding of docker CLI output.

use std::collections::BTreeMap;

use convoy_config::{Health, Instance, Role};
use serde::Deserialize;

use crate::error::{Result, RuntimeError};
use crate::filter::{PROJECT_LABEL, ROLE_LABEL, SERVICE_LABEL};

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsRow {
    #[serde(rename = "ID")]
    id: String,
    names: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    labels: String,
    #[serde(default)]
    ports: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    status: String,
}

impl From<PsRow> for Instance {
    fn from(row: PsRow) -> Self {
        let name = row.names.split(',').next().unwrap_or_default().trim().to_owned();
        let labels = parse_labels(&row.labels);
        let running = if row.state.is_empty() {
            row.status.starts_with("Up")
        } else {
            row.state == "running"
        };
        let base = Instance::new(row.id, name);
        Instance {
            project: labels.get(PROJECT_LABEL).cloned(),
            service: labels.get(SERVICE_LABEL).cloned(),
            role: labels.get(ROLE_LABEL).and_then(|r| r.parse::<Role>().ok()),
            image: row.image,
            ports: parse_ports(&row.ports),
            health: parse_health(&row.status),
            running,
            labels,
            ..base
        }
    }
}

/// Decode `docker ps` JSON-lines output. Blank lines are skipped.
pub fn parse_ps_output(stdout: &str) -> Result<Vec<Instance>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str::<PsRow>(line)
                .map(Instance::from)
                .map_err(|e| RuntimeError::Decode(format!("{e}: {line}")))
        })
        .collect()
}

/// `a=1,b=2` into a map. Values may themselves contain `=`.
pub fn parse_labels(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_owned(), value.to_owned()))
        })
        .collect()
}

/// Map published TCP container ports to host ports.
///
/// Handles `0.0.0.0:32768->8089/tcp`, IPv6 duplicates (`[::]:32768->8089/tcp`,
/// `:::32768->8089/tcp`) and ranges (`0.0.0.0:9997-9998->9997-9998/tcp`).
/// Unpublished (`8065/tcp`) and UDP entries are ignored.
pub fn parse_ports(raw: &str) -> BTreeMap<u16, u16> {
    let mut ports = BTreeMap::new();
    for entry in raw.split(',').map(str::trim) {
        let Some((host, container)) = entry.split_once("->") else {
            continue;
        };
        let (container, proto) = container.split_once('/').unwrap_or((container, "tcp"));
        if proto != "tcp" {
            continue;
        }
        let Some((_, host)) = host.rsplit_once(':') else {
            continue;
        };
        let (Some(host), Some(container)) = (parse_range(host), parse_range(container)) else {
            continue;
        };
        for (c, h) in container.zip(host) {
            ports.entry(c).or_insert(h);
        }
    }
    ports
}

fn parse_range(raw: &str) -> Option<std::ops::RangeInclusive<u16>> {
    match raw.split_once('-') {
        Some((start, end)) => Some(start.parse().ok()?..=end.parse().ok()?),
        None => {
            let port = raw.parse().ok()?;
            Some(port..=port)
        }
    }
}

/// Health from the `Status` column, e.g. `Up 2 minutes (healthy)`.
pub fn parse_health(status: &str) -> Health {
    if status.contains("(healthy)") {
        Health::Healthy
    } else if status.contains("(unhealthy)") {
        Health::Unhealthy
    } else if status.contains("(health: starting)") {
        Health::Starting
    } else {
        Health::None
    }
}

/// First host port from `docker port <id> <port>/tcp`, e.g. `0.0.0.0:32768`.
pub fn parse_port_output(raw: &str) -> Option<u16> {
    raw.lines().find_map(|line| line.trim().rsplit_once(':')?.1.parse().ok())
}

/// Docker's "object does not exist" responses, which removal treats as done.
pub fn is_absent(stderr: &str) -> bool {
    let mut lines = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();
    lines.peek().is_some()
        && lines.all(|line| {
            let line = line.to_ascii_lowercase();
            line.contains("no such") || line.contains("not found")
        })
}
