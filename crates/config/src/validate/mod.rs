mod constraints;
mod parse;
mod refs;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::types::*;

/// Check the files a resolved topology refers to.
pub fn check_files(def: &TopologyDef) -> Result<()> {
    let mut errors = Vec::new();
    constraints::check_compose_exists("compose", &def.compose_file, &mut errors);
    match errors.pop() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Resolve a raw HCL manifest into a fully validated `TopologyDef`.
pub fn resolve(name: &str, raw: RawTopology, base_dir: &Path) -> Result<TopologyDef> {
    let mut errors = Vec::new();

    constraints::check_compose("compose", &raw.compose, &mut errors);
    constraints::check_not_empty("instance", raw.instance.len(), &mut errors);
    let readiness_timeout = raw.readiness_timeout.as_deref().map(|value| {
        let before = errors.len();
        let timeout = parse::parse_duration("readiness_timeout", value, &mut errors);
        if errors.len() == before {
            constraints::check_timeout("readiness_timeout", timeout, &mut errors);
        }
        timeout
    });

    let mut instances = BTreeMap::new();
    for (inst_name, raw_inst) in &raw.instance {
        let path = format!("instance.{inst_name}");
        let role = parse::parse_role(&format!("{path}.role"), &raw_inst.role, &mut errors);
        constraints::check_ports(&format!("{path}.ports"), &raw_inst.ports, &mut errors);
        if let Some(role) = role {
            instances.insert(
                inst_name.clone(),
                InstanceDef {
                    name: inst_name.clone(),
                    role,
                    ports: raw_inst.ports.clone(),
                    depends_on: raw_inst.depends_on.clone(),
                },
            );
        }
    }

    refs::check_dependency_refs(&raw.instance, &mut errors);

    if errors.is_empty() {
        Ok(TopologyDef {
            name: name.to_owned(),
            compose_file: base_dir.join(raw.compose.trim()),
            readiness_timeout,
            env: raw.env.into_iter().collect(),
            instances,
        })
    } else if errors.len() == 1 {
        Err(errors.remove(0))
    } else {
        // HashMap iteration order is arbitrary; keep reports stable.
        errors.sort_by_key(|e| e.to_string());
        Err(ConfigError::Multiple(errors))
    }
}
