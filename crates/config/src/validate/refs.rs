use std::collections::HashMap;

use crate::error::ConfigError;
use crate::types::RawInstanceDef;

/// Check that every `depends_on` entry names another declared instance.
pub fn check_dependency_refs(
    instances: &HashMap<String, RawInstanceDef>,
    errors: &mut Vec<ConfigError>,
) {
    let mut names: Vec<&String> = instances.keys().collect();
    names.sort();
    for name in names {
        let path = format!("instance.{name}.depends_on");
        for dep in &instances[name].depends_on {
            if dep == name {
                errors.push(ConfigError::Constraint {
                    path: path.clone(),
                    message: "instance cannot depend on itself".to_owned(),
                });
            } else if !instances.contains_key(dep) {
                errors.push(ConfigError::UnknownInstanceRef {
                    path: path.clone(),
                    instance: dep.clone(),
                });
            }
        }
    }
}
