use std::path::Path;

use crate::error::ConfigError;

/// Every exposed port must be greater than zero.
pub fn check_ports(path: &str, ports: &[u16], errors: &mut Vec<ConfigError>) {
    if ports.contains(&0) {
        errors.push(ConfigError::Constraint {
            path: path.to_owned(),
            message: "port must be greater than 0".to_owned(),
        });
    }
}

/// The manifest must name a compose file.
pub fn check_compose(path: &str, compose: &str, errors: &mut Vec<ConfigError>) {
    if compose.trim().is_empty() {
        errors.push(ConfigError::Constraint {
            path: path.to_owned(),
            message: "compose file must be set".to_owned(),
        });
    }
}

/// The resolved compose file must exist on disk.
pub fn check_compose_exists(path: &str, file: &Path, errors: &mut Vec<ConfigError>) {
    if !file.is_file() {
        errors.push(ConfigError::Constraint {
            path: path.to_owned(),
            message: format!("compose file {} does not exist", file.display()),
        });
    }
}

/// A topology with nothing in it can never converge.
pub fn check_not_empty(path: &str, count: usize, errors: &mut Vec<ConfigError>) {
    if count == 0 {
        errors.push(ConfigError::Constraint {
            path: path.to_owned(),
            message: "topology must declare at least one instance".to_owned(),
        });
    }
}

/// A readiness timeout of zero would time out before the first poll.
pub fn check_timeout(path: &str, timeout: std::time::Duration, errors: &mut Vec<ConfigError>) {
    if timeout.is_zero() {
        errors.push(ConfigError::Constraint {
            path: path.to_owned(),
            message: "readiness timeout must be greater than 0".to_owned(),
        });
    }
}
