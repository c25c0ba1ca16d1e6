use std::time::Duration;

use crate::error::ConfigError;
use crate::types::Role;

/// Parse a duration string like "90s" or "10m".
/// On failure, pushes an error and returns a zero duration.
pub fn parse_duration(path: &str, value: &str, errors: &mut Vec<ConfigError>) -> Duration {
    match value.parse::<humantime::Duration>() {
        Ok(d) => d.into(),
        Err(e) => {
            errors.push(ConfigError::InvalidField {
                path: path.to_owned(),
                message: format!("invalid duration '{value}': {e}"),
            });
            Duration::ZERO
        }
    }
}

/// Parse a role name. On failure, pushes an error and returns `None`.
pub fn parse_role(path: &str, value: &str, errors: &mut Vec<ConfigError>) -> Option<Role> {
    match value.parse::<Role>() {
        Ok(role) => Some(role),
        Err(message) => {
            errors.push(ConfigError::InvalidField { path: path.to_owned(), message });
            None
        }
    }
}
