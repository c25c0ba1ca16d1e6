/// Errors that can occur when loading or validating a topology manifest.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The manifest file could not be read.
    #[error("failed to read topology {path}: {message}")]
    Read { path: String, message: String },
    /// HCL parse error.
    #[error("parse error: {0}")]
    Parse(String),
    /// A field has an invalid value (e.g. bad duration or unknown role).
    #[error("{path}: {message}")]
    InvalidField { path: String, message: String },
    /// A `depends_on` entry points to an instance the topology does not declare.
    #[error("{path}: unknown instance reference '{instance}'")]
    UnknownInstanceRef { path: String, instance: String },
    /// A constraint violation (e.g. port 0, no instances declared).
    #[error("{path}: {message}")]
    Constraint { path: String, message: String },
    /// Multiple errors collected during validation.
    #[error("{}", display_multiple(.0))]
    Multiple(Vec<ConfigError>),
}

fn display_multiple(errors: &[ConfigError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n")
}

pub type Result<T> = std::result::Result<T, ConfigError>;
