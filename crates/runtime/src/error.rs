use std::io;

/// Errors from the container runtime adapter and the process runner.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The binary could not be started at all (missing, not executable).
    #[error("failed to spawn {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("`{command}` exited with {exit_code}: {}", .stderr.trim())]
    CommandFailed { command: String, exit_code: i32, stderr: String },

    /// `docker rm` style command that removed some objects before failing.
    #[error("`{command}` removed {removed:?} then failed: {}", .stderr.trim())]
    PartialRemoval { command: String, removed: Vec<String>, stderr: String },

    #[error("no host port published for {instance} port {port}/tcp")]
    PortNotFound { instance: String, port: u16 },

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("failed to decode runtime output: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RuntimeError {
    /// Spawn failures mean the environment is misconfigured; retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RuntimeError::Spawn { .. })
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
