use std::path::PathBuf;

use convoy_config::ConfigError;
use convoy_runtime::RuntimeError;

use crate::assert::AssertionError;
use crate::client::HttpError;
use crate::extract::ExtractError;

/// How a caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Environment or definition is broken; stop the scenario.
    Fatal,
    /// The system may not have converged yet; trying again can help.
    Retryable,
    /// A bounded wait ran out.
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Assertion(#[from] AssertionError),

    #[error("bring-up of {project} exited with {exit_code}: {stderr}")]
    BringUp { project: String, exit_code: i32, stderr: String },

    #[error("fixture {}: {source}", .path.display())]
    Fixture { path: PathBuf, source: std::io::Error },

    #[error("certificate generation failed: {0}")]
    Certificate(String),

    #[error("no instance named '{name}' in project {project}")]
    UnknownInstance { project: String, name: String },

    #[error("scenario task was cancelled")]
    Cancelled,
}

impl HarnessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::Runtime(e) if e.is_fatal() => ErrorKind::Fatal,
            HarnessError::Runtime(_) | HarnessError::Http(_) => ErrorKind::Retryable,
            HarnessError::Extract(e) if e.is_fatal() => ErrorKind::Fatal,
            HarnessError::Extract(_) => ErrorKind::Retryable,
            HarnessError::Assertion(_) => ErrorKind::Timeout,
            HarnessError::Config(_)
            | HarnessError::BringUp { .. }
            | HarnessError::Fixture { .. }
            | HarnessError::Certificate(_)
            | HarnessError::UnknownInstance { .. }
            | HarnessError::Cancelled => ErrorKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
