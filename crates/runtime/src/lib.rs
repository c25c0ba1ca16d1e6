#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod compose;
mod docker;
mod error;
mod filter;
pub mod parse;
mod process;
mod runtime;

pub use compose::ComposeProject;
pub use docker::Docker;
pub use error::{Result, RuntimeError};
pub use filter::{InstanceFilter, PROJECT_LABEL, ROLE_LABEL, SERVICE_LABEL};
pub use process::{CommandSpec, ProcessOutput, ProcessRunner};
pub use runtime::{BoxFuture, ExecOutput, Runtime};
