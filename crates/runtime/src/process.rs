//! External command execution with live output streaming.
//!
//! Every line a child writes is forwarded to `tracing` at debug level as it
//! arrives, and also collected so callers can inspect it after exit.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::error::{Result, RuntimeError};

/// A program invocation: program, arguments, working directory, extra environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), ..Self::default() }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished process. A signal-terminated child reports `-1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        out.push_str(&self.stderr);
        out
    }

    /// Turn a non-zero exit into `RuntimeError::CommandFailed`.
    pub fn into_result(self, command: &CommandSpec) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(RuntimeError::CommandFailed {
            command: command.to_string(),
            exit_code: self.exit_code,
            stderr: self.stderr,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run to completion. A non-zero exit is data, not an error; only a
    /// failure to start the program (or to read its pipes) is `Err`.
    pub async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        tracing::debug!(command = %spec, "running");
        let mut child = cmd
            .spawn()
            .map_err(|source| RuntimeError::Spawn { program: spec.program.clone(), source })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout, stderr, status) = tokio::join!(
            drain(stdout, &spec.program, "stdout"),
            drain(stderr, &spec.program, "stderr"),
            child.wait(),
        );

        let exit_code = status?.code().unwrap_or(-1);
        tracing::debug!(command = %spec, exit_code, "finished");
        Ok(ProcessOutput { stdout: stdout?, stderr: stderr?, exit_code })
    }
}

/// Read a pipe line by line, logging each line and collecting the whole stream.
/// Invalid UTF-8 is replaced rather than rejected; container logs are not always clean.
async fn drain<R>(reader: Option<R>, program: &str, stream: &'static str) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(String::new());
    };
    let mut reader = BufReader::new(reader);
    let mut collected = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        tracing::debug!(program, stream, "{}", line.trim_end());
        collected.push_str(&line);
    }
    Ok(collected)
}
