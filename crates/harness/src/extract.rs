//! Reading structured state that instances produce asynchronously.

use std::future::Future;
use std::sync::Arc;

use convoy_config::{InstanceId, RetryBudget};
use convoy_runtime::{Runtime, RuntimeError};
use serde_json::Value;

use crate::client::{Method, RequestOptions, RetryingClient};

/// What to do when an artifact never shows up within the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    /// Log the cause and return `None`.
    Tolerate,
    /// Fail with `ExtractError::Missing`.
    Require,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("{artifact} still unavailable after {attempts} attempt(s): {last}")]
    Missing { artifact: String, attempts: u32, last: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ExtractError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExtractError::Runtime(e) if e.is_fatal())
    }
}

/// Why a single read did not yield a value.
enum Miss {
    /// Not there yet: no such file, empty body, 404, half-written JSON.
    Absent(String),
    Fatal(RuntimeError),
}

#[derive(Clone)]
pub struct StateExtractor {
    runtime: Arc<dyn Runtime>,
    budget: RetryBudget,
    user: Option<String>,
}

impl StateExtractor {
    pub fn new(runtime: Arc<dyn Runtime>, budget: RetryBudget) -> Self {
        Self { runtime, budget, user: None }
    }

    /// Run `cat` as this user inside the instance.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    /// Read and decode a JSON file inside an instance.
    pub async fn extract_file(
        &self,
        id: &InstanceId,
        path: &str,
        absence: Absence,
    ) -> Result<Option<Value>, ExtractError> {
        let command = format!("cat {}", shell_quote(path));
        let artifact = format!("{id}:{path}");
        let (runtime, command, user) = (&self.runtime, command.as_str(), self.user.as_deref());
        self.retry(&artifact, absence, move || async move {
            match runtime.exec(id, command, user).await {
                Ok(out) if !out.success() => Err(Miss::Absent(out.output.trim().to_owned())),
                Ok(out) => decode(&out.output),
                Err(e) if e.is_fatal() => Err(Miss::Fatal(e)),
                Err(e) => Err(Miss::Absent(e.to_string())),
            }
        })
        .await
    }

    /// GET a JSON document. Each extraction attempt is one request; the
    /// extractor's budget governs retries, not the client's.
    pub async fn extract_http(
        &self,
        client: &RetryingClient,
        url: &str,
        absence: Absence,
    ) -> Result<Option<Value>, ExtractError> {
        let opts = &RequestOptions::new().query("output_mode", "json").once();
        self.retry(url, absence, move || async move {
            match client.request(Method::GET, url, opts).await {
                Ok(resp) => decode(&resp.body),
                Err(e) => Err(Miss::Absent(e.to_string())),
            }
        })
        .await
    }

    async fn retry<F, Fut>(
        &self,
        artifact: &str,
        absence: Absence,
        mut read: F,
    ) -> Result<Option<Value>, ExtractError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, Miss>>,
    {
        let max = self.budget.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let last = match read().await {
                Ok(value) => return Ok(Some(value)),
                Err(Miss::Fatal(e)) => return Err(e.into()),
                Err(Miss::Absent(cause)) => cause,
            };
            tracing::debug!(artifact, attempt, cause = %last, "artifact not available");
            if attempt >= max {
                return match absence {
                    Absence::Tolerate => {
                        let attempts = attempt;
                        tracing::info!(artifact, attempts, cause = %last, "artifact absent");
                        Ok(None)
                    }
                    Absence::Require => Err(ExtractError::Missing {
                        artifact: artifact.to_owned(),
                        attempts: attempt,
                        last,
                    }),
                };
            }
            tokio::time::sleep(self.budget.delay).await;
        }
    }
}

fn decode(raw: &str) -> Result<Value, Miss> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Miss::Absent("empty".to_owned()));
    }
    serde_json::from_str(raw).map_err(|e| Miss::Absent(format!("not valid JSON yet: {e}")))
}

/// Single-quote for `sh -c`.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
