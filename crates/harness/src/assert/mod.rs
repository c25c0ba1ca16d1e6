//! Convergence assertions: checks that retry until the cluster reports the
//! expected state, keeping the last observation for the failure message.

mod inventory;
mod membership;
mod replication;
mod search;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use convoy_config::RetryBudget;
use serde_json::Value;
use tokio::time::Instant;

use crate::client::{HttpError, truncate};

pub use inventory::InventoryCheck;
pub use membership::{Member, MembershipCheck};
pub use replication::{ReplicationCheck, ReplicationFactors};
pub use search::{CrossNodeSearch, SearchOutcome};

/// Retry budget for checks that do not set their own.
pub const DEFAULT_BUDGET: RetryBudget = RetryBudget::new(20, Duration::from_secs(6));

/// What the last failed attempt saw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostic {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub json: Option<Value>,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into(), ..Self::default() }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }
}

impl From<HttpError> for Diagnostic {
    fn from(err: HttpError) -> Self {
        let mut diag = Diagnostic::new(err.to_string());
        if let HttpError::Status { status, body, .. } = err {
            diag.status = Some(status);
            diag.body = Some(body);
        }
        diag
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)?;
        if let Some(status) = self.status {
            write!(f, " (status {status})")?;
        }
        match (&self.json, &self.body) {
            (Some(json), _) => write!(f, "; response: {}", truncate(&json.to_string(), 1024)),
            (None, Some(body)) if !body.is_empty() => {
                write!(f, "; body: {}", truncate(body, 1024))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssertionReport<T> {
    pub check: String,
    pub attempts: u32,
    pub elapsed: Duration,
    pub payload: T,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{check} did not converge after {attempts} attempt(s): {last}")]
pub struct AssertionError {
    pub check: String,
    pub attempts: u32,
    pub last: Diagnostic,
}

/// Run `attempt` until it succeeds or the budget is spent.
pub async fn converge<T, F, Fut>(
    check: &str,
    budget: RetryBudget,
    mut attempt: F,
) -> Result<AssertionReport<T>, AssertionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Diagnostic>>,
{
    let start = Instant::now();
    let max = budget.max_attempts();
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Ok(payload) => {
                let elapsed = start.elapsed();
                tracing::info!(check, attempts, ?elapsed, "check passed");
                return Ok(AssertionReport { check: check.to_owned(), attempts, elapsed, payload });
            }
            Err(last) if attempts >= max => {
                tracing::warn!(check, attempts, %last, "check did not converge");
                return Err(AssertionError { check: check.to_owned(), attempts, last });
            }
            Err(diag) => {
                tracing::debug!(check, attempt = attempts, %diag, "check not yet satisfied");
            }
        }
        tokio::time::sleep(budget.delay).await;
    }
}

/// JSON numbers or numeric strings, which the management API mixes freely.
pub(crate) fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Join a base URL and an absolute path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
