use convoy_config::RetryBudget;
use serde_json::Value;

use super::{AssertionError, AssertionReport, Diagnostic, as_u64, converge, join_url};
use crate::client::{Method, RequestOptions, RetryingClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationFactors {
    pub replication_factor: u64,
    pub search_factor: u64,
}

/// Single-shot comparison of the cluster's replication and search factors.
#[derive(Debug, Clone)]
pub struct ReplicationCheck {
    pub path: String,
    pub replication_pointer: String,
    pub search_pointer: String,
    pub expected: ReplicationFactors,
}

impl ReplicationCheck {
    pub fn new(replication_factor: u64, search_factor: u64) -> Self {
        Self {
            path: "/services/cluster/config".to_owned(),
            replication_pointer: "/entry/0/content/replication_factor".to_owned(),
            search_pointer: "/entry/0/content/search_factor".to_owned(),
            expected: ReplicationFactors { replication_factor, search_factor },
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn evaluate(&self, doc: &Value) -> Result<ReplicationFactors, Diagnostic> {
        let read = |pointer: &str| {
            doc.pointer(pointer).and_then(as_u64).ok_or_else(|| {
                Diagnostic::new(format!("no numeric value at {pointer}")).with_json(doc.clone())
            })
        };
        let actual = ReplicationFactors {
            replication_factor: read(&self.replication_pointer)?,
            search_factor: read(&self.search_pointer)?,
        };
        if actual != self.expected {
            return Err(Diagnostic::new(format!(
                "expected replication/search factor {}/{}, found {}/{}",
                self.expected.replication_factor,
                self.expected.search_factor,
                actual.replication_factor,
                actual.search_factor,
            ))
            .with_json(doc.clone()));
        }
        Ok(actual)
    }

    /// The request itself uses the client's retry budget; the comparison is
    /// made once.
    pub async fn run(
        &self,
        client: &RetryingClient,
        base_url: &str,
    ) -> Result<AssertionReport<ReplicationFactors>, AssertionError> {
        let url = &join_url(base_url, &self.path);
        let opts = &RequestOptions::new().query("output_mode", "json");
        converge("replication factors", RetryBudget::once(), move || async move {
            let resp = client.request(Method::GET, url, opts).await?;
            let doc = resp.json().map_err(|e| {
                Diagnostic::new(format!("invalid JSON: {e}")).with_body(resp.body.clone())
            })?;
            self.evaluate(&doc)
        })
        .await
    }
}
