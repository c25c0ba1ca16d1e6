use std::collections::BTreeSet;

use convoy_config::RetryBudget;
use serde_json::Value;

use super::{AssertionError, AssertionReport, DEFAULT_BUDGET, Diagnostic, converge, join_url};
use crate::client::{Method, RequestOptions, RetryingClient};

/// One member entry as reported by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub identity: String,
    pub status: String,
}

/// Asserts that an endpoint lists exactly the expected members, all in the
/// ready status.
#[derive(Debug, Clone)]
pub struct MembershipCheck {
    pub name: String,
    pub path: String,
    /// Pointer to the array of member entries in the response document.
    pub entries_pointer: String,
    /// Pointers inside one entry.
    pub identity_pointer: String,
    pub status_pointer: String,
    pub ready_status: String,
    pub budget: RetryBudget,
}

impl MembershipCheck {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        identity_pointer: impl Into<String>,
        status_pointer: impl Into<String>,
        ready_status: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            entries_pointer: "/entry".to_owned(),
            identity_pointer: identity_pointer.into(),
            status_pointer: status_pointer.into(),
            ready_status: ready_status.into(),
            budget: DEFAULT_BUDGET,
        }
    }

    /// Search heads registered with the cluster manager.
    pub fn search_heads() -> Self {
        Self::new(
            "cluster search heads",
            "/services/cluster/manager/searchheads",
            "/content/label",
            "/content/status",
            "Connected",
        )
    }

    /// Indexer peers registered with the cluster manager.
    pub fn peers() -> Self {
        Self::new(
            "cluster peers",
            "/services/cluster/manager/peers",
            "/content/label",
            "/content/status",
            "Up",
        )
    }

    /// Search peers configured on a search head.
    pub fn distributed_peers() -> Self {
        Self::new(
            "distributed peers",
            "/services/search/distributed/peers",
            "/content/peerName",
            "/content/status",
            "Up",
        )
    }

    pub fn with_budget(mut self, budget: RetryBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_entries_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.entries_pointer = pointer.into();
        self
    }

    /// Compare one response document against the expected identities.
    pub fn evaluate(
        &self,
        doc: &Value,
        expected: &BTreeSet<String>,
    ) -> Result<Vec<Member>, Diagnostic> {
        let Some(entries) = doc.pointer(&self.entries_pointer).and_then(Value::as_array) else {
            return Err(Diagnostic::new(format!("no member list at {}", self.entries_pointer))
                .with_json(doc.clone()));
        };

        let mut members = Vec::new();
        let mut anonymous = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let Some(identity) = entry.pointer(&self.identity_pointer).and_then(Value::as_str)
            else {
                anonymous.push(index);
                continue;
            };
            let status = entry
                .pointer(&self.status_pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            members.push(Member { identity: identity.to_owned(), status });
        }

        let seen: BTreeSet<String> = members.iter().map(|m| m.identity.clone()).collect();
        let missing: Vec<&String> = expected.difference(&seen).collect();
        let unexpected: Vec<&String> = seen.difference(expected).collect();
        let not_ready: Vec<String> = members
            .iter()
            .filter(|m| m.status != self.ready_status)
            .map(|m| format!("{}={}", m.identity, m.status))
            .collect();

        let converged = missing.is_empty() && unexpected.is_empty() && not_ready.is_empty();
        if converged && anonymous.is_empty() {
            return Ok(members);
        }
        let mut problems = Vec::new();
        if !anonymous.is_empty() {
            problems.push(format!("entries {anonymous:?} have no {}", self.identity_pointer));
        }
        if !missing.is_empty() {
            problems.push(format!("missing {missing:?}"));
        }
        if !unexpected.is_empty() {
            problems.push(format!("unexpected {unexpected:?}"));
        }
        if !not_ready.is_empty() {
            problems.push(format!("not {} {not_ready:?}", self.ready_status));
        }
        Err(Diagnostic::new(problems.join("; ")).with_json(doc.clone()))
    }

    pub async fn run(
        &self,
        client: &RetryingClient,
        base_url: &str,
        expected: &[&str],
    ) -> Result<AssertionReport<Vec<Member>>, AssertionError> {
        let expected: BTreeSet<String> = expected.iter().map(|s| (*s).to_owned()).collect();
        let url = join_url(base_url, &self.path);
        let opts = RequestOptions::new().query("output_mode", "json").query("count", "0").once();
        let (url, opts, expected) = (&url, &opts, &expected);
        converge(&self.name, self.budget, move || async move {
            let resp = client.request(Method::GET, url, opts).await?;
            let doc = resp.json().map_err(|e| {
                Diagnostic::new(format!("invalid JSON: {e}"))
                    .with_status(resp.status)
                    .with_body(resp.body.clone())
            })?;
            self.evaluate(&doc, expected)
        })
        .await
    }
}
