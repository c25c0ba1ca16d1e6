use std::collections::BTreeSet;

use convoy_config::RetryBudget;
use serde_json::Value;

use super::{AssertionError, AssertionReport, DEFAULT_BUDGET, Diagnostic, converge, join_url};
use crate::client::{Method, RequestOptions, RetryingClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub sid: String,
    pub providers: Vec<String>,
    pub distinct: BTreeSet<String>,
}

/// Dispatches a blocking search from one node and checks that it fanned out:
/// the job lists the expected number of search providers and the results
/// carry the expected number of distinct values of `distinct_field`.
#[derive(Debug, Clone)]
pub struct CrossNodeSearch {
    pub query: String,
    pub distinct_field: String,
    pub expected_providers: usize,
    pub expected_distinct: usize,
    pub budget: RetryBudget,
}

impl CrossNodeSearch {
    /// Expect `nodes` providers and `nodes` distinct `splunk_server` values.
    pub fn new(query: impl Into<String>, nodes: usize) -> Self {
        Self {
            query: query.into(),
            distinct_field: "splunk_server".to_owned(),
            expected_providers: nodes,
            expected_distinct: nodes,
            budget: DEFAULT_BUDGET,
        }
    }

    pub fn with_distinct_field(mut self, field: impl Into<String>) -> Self {
        self.distinct_field = field.into();
        self
    }

    pub fn with_expected_distinct(mut self, count: usize) -> Self {
        self.expected_distinct = count;
        self
    }

    pub fn with_budget(mut self, budget: RetryBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Queries must start with a command; bare terms get an implicit `search`.
    fn search_string(&self) -> String {
        let query = self.query.trim();
        if query.starts_with("search ") || query.starts_with('|') {
            query.to_owned()
        } else {
            format!("search {query}")
        }
    }

    pub fn evaluate(
        &self,
        sid: &str,
        job: &Value,
        results: &Value,
    ) -> Result<SearchOutcome, Diagnostic> {
        let providers: Vec<String> = job
            .pointer("/entry/0/content/searchProviders")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).map(str::to_owned).collect())
            .unwrap_or_default();
        if providers.len() != self.expected_providers {
            return Err(Diagnostic::new(format!(
                "search {sid}: expected {} search providers, found {providers:?}",
                self.expected_providers
            ))
            .with_json(job.clone()));
        }

        let Some(rows) = results.pointer("/results").and_then(Value::as_array) else {
            return Err(Diagnostic::new(format!("search {sid}: no results array"))
                .with_json(results.clone()));
        };
        let distinct: BTreeSet<String> = rows
            .iter()
            .filter_map(|row| row.get(&self.distinct_field))
            .map(|v| v.as_str().map(str::to_owned).unwrap_or_else(|| v.to_string()))
            .collect();
        if distinct.len() != self.expected_distinct {
            return Err(Diagnostic::new(format!(
                "search {sid}: expected {} distinct {}, found {distinct:?}",
                self.expected_distinct, self.distinct_field
            ))
            .with_json(results.clone()));
        }
        Ok(SearchOutcome { sid: sid.to_owned(), providers, distinct })
    }

    pub async fn run(
        &self,
        client: &RetryingClient,
        base_url: &str,
    ) -> Result<AssertionReport<SearchOutcome>, AssertionError> {
        let jobs_url = &join_url(base_url, "/services/search/jobs");
        let check = format!("cross-node search `{}`", self.query);
        converge(&check, self.budget, move || async move {
            let dispatch = RequestOptions::new()
                .form([
                    ("search", self.search_string()),
                    ("exec_mode", "blocking".to_owned()),
                    ("output_mode", "json".to_owned()),
                ])
                .once();
            let created = client.request(Method::POST, jobs_url, &dispatch).await?;
            let sid = decode(&created)?
                .get("sid")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| {
                    Diagnostic::new("dispatch response has no sid").with_body(created.body.clone())
                })?;

            let json = RequestOptions::new().query("output_mode", "json").once();
            let job_url = format!("{jobs_url}/{sid}");
            let job = decode(&client.request(Method::GET, &job_url, &json).await?)?;

            let results_opts = json.query("count", "0");
            let results_url = format!("{job_url}/results");
            let results =
                decode(&client.request(Method::GET, &results_url, &results_opts).await?)?;

            self.evaluate(&sid, &job, &results)
        })
        .await
    }
}

fn decode(resp: &crate::client::Response) -> Result<Value, Diagnostic> {
    resp.json().map_err(|e| {
        Diagnostic::new(format!("invalid JSON: {e}"))
            .with_status(resp.status)
            .with_body(resp.body.clone())
    })
}
