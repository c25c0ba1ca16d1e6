//! HTTP client for the management API with a fixed-delay retry loop.

use convoy_config::{HttpConfig, RetryBudget, TlsVerify};
pub use reqwest::Method;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Connection, TLS or timeout failure on every attempt.
    #[error("{url}: request failed after {attempts} attempt(s): {message}")]
    Transport { url: String, attempts: u32, message: String },

    /// The last attempt answered outside 2xx.
    #[error("{url}: HTTP {status} after {attempts} attempt(s): {}", truncate(.body, 512))]
    Status { url: String, attempts: u32, status: u16, body: String },

    /// A 2xx response whose body was not the JSON the caller asked for.
    #[error("{url}: invalid JSON in response: {message}")]
    Decode { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            HttpError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Per-request extras. Everything is optional.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub form: Option<Vec<(String, String)>>,
    pub json: Option<Value>,
    /// Overrides the client's configured retry budget.
    pub retry: Option<RetryBudget>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn form<K: Into<String>, V: Into<String>>(
        mut self,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.form = Some(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn retry(mut self, budget: RetryBudget) -> Self {
        self.retry = Some(budget);
        self
    }

    /// Single attempt; for callers that run their own retry loop.
    pub fn once(self) -> Self {
        self.retry(RetryBudget::once())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Why one attempt did not succeed.
enum Failure {
    Transport(String),
    Status(Response),
}

impl Failure {
    fn into_error(self, url: &str, attempts: u32) -> HttpError {
        let url = url.to_owned();
        match self {
            Failure::Transport(message) => HttpError::Transport { url, attempts, message },
            Failure::Status(resp) => {
                HttpError::Status { url, attempts, status: resp.status, body: resp.body }
            }
        }
    }
}

/// Management-API client. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    http: reqwest::Client,
    config: HttpConfig,
}

impl RetryingClient {
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        builder = match &config.verify_tls {
            TlsVerify::Disabled => builder.danger_accept_invalid_certs(true),
            TlsVerify::System => builder,
            TlsVerify::CaFile(path) => {
                let pem = std::fs::read(path)
                    .map_err(|e| HttpError::Build(format!("{}: {e}", path.display())))?;
                let cert = reqwest::Certificate::from_pem(&pem)
                    .map_err(|e| HttpError::Build(format!("{}: {e}", path.display())))?;
                builder.add_root_certificate(cert)
            }
        };
        let http = builder.build().map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Send a request, retrying transport failures and non-2xx answers.
    ///
    /// Makes at most `max_attempts` requests, `delay` apart, and returns the
    /// first 2xx response. On exhaustion the last failure is returned.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        opts: &RequestOptions,
    ) -> Result<Response, HttpError> {
        let budget = opts.retry.unwrap_or_else(|| self.config.retry_budget());
        let max = budget.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.send_once(method.clone(), url, opts).await {
                Ok(resp) if (200..300).contains(&resp.status) => return Ok(resp),
                Ok(resp) => {
                    tracing::debug!(%url, attempt, status = resp.status, "non-success status");
                    Failure::Status(resp)
                }
                Err(e) => {
                    let message = error_chain(&e);
                    tracing::debug!(%url, attempt, error = %message, "request failed");
                    Failure::Transport(message)
                }
            };
            if attempt >= max {
                return Err(failure.into_error(url, attempt));
            }
            tokio::time::sleep(budget.delay).await;
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        opts: &RequestOptions,
    ) -> reqwest::Result<Response> {
        let mut req = self.http.request(method, url);
        if !opts.query.is_empty() {
            req = req.query(&opts.query);
        }
        if let Some(form) = &opts.form {
            req = req.form(form);
        }
        if let Some(json) = &opts.json {
            req = req.json(json);
        }
        if let Some(auth) = &self.config.auth {
            req = req.basic_auth(&auth.username, Some(&auth.password));
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(Response { status, body })
    }

    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.request(Method::GET, url, &RequestOptions::new()).await
    }

    /// GET with `output_mode=json`, decoding the body.
    pub async fn get_json(&self, url: &str) -> Result<Value, HttpError> {
        let opts = RequestOptions::new().query("output_mode", "json");
        let resp = self.request(Method::GET, url, &opts).await?;
        resp.json().map_err(|e| HttpError::Decode { url: url.to_owned(), message: e.to_string() })
    }

    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Response, HttpError> {
        let opts = RequestOptions::new().form(form.iter().copied());
        self.request(Method::POST, url, &opts).await
    }
}

/// `reqwest` hides the useful cause (refused, TLS, timeout) in the source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
