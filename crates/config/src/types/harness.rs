use std::path::PathBuf;
use std::time::Duration;

/// A bounded retry loop: at most `attempts` tries, `delay` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryBudget {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// A single attempt, no retry.
    pub const fn once() -> Self {
        Self { attempts: 1, delay: Duration::ZERO }
    }

    /// Attempt count with the zero case folded into one attempt.
    pub fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

/// How the HTTP client verifies the management API's TLS certificate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TlsVerify {
    /// Accept any certificate. Instances serve self-signed certs by default.
    #[default]
    Disabled,
    /// Verify against the system roots.
    System,
    /// Verify against a PEM bundle on disk.
    CaFile(PathBuf),
}

impl TlsVerify {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" | "off" => TlsVerify::Disabled,
            "1" | "true" | "yes" | "on" => TlsVerify::System,
            _ => TlsVerify::CaFile(PathBuf::from(value.trim())),
        }
    }
}

/// Basic-auth credentials for the management API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// Total attempts per request, including the first.
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    pub verify_tls: TlsVerify,
    pub auth: Option<Credentials>,
}

impl HttpConfig {
    pub fn retry_budget(&self) -> RetryBudget {
        RetryBudget::new(self.max_retries, self.retry_delay)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            retry_delay: Duration::from_secs(6),
            timeout: Duration::from_secs(30),
            verify_tls: TlsVerify::Disabled,
            auth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessConfig {
    /// Sleep between registry polls.
    pub interval: Duration,
    /// Used when a topology does not set its own `readiness_timeout`.
    pub timeout: Duration,
    /// Log lines that mark an instance as provisioned. Empty means "running is ready".
    pub ready_markers: Vec<String>,
    /// Log lines that mark a provisioning failure.
    pub failure_markers: Vec<String>,
    /// How many trailing log lines to scan.
    pub log_tail: usize,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
            ready_markers: vec!["Ansible playbook complete".to_owned()],
            failure_markers: vec!["FAILED!".to_owned(), "fatal:".to_owned()],
            log_tail: 200,
        }
    }
}

/// Harness-wide settings, passed explicitly to every entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub docker_bin: String,
    /// Program plus leading arguments for compose, e.g. `["docker", "compose"]`.
    pub compose_command: Vec<String>,
    pub topology_dir: PathBuf,
    pub fixtures_dir: PathBuf,
    pub project_prefix: String,
    /// Image platform variant exported to the bring-up command.
    pub platform: Option<String>,
    /// Image reference exported to the bring-up command.
    pub image: Option<String>,
    pub readiness: ReadinessConfig,
    pub http: HttpConfig,
    /// Budget for reading artifacts produced asynchronously inside instances.
    pub extract: RetryBudget,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_owned(),
            compose_command: vec!["docker".to_owned(), "compose".to_owned()],
            topology_dir: PathBuf::from("topologies"),
            fixtures_dir: std::env::temp_dir(),
            project_prefix: "convoy".to_owned(),
            platform: None,
            image: None,
            readiness: ReadinessConfig::default(),
            http: HttpConfig::default(),
            extract: RetryBudget::new(20, Duration::from_secs(5)),
        }
    }
}

impl HarnessConfig {
    /// Read `CONVOY_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let read_ms = |var: &str, default: Duration| match lookup(var) {
            Some(val) => val.trim().parse().map(Duration::from_millis).unwrap_or(default),
            None => default,
        };
        let read_u32 = |var: &str, default: u32| match lookup(var) {
            Some(val) => val.trim().parse().unwrap_or(default),
            None => default,
        };
        let read_usize = |var: &str, default: usize| match lookup(var) {
            Some(val) => val.trim().parse().unwrap_or(default),
            None => default,
        };
        let read_list = |var: &str, default: Vec<String>| match lookup(var) {
            Some(val) => val
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
            None => default,
        };

        let compose_command = lookup("CONVOY_COMPOSE")
            .map(|v| v.split_whitespace().map(str::to_owned).collect::<Vec<_>>())
            .filter(|v| !v.is_empty())
            .unwrap_or(d.compose_command);

        let auth = lookup("CONVOY_PASSWORD").map(|password| Credentials {
            username: lookup("CONVOY_USERNAME").unwrap_or_else(|| "admin".to_owned()),
            password,
        });

        Self {
            docker_bin: lookup("CONVOY_DOCKER_BIN").unwrap_or(d.docker_bin),
            compose_command,
            topology_dir: lookup("CONVOY_TOPOLOGY_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.topology_dir),
            fixtures_dir: lookup("CONVOY_FIXTURES_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.fixtures_dir),
            project_prefix: lookup("CONVOY_PROJECT_PREFIX").unwrap_or(d.project_prefix),
            platform: lookup("CONVOY_PLATFORM"),
            image: lookup("CONVOY_IMAGE"),
            readiness: ReadinessConfig {
                interval: read_ms("CONVOY_POLL_INTERVAL_MS", d.readiness.interval),
                timeout: read_ms("CONVOY_READY_TIMEOUT_MS", d.readiness.timeout),
                ready_markers: read_list("CONVOY_READY_MARKERS", d.readiness.ready_markers),
                failure_markers: read_list("CONVOY_FAILURE_MARKERS", d.readiness.failure_markers),
                log_tail: read_usize("CONVOY_LOG_TAIL", d.readiness.log_tail),
            },
            http: HttpConfig {
                max_retries: read_u32("CONVOY_HTTP_RETRIES", d.http.max_retries),
                retry_delay: read_ms("CONVOY_HTTP_RETRY_DELAY_MS", d.http.retry_delay),
                timeout: read_ms("CONVOY_HTTP_TIMEOUT_MS", d.http.timeout),
                verify_tls: lookup("CONVOY_TLS_VERIFY")
                    .map(|v| TlsVerify::parse(&v))
                    .unwrap_or(d.http.verify_tls),
                auth,
            },
            extract: RetryBudget::new(
                read_u32("CONVOY_EXTRACT_ATTEMPTS", d.extract.attempts),
                read_ms("CONVOY_EXTRACT_DELAY_MS", d.extract.delay),
            ),
        }
    }

    /// Millisecond-scale timings for in-process tests against test doubles.
    pub fn fast() -> Self {
        let d = Self::default();
        Self {
            readiness: ReadinessConfig {
                interval: Duration::from_millis(20),
                timeout: Duration::from_secs(2),
                ..d.readiness
            },
            http: HttpConfig {
                max_retries: 3,
                retry_delay: Duration::from_millis(20),
                timeout: Duration::from_secs(2),
                ..d.http
            },
            extract: RetryBudget::new(5, Duration::from_millis(20)),
            ..d
        }
    }
}
