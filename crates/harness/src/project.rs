use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Compose project name for one topology run.
///
/// Combines pid, nanosecond timestamp and a process-wide counter so that
/// concurrent tests and concurrent test processes never share a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn generate(prefix: &str) -> Self {
        let nanos =
            SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_nanos();
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        Self(format!("{}-{pid:x}-{:x}-{seq:x}", sanitize(prefix), nanos & 0xFFFF_FFFF))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compose accepts lowercase letters, digits, `-` and `_`, starting with a letter or digit.
fn sanitize(prefix: &str) -> String {
    let cleaned: String = prefix
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect();
    let cleaned = cleaned.trim_start_matches(['-', '_']);
    if cleaned.is_empty() { "convoy".to_owned() } else { cleaned.to_owned() }
}
