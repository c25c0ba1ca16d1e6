#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod error;
mod types;
mod validate;

#[cfg(feature = "support")]
pub mod support;
#[cfg(feature = "support")]
pub use support::{poll, poll_async};

pub use error::{ConfigError, Result};
pub use types::*;

use std::path::Path;

/// Parse an HCL topology manifest into a fully validated `TopologyDef`.
///
/// `base_dir` anchors the relative `compose` path declared by the manifest.
pub fn parse_topology(name: &str, input: &str, base_dir: &Path) -> Result<TopologyDef> {
    let raw = parse_raw(input)?;
    validate::resolve(name, raw, base_dir)
}

/// Parse an HCL topology manifest into raw (unvalidated) structs.
pub fn parse_raw(input: &str) -> Result<RawTopology> {
    hcl::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Load `<dir>/<name>.hcl` and resolve it. A relative `dir` is made absolute
/// so the compose path stays valid whatever directory compose runs in. The
/// compose file the manifest names must exist.
pub fn load_topology(dir: &Path, name: &str) -> Result<TopologyDef> {
    let dir = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    let path = dir.join(format!("{name}.hcl"));
    let input = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let def = parse_topology(name, &input, &dir)?;
    validate::check_files(&def)?;
    Ok(def)
}
