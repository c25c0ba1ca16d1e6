//! Generated files a topology mounts, owned by one project.

use std::path::{Path, PathBuf};

use rcgen::{CertificateParams, KeyPair};

use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Files named `<project>-<name>` under a shared directory. Cleanup removes
/// exactly the files written through this set.
#[derive(Debug)]
pub struct Fixtures {
    dir: PathBuf,
    project: String,
    written: Vec<PathBuf>,
}

impl Fixtures {
    pub fn new(dir: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self { dir: dir.into(), project: project.into(), written: Vec::new() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}-{name}", self.project))
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn write(&mut self, name: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.path(name);
        std::fs::create_dir_all(&self.dir)
            .map_err(|source| HarnessError::Fixture { path: self.dir.clone(), source })?;
        std::fs::write(&path, contents)
            .map_err(|source| HarnessError::Fixture { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), "wrote fixture");
        if !self.written.contains(&path) {
            self.written.push(path.clone());
        }
        Ok(path)
    }

    /// Self-signed certificate for `hostnames`, written as `<name>.pem` and `<name>.key`.
    pub fn generate_certificate(
        &mut self,
        name: &str,
        hostnames: &[&str],
    ) -> Result<CertificatePaths> {
        let names = hostnames.iter().map(|h| (*h).to_owned()).collect::<Vec<_>>();
        let mut params =
            CertificateParams::new(names).map_err(|e| HarnessError::Certificate(e.to_string()))?;
        params.distinguished_name = rcgen::DistinguishedName::new();
        let key_pair = KeyPair::generate().map_err(|e| HarnessError::Certificate(e.to_string()))?;
        let cert =
            params.self_signed(&key_pair).map_err(|e| HarnessError::Certificate(e.to_string()))?;

        let cert = self.write(&format!("{name}.pem"), cert.pem())?;
        let key = self.write(&format!("{name}.key"), key_pair.serialize_pem())?;
        Ok(CertificatePaths { cert, key })
    }

    /// Delete every written file. Already-missing files count as removed;
    /// other failures are appended to `errors`. Returns how many were removed.
    pub fn cleanup(&mut self, errors: &mut Vec<String>) -> usize {
        let mut removed = 0;
        for path in self.written.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "fixture already gone");
                }
                Err(e) => errors.push(format!("remove {}: {e}", path.display())),
            }
        }
        removed
    }
}
