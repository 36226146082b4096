//! Host machine identity
//!
//! [`HostIdentity`] is the privileged call that yields a stable machine
//! fingerprint. [`MachineIdHost`] derives it from the OS machine-id file.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Well-known machine-id locations, tried in order
pub const DEFAULT_MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Salt mixed into the fingerprint so the raw machine id never leaves the process
const FINGERPRINT_SALT: &[u8] = b"yorutsuke:device:";

/// Host identity call failures
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// No source of a machine id on this host
    #[error("host identity unavailable: {0}")]
    Unavailable(String),

    /// Source exists but may not be read
    #[error("permission denied reading {0}")]
    PermissionDenied(PathBuf),

    /// Source read but unusable
    #[error("invalid machine id in {0}")]
    Invalid(PathBuf),

    /// Other IO failure
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of a stable per-machine fingerprint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostIdentity: Send + Sync {
    /// Fingerprint string, stable across reinstalls on the same machine
    async fn machine_fingerprint(&self) -> Result<String, HostError>;
}

/// Reads the OS machine id and hashes it
#[derive(Debug, Clone)]
pub struct MachineIdHost {
    paths: Vec<PathBuf>,
}

impl MachineIdHost {
    /// Use the well-known locations
    #[must_use]
    pub fn new() -> Self {
        Self {
            paths: DEFAULT_MACHINE_ID_PATHS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Use a single explicit path
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
        }
    }
}

impl Default for MachineIdHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostIdentity for MachineIdHost {
    async fn machine_fingerprint(&self) -> Result<String, HostError> {
        for path in &self.paths {
            let raw = match tokio::fs::read_to_string(path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                    return Err(HostError::PermissionDenied(path.clone()))
                }
                Err(source) => {
                    return Err(HostError::Io {
                        path: path.clone(),
                        source,
                    })
                }
            };

            let machine_id = raw.trim();
            if machine_id.is_empty() {
                return Err(HostError::Invalid(path.clone()));
            }
            return Ok(fingerprint(machine_id));
        }

        Err(HostError::Unavailable(format!(
            "none of {} machine-id paths exist",
            self.paths.len()
        )))
    }
}

/// First 16 bytes of the salted SHA-256, hex encoded
fn fingerprint(machine_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_SALT);
    hasher.update(machine_id.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}
