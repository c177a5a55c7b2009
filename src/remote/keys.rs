//! Private key lookup for remote sessions.

use crate::error::FleetError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A private key file that has been checked to exist and look like a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    /// Resolve `~/.ssh/<key_name>.pem` for the current user.
    pub fn resolve(key_name: &str) -> Result<Self, FleetError> {
        let home = dirs::home_dir().ok_or_else(|| {
            FleetError::Precondition("could not determine the home directory".to_string())
        })?;
        Self::load(&Self::default_path(&home, key_name))
    }

    /// Where the key for `key_name` lives under `home`.
    pub fn default_path(home: &Path, key_name: &str) -> PathBuf {
        home.join(".ssh").join(format!("{}.pem", key_name))
    }

    /// Check that `path` is a readable PEM private key.
    pub fn load(path: &Path) -> Result<Self, FleetError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FleetError::Precondition(format!(
                "could not read key file {}: {}",
                path.display(),
                e
            ))
        })?;

        if !content.contains("PRIVATE KEY-----") {
            return Err(FleetError::Precondition(format!(
                "{} does not contain a PEM private key",
                path.display()
            )));
        }

        debug!("Using key file {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
