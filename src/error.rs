use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::runtime::RuntimeError;

const REBUILD_HINT: &str = "Please rebuild config file with `kdk init`";

/// Every way startup can fail. None of these are retried.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("unable to find home directory")]
    HomeDirectoryUnavailable,

    #[error("unable to create config directory {}: {source}", path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read config file {}: {source}", path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupted or deprecated kdk config file format in {}: {reason}", path.display())]
    ConfigCorrupt { path: PathBuf, reason: String },

    #[error("failed to create docker client: {0}")]
    RuntimeClientUnavailable(#[from] RuntimeError),
}

impl BootstrapError {
    /// What the user should do about it, when there is something beyond the message.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            BootstrapError::ConfigCorrupt { .. } => Some(REBUILD_HINT),
            _ => None,
        }
    }

    /// The path the failure is about, for structured log fields.
    pub fn path(&self) -> Option<&Path> {
        match self {
            BootstrapError::DirectoryCreateFailed { path, .. }
            | BootstrapError::ConfigUnreadable { path, .. }
            | BootstrapError::ConfigCorrupt { path, .. } => Some(path.as_path()),
            BootstrapError::HomeDirectoryUnavailable
            | BootstrapError::RuntimeClientUnavailable(_) => None,
        }
    }
}
