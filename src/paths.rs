use std::path::{Path, PathBuf};

use crate::error::BootstrapError;
use crate::utils::env::Environment;

/// Hidden directory under `$HOME` shared by every tool identity.
pub const CONFIG_DIR_NAME: &str = ".kdk";
pub const CONFIG_FILE_NAME: &str = "config.yaml";
const KEYPAIR_DIR_NAME: &str = "ssh";
const PRIVATE_KEY_NAME: &str = "id_rsa";
const PUBLIC_KEY_NAME: &str = "id_rsa.pub";

pub const DEFAULT_TOOL_NAME: &str = "kdk";

/// User-chosen name that namespaces the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolIdentity {
    name: String,
}

impl ToolIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for ToolIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_NAME)
    }
}

/// Every filesystem location the tool depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub keypair_dir: PathBuf,
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

impl ResolvedPaths {
    /// Pure derivation from a home directory; touches nothing on disk.
    pub fn from_home(home: &Path, identity: &ToolIdentity) -> Self {
        let config_dir = home.join(CONFIG_DIR_NAME);
        let config_file = config_dir.join(identity.name()).join(CONFIG_FILE_NAME);
        let keypair_dir = config_dir.join(KEYPAIR_DIR_NAME);
        let private_key = keypair_dir.join(PRIVATE_KEY_NAME);
        let public_key = keypair_dir.join(PUBLIC_KEY_NAME);

        Self {
            config_dir,
            config_file,
            keypair_dir,
            private_key,
            public_key,
        }
    }

    /// Resolve against the calling user's home directory, which must be absolute.
    pub fn resolve(env: &dyn Environment, identity: &ToolIdentity) -> Result<Self, BootstrapError> {
        let home = env
            .home_dir()
            .filter(|home| home.is_absolute())
            .ok_or(BootstrapError::HomeDirectoryUnavailable)?;
        Ok(Self::from_home(&home, identity))
    }

    pub fn keypair_present(&self) -> bool {
        self.private_key.is_file() && self.public_key.is_file()
    }
}
