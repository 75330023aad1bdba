//! One-shot startup sequence that runs before any subcommand.
//!
//! Order matters: resolve paths, ensure the config directory, register the
//! layered settings, pick the log format, parse the persisted config, create
//! the root context, then build the runtime client. Every failure is
//! returned to the caller; the entry point alone decides to exit.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

use serde_yaml::Value;
use tracing::{debug, warn};

use crate::config::{self, FileSource, PersistedConfig};
use crate::context::ExecutionContext;
use crate::error::BootstrapError;
use crate::paths::{ResolvedPaths, ToolIdentity};
use crate::runtime::DockerClient;
use crate::settings::Settings;
use crate::utils::env::Environment;
use crate::utils::logging::{LogFormat, LogSink};

/// Inputs taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    pub identity: ToolIdentity,
    /// Whether `-v` was passed; feeds the flags layer.
    pub verbose: bool,
}

/// Everything a subcommand needs. Built once, then only read.
#[derive(Debug)]
pub struct ProcessState {
    pub identity: ToolIdentity,
    pub paths: ResolvedPaths,
    /// Resolved from the layered settings, so `-v` or `KDK_VERBOSE`.
    pub verbose: bool,
    pub settings: Settings,
    pub log_format: LogFormat,
    pub config: PersistedConfig,
    pub context: ExecutionContext,
    pub runtime: DockerClient,
}

pub fn bootstrap(
    options: BootstrapOptions,
    env: &dyn Environment,
    log: &dyn LogSink,
) -> Result<ProcessState, BootstrapError> {
    let BootstrapOptions {
        identity,
        verbose: verbose_flag,
    } = options;

    let paths = ResolvedPaths::resolve(env, &identity)?;
    debug!(
        config_dir = %paths.config_dir.display(),
        config_file = %paths.config_file.display(),
        "resolved paths"
    );

    let created = ensure_config_dir(&paths.config_dir)?;
    debug!(path = %paths.config_dir.display(), created, "config directory ready");

    let settings = layered_settings(&paths.config_file, verbose_flag, env);

    let verbose = settings.get_bool("verbose");
    let log_format = LogFormat::from_json_setting(settings.get_bool("json"));
    log.apply(log_format, verbose);
    debug!(format = ?log_format, verbose, "log output selected");

    let config = config::load_persisted_config(&paths.config_file)?;

    let context = ExecutionContext::background();

    let runtime = DockerClient::from_env(env)?;
    debug!(
        endpoint = %runtime.endpoint(),
        tls = runtime.tls().is_some(),
        keypair_present = paths.keypair_present(),
        "runtime client ready"
    );

    Ok(ProcessState {
        identity,
        paths,
        verbose,
        settings,
        log_format,
        config,
        context,
        runtime,
    })
}

/// Create the shared config directory (owner-only) unless it is already there.
/// Returns whether it was created by this call.
fn ensure_config_dir(dir: &Path) -> Result<bool, BootstrapError> {
    let create_failed = |source: io::Error| BootstrapError::DirectoryCreateFailed {
        path: dir.to_path_buf(),
        source,
    };

    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => return Ok(false),
        Ok(_) => {
            return Err(create_failed(io::Error::new(
                ErrorKind::AlreadyExists,
                "exists but is not a directory",
            )));
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(create_failed(err)),
    }

    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    match builder.create(dir) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(false),
        Err(err) => Err(create_failed(err)),
    }
}

fn layered_settings(config_file: &Path, verbose: bool, env: &dyn Environment) -> Settings {
    let mut flags = BTreeMap::new();
    if verbose {
        flags.insert("verbose".to_string(), Value::Bool(true));
    }

    let settings = Settings::new().with_flags(flags).with_environment(env);

    match config::read_file_source(config_file) {
        FileSource::Loaded(file) => settings.with_file(&file),
        FileSource::Absent => {
            warn!(
                config_file = %config_file.display(),
                "config file absent, using defaults"
            );
            settings
        }
        FileSource::Unusable(err) => {
            warn!(config_file = %config_file.display(), err = %err, "failed to load kdk config");
            settings
        }
    }
}
