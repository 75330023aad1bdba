use clap::Parser;
use tracing::{debug, error};

use crate::bootstrap::{self, BootstrapOptions, ProcessState};
use crate::paths::{DEFAULT_TOOL_NAME, ToolIdentity};
use crate::utils::env::ProcessEnvironment;
use crate::utils::logging;

const BANNER: &str = r"

 _  __ ____  _  __
/ |/ //  _ \/ |/ /
|   / | | \||   /
|   \ | |_/||   \
\_|\_\\____/\_|\_\


A full kubernetes development environment in a container";

/// Root CLI for kdk
#[derive(Parser)]
#[command(name = "kdk", version)]
#[command(about = "Kubernetes Development Kit", long_about = BANNER)]
pub struct Cli {
    /// KDK name
    #[arg(long, default_value = DEFAULT_TOOL_NAME)]
    pub name: String,

    /// verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl From<&Cli> for BootstrapOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            identity: ToolIdentity::new(cli.name.clone()),
            verbose: cli.verbose,
        }
    }
}

/// Dispatch after parse
pub fn run() {
    let cli = Cli::parse();

    let log = match logging::init(cli.verbose) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("error (logging): {e:#}");
            std::process::exit(1);
        }
    };

    let state = match bootstrap::bootstrap(BootstrapOptions::from(&cli), &ProcessEnvironment, &log)
    {
        Ok(state) => state,
        Err(e) => {
            match e.path() {
                Some(path) => error!(path = %path.display(), err = %e, "failed to initialize kdk"),
                None => error!(err = %e, "failed to initialize kdk"),
            }
            if let Some(hint) = e.remediation() {
                error!("{hint}");
            }
            std::process::exit(1);
        }
    };

    dispatch(&state);
}

/// Subcommands receive the bootstrapped state by reference; the core ships none.
fn dispatch(state: &ProcessState) {
    debug!(
        name = state.identity.name(),
        verbose = state.verbose,
        log_format = ?state.log_format,
        config_entries = state.config.entries().len(),
        runtime = %state.runtime.endpoint(),
        cancelled = state.context.is_cancelled(),
        "bootstrap complete"
    );
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_the_kdk_identity() {
        let cli = Cli::try_parse_from(["kdk"]).expect("parse");
        let options = BootstrapOptions::from(&cli);
        assert_eq!(options.identity.name(), "kdk");
        assert!(!options.verbose);
    }

    #[test]
    fn name_and_verbose_flags_are_read() {
        let cli = Cli::try_parse_from(["kdk", "--name", "staging", "-v"]).expect("parse");
        let options = BootstrapOptions::from(&cli);
        assert_eq!(options.identity.name(), "staging");
        assert!(options.verbose);
    }
}
