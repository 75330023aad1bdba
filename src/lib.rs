//! Startup layer for the kdk CLI: resolves the `~/.kdk` layout, loads the
//! layered configuration and builds the container runtime handle that every
//! subcommand receives through [`bootstrap::ProcessState`].

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod paths;
pub mod runtime;
pub mod settings;
pub mod utils;
