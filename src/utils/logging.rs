use std::io::IsTerminal;

use anyhow::{Context, Result};
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{EnvFilter, Layer, Registry, prelude::*, reload};

/// How diagnostics are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn from_json_setting(json: bool) -> Self {
        if json { LogFormat::Json } else { LogFormat::Text }
    }
}

/// Receives the log output settings once the layered settings are known.
pub trait LogSink {
    fn apply(&self, format: LogFormat, verbose: bool);
}

type FmtLayer = Box<dyn Layer<Registry> + Send + Sync>;
type FmtReload = reload::Layer<FmtLayer, Registry>;

/// Handle to the installed subscriber; swaps the output layer and level in place.
pub struct LogHandle {
    format: reload::Handle<FmtLayer, Registry>,
    filter: reload::Handle<EnvFilter, Layered<FmtReload, Registry>>,
}

/// Install the global subscriber with human-readable output.
pub fn init(verbose: bool) -> Result<LogHandle> {
    let (format_layer, format) = reload::Layer::new(fmt_layer(LogFormat::Text));
    let (filter_layer, filter) = reload::Layer::new(level_filter(verbose));
    tracing_subscriber::registry()
        .with(format_layer)
        .with(filter_layer)
        .try_init()
        .context("installing log subscriber")?;

    Ok(LogHandle { format, filter })
}

/// `RUST_LOG` overrides the level; otherwise `info`, or `debug` when verbose.
fn level_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn fmt_layer(format: LogFormat) -> FmtLayer {
    match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(false)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    }
}

impl LogSink for LogHandle {
    fn apply(&self, format: LogFormat, verbose: bool) {
        if let Err(err) = self.filter.reload(level_filter(verbose)) {
            tracing::warn!(err = %err, "failed to switch log level");
        }
        if let Err(err) = self.format.reload(fmt_layer(format)) {
            tracing::warn!(err = %err, "failed to switch log format");
        }
    }
}
